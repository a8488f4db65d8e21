//! Onboarding text shown when a session first opens.

use serde::{Deserialize, Serialize};

/// Live assistants the service can bring into a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    SoftwareDevelopmentManager,
    Psychologist,
    HeartOfGoldComputer,
    BusinessCoach,
}

impl Persona {
    pub const ALL: [Persona; 4] = [
        Persona::SoftwareDevelopmentManager,
        Persona::Psychologist,
        Persona::HeartOfGoldComputer,
        Persona::BusinessCoach,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::SoftwareDevelopmentManager => "Software Development Manager",
            Persona::Psychologist => "Psychologist",
            Persona::HeartOfGoldComputer => "Heart of Gold Computer",
            Persona::BusinessCoach => "Business Coach",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Persona::SoftwareDevelopmentManager => {
                "runs stand-ups, plans sprints and reviews delivery risks"
            }
            Persona::Psychologist => "listens and helps you talk things through",
            Persona::HeartOfGoldComputer => {
                "the ship's relentlessly cheerful computer, happy to answer anything"
            }
            Persona::BusinessCoach => "sharpens goals, pitches and strategy",
        }
    }
}

/// The fixed greeting appended when the connection opens.
pub fn welcome_message() -> String {
    let mut text = String::from(
        "Hi! I can start a Google Meet call and bring a live assistant into it. \
         Who would you like to talk to?\n\n",
    );
    for persona in Persona::ALL {
        text.push_str(&format!(
            "- **{}**: {}\n",
            persona.display_name(),
            persona.summary()
        ));
    }
    text.push_str("\nTell me who to invite, and share a meeting link if you already have one.");
    text
}
