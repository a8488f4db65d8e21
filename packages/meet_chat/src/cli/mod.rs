pub mod chat;
pub mod render;

use anyhow::Result;
use assistant_session::spawn_session;
use tracing::{info, warn};

use crate::config::{ChatConfig, ReconnectPolicy};
use chat::ChatOutcome;
use render::Renderer;

/// What the supervisor does after a session ends.
#[derive(Debug, PartialEq, Eq)]
enum NextStep {
    Stop,
    Retry { attempt: u32 },
}

/// Decide whether to start a fresh session. `attempts` counts consecutive
/// failures; a session that reached `Open` resets it.
fn next_step(
    policy: &ReconnectPolicy,
    outcome: &ChatOutcome,
    was_opened: bool,
    attempts: &mut u32,
) -> NextStep {
    if *outcome == ChatOutcome::Quit || !policy.enabled {
        return NextStep::Stop;
    }
    if was_opened {
        *attempts = 0;
    }
    *attempts += 1;
    if *attempts > policy.max_attempts {
        NextStep::Stop
    } else {
        NextStep::Retry { attempt: *attempts }
    }
}

/// Default command: chat with the assistant, starting a fresh session after
/// each disconnect when reconnecting is enabled.
pub async fn chat_command(config: &ChatConfig) -> Result<()> {
    let mut input = chat::stdin_lines();
    let mut attempts = 0;

    println!("Connecting to {} (type /quit to leave)", config.url);

    loop {
        let session = spawn_session(config.url.clone(), config.session.clone());
        info!(session_id = %session.id(), url = %config.url, "session started");

        let mut renderer = Renderer::new();
        let outcome =
            chat::chat(&session, &mut input, &mut std::io::stdout(), &mut renderer).await?;
        info!(session_id = %session.id(), outcome = ?outcome, "session ended");

        match next_step(&config.reconnect, &outcome, renderer.was_opened(), &mut attempts) {
            NextStep::Stop => {
                if outcome == ChatOutcome::Disconnected && config.reconnect.enabled {
                    eprintln!("[meet-chat: giving up after {} attempts]", config.reconnect.max_attempts);
                }
                return Ok(());
            }
            NextStep::Retry { attempt } => {
                warn!(attempt, max_attempts = config.reconnect.max_attempts, "reconnecting");
                eprintln!(
                    "[meet-chat: reconnecting in {}s (attempt {}/{})]",
                    config.reconnect.delay.as_secs(),
                    attempt,
                    config.reconnect.max_attempts
                );
                tokio::select! {
                    _ = tokio::time::sleep(config.reconnect.delay) => {}
                    _ = tokio::signal::ctrl_c() => return Ok(()),
                }
            }
        }
    }
}

/// Print the resolved configuration as TOML.
pub fn config_command(fc: &crate::config::FileConfig) -> Result<()> {
    print!("{}", toml::to_string_pretty(fc)?);
    Ok(())
}
