use assistant_session::{Author, ConnectionStatus, SessionView};

/// Turns successive session snapshots into terminal lines, printing each
/// entry and notice once.
#[derive(Debug, Default)]
pub struct Renderer {
    last_entry_id: u64,
    last_progress: Option<String>,
    last_status: ConnectionStatus,
    opened: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the session this renderer followed ever reached `Open`, even if
    /// the `Open` snapshot itself was coalesced away.
    pub fn was_opened(&self) -> bool {
        self.opened
    }

    pub fn render(&mut self, view: &SessionView) -> Vec<String> {
        let mut lines = Vec::new();

        // Entries are only ever appended once open, so a view holding any
        // proves the session opened even when it is already closed.
        let reached_open = view.status == ConnectionStatus::Open || !view.entries.is_empty();
        if reached_open && !self.opened {
            self.opened = true;
            lines.push("[connected]".to_string());
        }

        let last_printed = self.last_entry_id;
        for entry in view.entries.iter().filter(|e| e.id > last_printed) {
            self.last_entry_id = entry.id;
            // The terminal already shows what the user typed.
            if entry.author == Author::User {
                continue;
            }
            let mut body = entry.body.lines();
            lines.push(format!("assistant> {}", body.next().unwrap_or_default()));
            lines.extend(body.map(|line| format!("           {line}")));
            if let Some(link) = &entry.action_link {
                lines.push(format!("           join: {link}"));
            }
        }

        let progress = view.progress.as_ref().map(|p| p.body.clone());
        if progress != self.last_progress {
            if let Some(p) = &view.progress {
                let label = p
                    .status()
                    .map(|s| s.description().to_string())
                    .unwrap_or_else(|| p.body.clone());
                lines.push(format!("  ... {label}"));
            }
            self.last_progress = progress;
        }

        if view.status != self.last_status && view.status == ConnectionStatus::Closed {
            if self.opened {
                lines.push("[connection closed]".to_string());
            } else {
                lines.push("[could not reach the assistant]".to_string());
            }
        }

        self.last_status = view.status;
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_session::{ConversationEntry, ProgressState};
    use chrono::Utc;
    use std::sync::Arc;

    fn entry(id: u64, author: Author, body: &str, link: Option<&str>) -> Arc<ConversationEntry> {
        Arc::new(ConversationEntry {
            id,
            author,
            body: body.to_string(),
            action_link: link.map(str::to_string),
            created_at: Utc::now(),
        })
    }

    fn open_view(entries: Vec<Arc<ConversationEntry>>) -> SessionView {
        SessionView {
            entries,
            progress: None,
            status: ConnectionStatus::Open,
            input_enabled: true,
        }
    }

    #[test]
    fn test_connect_then_welcome() {
        let mut r = Renderer::new();
        let lines = r.render(&open_view(vec![entry(1, Author::Assistant, "Hi!\nPick one", None)]));
        assert_eq!(
            lines,
            vec!["[connected]", "assistant> Hi!", "           Pick one"]
        );
        assert!(r.was_opened());
    }

    #[test]
    fn test_entries_print_once_and_skip_user() {
        let mut r = Renderer::new();
        let mut entries = vec![entry(1, Author::Assistant, "welcome", None)];
        r.render(&open_view(entries.clone()));

        entries.push(entry(2, Author::User, "hello", None));
        entries.push(entry(3, Author::Assistant, "Ready", Some("https://meet.example/abc")));
        let lines = r.render(&open_view(entries.clone()));
        assert_eq!(
            lines,
            vec!["assistant> Ready", "           join: https://meet.example/abc"]
        );

        assert!(r.render(&open_view(entries)).is_empty());
    }

    #[test]
    fn test_progress_uses_status_description() {
        let mut r = Renderer::new();
        r.render(&open_view(vec![]));

        let mut view = open_view(vec![]);
        view.input_enabled = false;
        view.progress = Some(ProgressState {
            body: "meeting_ready: The meeting is ready to join".to_string(),
        });
        assert_eq!(r.render(&view), vec!["  ... The meeting is ready to join"]);
        // Unchanged progress is not repeated
        assert!(r.render(&view).is_empty());

        view.progress = Some(ProgressState {
            body: "Logging in...".to_string(),
        });
        assert_eq!(r.render(&view), vec!["  ... Logging in..."]);
    }

    #[test]
    fn test_closed_after_open() {
        let mut r = Renderer::new();
        r.render(&open_view(vec![]));
        let mut view = open_view(vec![]);
        view.status = ConnectionStatus::Closed;
        view.input_enabled = false;
        assert_eq!(r.render(&view), vec!["[connection closed]"]);
    }

    #[test]
    fn test_closed_without_open() {
        let mut r = Renderer::new();
        let view = SessionView {
            status: ConnectionStatus::Closed,
            ..Default::default()
        };
        assert_eq!(r.render(&view), vec!["[could not reach the assistant]"]);
        assert!(!r.was_opened());
    }

    #[test]
    fn test_open_then_close_seen_as_one_snapshot() {
        let mut r = Renderer::new();
        assert!(r.render(&SessionView::default()).is_empty());

        // Open and Closed landed between two reads of the watch channel.
        let view = SessionView {
            entries: vec![entry(1, Author::Assistant, "welcome", None)],
            status: ConnectionStatus::Closed,
            ..Default::default()
        };
        assert_eq!(
            r.render(&view),
            vec!["[connected]", "assistant> welcome", "[connection closed]"]
        );
        assert!(r.was_opened());
    }
}
