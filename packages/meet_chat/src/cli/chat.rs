use anyhow::Result;
use assistant_session::{ConnectionStatus, SessionHandle, SubmitError};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info};

use super::render::Renderer;

/// What ended a chat session.
#[derive(Debug, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The user typed /quit, hit Ctrl-C, or closed stdin.
    Quit,
    /// The connection closed underneath us.
    Disconnected,
}

pub type InputLines = Lines<BufReader<Stdin>>;

pub fn stdin_lines() -> InputLines {
    BufReader::new(tokio::io::stdin()).lines()
}

fn print_lines(out: &mut impl Write, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
    let _ = out.flush();
}

fn is_quit_command(line: &str) -> bool {
    matches!(line, "/quit" | "/exit")
}

/// Refusal notice for a submission the session did not accept.
fn rejection_notice(err: &SubmitError) -> String {
    match err {
        SubmitError::InputDisabled => {
            "[busy: the assistant is still working, wait for it to finish]".to_string()
        }
        SubmitError::NotOpen(ConnectionStatus::Connecting) => "[still connecting]".to_string(),
        SubmitError::NotOpen(_) | SubmitError::SessionGone => "[not connected]".to_string(),
        SubmitError::EmptyText => "[nothing to send]".to_string(),
        SubmitError::Transport(e) => format!("[not sent: {e}]"),
    }
}

/// Drive one session: render its state to `out` as it changes and forward
/// lines read from `input`.
pub async fn chat<R, W>(
    session: &SessionHandle,
    input: &mut Lines<R>,
    out: &mut W,
    renderer: &mut Renderer,
) -> Result<ChatOutcome>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut views = session.subscribe();
    let initial = views.borrow_and_update().clone();
    print_lines(out, &renderer.render(&initial));

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    return Ok(ChatOutcome::Disconnected);
                }
                let view = views.borrow_and_update().clone();
                print_lines(out, &renderer.render(&view));
                if view.status == ConnectionStatus::Closed {
                    return Ok(ChatOutcome::Disconnected);
                }
            }

            line = input.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    session.shutdown().await;
                    return Ok(ChatOutcome::Quit);
                };
                let trimmed = line.trim();
                if is_quit_command(trimmed) {
                    session.shutdown().await;
                    return Ok(ChatOutcome::Quit);
                }
                if trimmed.is_empty() {
                    continue;
                }
                match session.submit(line).await {
                    Ok(id) => debug!(entry_id = id, "submitted"),
                    Err(e) => {
                        debug!(error = %e, "submission refused");
                        print_lines(out, &[rejection_notice(&e)]);
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                session.shutdown().await;
                return Ok(ChatOutcome::Quit);
            }
        }
    }
}
