//! Line commands typed into the host's terminal.
//!
//! | Command  | Effect                                                     |
//! |----------|------------------------------------------------------------|
//! | `close`  | Ends the active session with `disconnect{reason:"closed"}` |
//! | `status` | Logs the active session, if any                            |
//! | `quit`   | Clears the `running` flag, same as Ctrl+C                  |
//!
//! Input ending (stdin closed, e.g. when run as a service) stops the console
//! but not the host.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::application::manage_sessions::SessionGate;

/// One recognised console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Close,
    Status,
    Quit,
}

impl OperatorCommand {
    /// Parses one input line.  Blank lines yield `None`, as do unknown words.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "close" => Some(OperatorCommand::Close),
            "status" => Some(OperatorCommand::Status),
            "quit" | "exit" => Some(OperatorCommand::Quit),
            _ => None,
        }
    }
}

/// Applies console commands to the running host.
#[derive(Clone)]
pub struct OperatorConsole {
    sessions: SessionGate,
    running: Arc<AtomicBool>,
}

impl OperatorConsole {
    pub fn new(sessions: SessionGate, running: Arc<AtomicBool>) -> Self {
        Self { sessions, running }
    }

    pub fn execute(&self, command: OperatorCommand) {
        match command {
            OperatorCommand::Close => {
                if self.sessions.close_active() {
                    info!("closing the active session");
                } else {
                    info!("no active session to close");
                }
            }
            OperatorCommand::Status => match self.sessions.active() {
                Some(session) => info!(
                    "session {} from {} active for {:?}",
                    session.id,
                    session.peer,
                    session.started_at.elapsed()
                ),
                None => info!("no active session"),
            },
            OperatorCommand::Quit => {
                info!("quit requested; shutting down");
                self.running.store(false, Ordering::Relaxed);
            }
        }
    }

    /// Reads commands from `input` until it ends or the host stops.
    pub async fn run<R>(self, input: R)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        while self.running.load(Ordering::Relaxed) {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("console input failed: {e}");
                    break;
                }
            };
            match OperatorCommand::parse(&line) {
                Some(command) => self.execute(command),
                None if line.trim().is_empty() => {}
                None => warn!("unknown command '{}' (try close, status, quit)", line.trim()),
            }
        }
        debug!("operator console stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::BufReader;
    use tokio::time::timeout;

    fn console() -> (OperatorConsole, SessionGate, Arc<AtomicBool>) {
        let sessions = SessionGate::new();
        let running = Arc::new(AtomicBool::new(true));
        (
            OperatorConsole::new(sessions.clone(), Arc::clone(&running)),
            sessions,
            running,
        )
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(OperatorCommand::parse("close"), Some(OperatorCommand::Close));
        assert_eq!(OperatorCommand::parse("  STATUS \r"), Some(OperatorCommand::Status));
        assert_eq!(OperatorCommand::parse("exit"), Some(OperatorCommand::Quit));
        assert_eq!(OperatorCommand::parse(""), None);
        assert_eq!(OperatorCommand::parse("reboot"), None);
    }

    #[tokio::test]
    async fn test_close_line_ends_active_session() {
        // Arrange
        let (console, sessions, _running) = console();
        let lease = sessions
            .try_acquire("192.168.1.7:50000".parse().unwrap())
            .unwrap();
        let input = tokio_test::io::Builder::new()
            .read(b"status\n")
            .read(b"close\n")
            .build();

        // Act
        console.run(BufReader::new(input)).await;

        // Assert
        timeout(Duration::from_secs(1), lease.close_requested())
            .await
            .expect("close request must reach the session");
    }

    #[tokio::test]
    async fn test_quit_line_clears_running_flag() {
        let (console, _sessions, running) = console();
        let input = tokio_test::io::Builder::new().read(b"bogus\n\nquit\n").build();

        console.run(BufReader::new(input)).await;

        assert!(!running.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_end_of_input_leaves_host_running() {
        let (console, _sessions, running) = console();
        let input = tokio_test::io::Builder::new().read(b"close\n").build();

        console.run(BufReader::new(input)).await;

        assert!(running.load(Ordering::Relaxed));
    }
}
