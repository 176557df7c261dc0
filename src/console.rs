use crate::error::Result;
use crate::events::{AppEvent, EventBus, UserAction};
use crate::workflow::IdentityField;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const HELP: &str = "\
Commands:
  start                  start the recognition camera
  capture                capture a frame and recognise it
  stop                   stop the recognition camera
  enroll-start           start the enrollment camera (or 'enroll')
  snap                   add a frame to the enrollment gallery
  clear                  clear the enrollment gallery
  set <field> <value>    set reg_no, name, semester or phone
  submit                 register the student
  records                refresh attendance records
  status                 show connection and workflow state
  help                   show this text
  quit                   exit";

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Action(UserAction),
    Help,
    Quit,
}

/// Parse a console line. Blank lines give `Ok(None)`; the error text is
/// meant for the operator.
pub fn parse_command(line: &str) -> std::result::Result<Option<Command>, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let action = match word.to_ascii_lowercase().as_str() {
        "" => return Ok(None),
        "help" | "?" => return Ok(Some(Command::Help)),
        "quit" | "exit" | "q" => return Ok(Some(Command::Quit)),
        "start" => UserAction::StartRecognition,
        "capture" => UserAction::CaptureRecognition,
        "stop" => UserAction::StopRecognition,
        "enroll" | "enroll-start" => UserAction::StartEnrollment,
        "snap" => UserAction::CaptureEnrollment,
        "clear" => UserAction::ClearEnrollment,
        "submit" => UserAction::SubmitEnrollment,
        "records" => UserAction::RefreshRecords,
        "status" => UserAction::ShowStatus,
        "set" => {
            let (field, value) = match rest.split_once(char::is_whitespace) {
                Some((field, value)) => (field, value.trim()),
                None => (rest, ""),
            };
            if field.is_empty() {
                return Err("usage: set <field> <value>".to_string());
            }
            let field: IdentityField = field.parse()?;
            UserAction::SetField(field, value.to_string())
        }
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };

    Ok(Some(Command::Action(action)))
}

/// Reads operator commands from stdin and publishes them as events
pub struct ConsoleInput {
    event_bus: EventBus,
    cancellation_token: CancellationToken,
}

impl ConsoleInput {
    pub fn new(event_bus: EventBus, cancellation_token: CancellationToken) -> Self {
        Self {
            event_bus,
            cancellation_token,
        }
    }

    /// Start listening on stdin. End of input asks the client to stop.
    pub fn start(self) -> Result<()> {
        info!("Console ready - type 'help' for commands");

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            loop {
                let line = tokio::select! {
                    _ = self.cancellation_token.cancelled() => break,
                    line = lines.next_line() => line,
                };

                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        self.request_shutdown("Console input closed");
                        break;
                    }
                    Err(e) => {
                        warn!("Error reading console input: {}", e);
                        self.request_shutdown("Console input failed");
                        break;
                    }
                };

                match parse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Help)) => println!("{}", HELP),
                    Ok(Some(Command::Quit)) => {
                        info!("Quit requested from console");
                        self.request_shutdown("User requested via console");
                        break;
                    }
                    Ok(Some(Command::Action(action))) => {
                        debug!("Console action: {}", action.name());
                        if let Err(e) = self.event_bus.publish(AppEvent::User(action)) {
                            warn!("Failed to publish console action: {}", e);
                            break;
                        }
                    }
                    Err(message) => println!("{}", message),
                }
            }

            debug!("Console input task exited");
        });

        Ok(())
    }

    fn request_shutdown(&self, reason: &str) {
        let event = AppEvent::ShutdownRequested {
            reason: reason.to_string(),
        };
        if let Err(e) = self.event_bus.publish(event) {
            warn!("Failed to publish shutdown event: {}", e);
        }
    }
}
