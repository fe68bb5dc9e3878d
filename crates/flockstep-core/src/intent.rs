//! Operator intents and their text encodings.
//!
//! Three surfaces produce intents: console lines, JSON messages from a
//! remote console, and OSC cue addresses. All of them parse into the same
//! [`Intent`] so routing does not care where a command came from.

use crate::requests::ModeRequest;
use flockstep_proto::InboundMessage;

/// Something an operator asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Prepare,
    Play,
    Pause,
    Stop,
    Land,
    Kill { enabled: bool },
    Reset,
    ListShows,
    LoadShow { file: String },
    Calibrate,
}

impl Intent {
    /// Parses one console line.
    ///
    /// Blank lines yield `Ok(None)`. `kill` takes an optional argument:
    /// `off` clears the interlock, anything else (or nothing) sets it.
    pub fn parse_console(line: &str) -> Result<Option<Self>, IntentError> {
        let mut args = line.split_whitespace();
        let Some(command) = args.next() else {
            return Ok(None);
        };

        let intent = match command {
            "prepare" => Intent::Prepare,
            "play" => Intent::Play,
            "pause" => Intent::Pause,
            "stop" => Intent::Stop,
            "land" => Intent::Land,
            "kill" => Intent::Kill {
                enabled: args.next() != Some("off"),
            },
            "reset" => Intent::Reset,
            "list" => Intent::ListShows,
            "load" => match args.next() {
                Some(file) => Intent::LoadShow {
                    file: file.to_string(),
                },
                None => {
                    return Err(IntentError::MissingArgument {
                        command: "load",
                        argument: "file",
                    });
                }
            },
            "calibrate" => Intent::Calibrate,
            other => return Err(IntentError::UnknownCommand(other.to_string())),
        };

        Ok(Some(intent))
    }

    /// Parses a JSON message from a remote console.
    pub fn parse_message(text: &str) -> Result<Self, IntentError> {
        let message: InboundMessage = serde_json::from_str(text)?;
        Ok(message.into())
    }

    /// The mode-change request this intent raises, if it is one.
    pub fn mode_request(&self) -> Option<ModeRequest> {
        match self {
            Intent::Prepare => Some(ModeRequest::Prepare),
            Intent::Play => Some(ModeRequest::Play),
            Intent::Pause => Some(ModeRequest::Pause),
            Intent::Stop => Some(ModeRequest::Stop),
            Intent::Land => Some(ModeRequest::Land),
            _ => None,
        }
    }
}

impl From<InboundMessage> for Intent {
    fn from(message: InboundMessage) -> Self {
        match message {
            InboundMessage::Prepare => Intent::Prepare,
            InboundMessage::Play => Intent::Play,
            InboundMessage::Pause => Intent::Pause,
            InboundMessage::Stop => Intent::Stop,
            InboundMessage::Land => Intent::Land,
            InboundMessage::Reset => Intent::Reset,
            InboundMessage::List => Intent::ListShows,
            InboundMessage::Load { file } => Intent::LoadShow { file },
            InboundMessage::Kill { enabled } => Intent::Kill { enabled },
        }
    }
}

/// A lighting-desk cue received over OSC, e.g. `/cue/0101/start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub number: u32,
    pub intent: Intent,
}

impl Cue {
    /// Parses an OSC address. `load` maps to prepare and `start` to play.
    pub fn parse(address: &str) -> Result<Self, IntentError> {
        let mut parts = address.split('/').filter(|p| !p.is_empty());

        if parts.next() != Some("cue") {
            return Err(IntentError::UnknownAddress(address.to_string()));
        }

        let number = parts
            .next()
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(|| IntentError::InvalidCue(address.to_string()))?;

        let intent = match parts.next() {
            Some("load") => Intent::Prepare,
            Some("start") => Intent::Play,
            _ => return Err(IntentError::InvalidCue(address.to_string())),
        };

        Ok(Self { number, intent })
    }
}

/// Errors parsing an operator command.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("'{command}' requires a {argument} argument")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("invalid message: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    #[error("unhandled OSC address '{0}'")]
    UnknownAddress(String),

    #[error("malformed cue '{0}'")]
    InvalidCue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_commands() {
        assert_eq!(Intent::parse_console("prepare").unwrap(), Some(Intent::Prepare));
        assert_eq!(Intent::parse_console("  play  ").unwrap(), Some(Intent::Play));
        assert_eq!(Intent::parse_console("calibrate").unwrap(), Some(Intent::Calibrate));
        assert_eq!(Intent::parse_console("").unwrap(), None);
        assert_eq!(Intent::parse_console("   ").unwrap(), None);
    }

    #[test]
    fn test_console_kill_argument() {
        assert_eq!(
            Intent::parse_console("kill").unwrap(),
            Some(Intent::Kill { enabled: true })
        );
        assert_eq!(
            Intent::parse_console("kill off").unwrap(),
            Some(Intent::Kill { enabled: false })
        );
        assert_eq!(
            Intent::parse_console("kill now").unwrap(),
            Some(Intent::Kill { enabled: true })
        );
    }

    #[test]
    fn test_console_load_needs_file() {
        assert_eq!(
            Intent::parse_console("load finale.jocs").unwrap(),
            Some(Intent::LoadShow {
                file: "finale.jocs".to_string()
            })
        );
        assert!(matches!(
            Intent::parse_console("load"),
            Err(IntentError::MissingArgument { command: "load", .. })
        ));
    }

    #[test]
    fn test_console_unknown_command() {
        assert!(matches!(
            Intent::parse_console("takeoff"),
            Err(IntentError::UnknownCommand(c)) if c == "takeoff"
        ));
    }

    #[test]
    fn test_message_parsing() {
        assert_eq!(
            Intent::parse_message(r#"{"type":"kill","enabled":false}"#).unwrap(),
            Intent::Kill { enabled: false }
        );
        assert_eq!(
            Intent::parse_message(r#"{"type":"list"}"#).unwrap(),
            Intent::ListShows
        );
        assert!(matches!(
            Intent::parse_message(r#"{"type":"warp"}"#),
            Err(IntentError::InvalidMessage(_))
        ));
        assert!(Intent::parse_message("not json").is_err());
    }

    #[test]
    fn test_mode_requests() {
        assert_eq!(Intent::Stop.mode_request(), Some(ModeRequest::Stop));
        assert_eq!(Intent::Reset.mode_request(), None);
        assert_eq!(Intent::Kill { enabled: true }.mode_request(), None);
    }

    #[test]
    fn test_cue_addresses() {
        let cue = Cue::parse("/cue/0101/start").unwrap();
        assert_eq!(cue.number, 101);
        assert_eq!(cue.intent, Intent::Play);

        assert_eq!(Cue::parse("/cue/7/load").unwrap().intent, Intent::Prepare);
        assert!(matches!(
            Cue::parse("/light/1/start"),
            Err(IntentError::UnknownAddress(_))
        ));
        assert!(matches!(Cue::parse("/cue/x/start"), Err(IntentError::InvalidCue(_))));
        assert!(matches!(Cue::parse("/cue/1/fire"), Err(IntentError::InvalidCue(_))));
    }
}
