//! Routes operator intents to the stepping thread or to their out-of-band
//! handlers.
//!
//! Mode changes and the kill interlock only touch [`ModeRequests`]. Show
//! listing, show loading and calibration run on the caller's thread and may
//! produce a reply for whoever sent the intent.

use crate::calibration::Calibrator;
use crate::choreography::{Choreography, ChoreographyError};
use crate::intent::Intent;
use crate::requests::ModeRequests;
use flockstep_proto::OutboundMessage;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Extension of loadable show files.
const SHOW_EXTENSION: &str = "jocs";

/// Dispatches intents from every operator surface.
#[derive(Debug, Clone)]
pub struct IntentRouter {
    requests: Arc<ModeRequests>,
    data_dir: PathBuf,
    scale: f64,
    calibrator: Option<Calibrator>,
}

impl IntentRouter {
    pub fn new(requests: Arc<ModeRequests>, data_dir: impl Into<PathBuf>, scale: f64) -> Self {
        Self {
            requests,
            data_dir: data_dir.into(),
            scale,
            calibrator: None,
        }
    }

    /// Enables the `calibrate` intent.
    #[must_use]
    pub fn with_calibrator(mut self, calibrator: Calibrator) -> Self {
        self.calibrator = Some(calibrator);
        self
    }

    /// Parses and dispatches a JSON message. Malformed input gets an error reply.
    pub fn handle_message(&self, text: &str) -> Option<OutboundMessage> {
        match Intent::parse_message(text) {
            Ok(intent) => self.dispatch(intent),
            Err(e) => {
                warn!(error = %e, "Unexpected message received");
                Some(OutboundMessage::Error {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Acts on one intent and returns the reply for its sender, if any.
    pub fn dispatch(&self, intent: Intent) -> Option<OutboundMessage> {
        if let Some(request) = intent.mode_request() {
            info!(request = %request, "Request queued");
            self.requests.request(request);
            return None;
        }

        match intent {
            Intent::Kill { enabled } => {
                if enabled {
                    warn!("Kill interlock set");
                } else {
                    info!("Kill interlock cleared");
                }
                self.requests.set_kill(enabled);
                None
            }
            Intent::Reset => {
                info!("Reset requested");
                None
            }
            Intent::ListShows => Some(match self.list_shows() {
                Ok(files) => OutboundMessage::ListReply { files },
                Err(e) => {
                    warn!(dir = %self.data_dir.display(), error = %e, "Cannot list shows");
                    OutboundMessage::Error {
                        message: format!("cannot list shows: {e}"),
                    }
                }
            }),
            Intent::LoadShow { file } => match self.load_show(&file) {
                Ok(()) => None,
                Err(e) => {
                    warn!(file = %file, error = %e, "Show not loaded");
                    Some(OutboundMessage::Error {
                        message: e.to_string(),
                    })
                }
            },
            Intent::Calibrate => {
                let Some(calibrator) = &self.calibrator else {
                    return Some(OutboundMessage::Error {
                        message: "calibration is not available".to_string(),
                    });
                };
                match calibrator.run() {
                    Ok(_) => None,
                    Err(e) => {
                        warn!(error = %e, "Calibration failed");
                        Some(OutboundMessage::Error {
                            message: e.to_string(),
                        })
                    }
                }
            }
            Intent::Prepare | Intent::Play | Intent::Pause | Intent::Stop | Intent::Land => None,
        }
    }

    /// Names of the show files in the data directory, sorted.
    pub fn list_shows(&self) -> std::io::Result<Vec<String>> {
        let mut files: Vec<String> = std::fs::read_dir(&self.data_dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext == SHOW_EXTENSION)
            })
            .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Parses a show from the data directory and stages it.
    pub fn load_show(&self, file: &str) -> Result<(), LoadError> {
        let mut components = Path::new(file).components();
        let plain_name = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain_name {
            return Err(LoadError::InvalidName(file.to_string()));
        }

        let show = Choreography::from_file(self.data_dir.join(file), self.scale)?;
        info!(show = show.name(), "Show staged, loads once the fleet is idle");
        self.requests.stage_show(show);
        Ok(())
    }
}

/// Errors loading a show by name.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("'{0}' is not a file name in the data directory")]
    InvalidName(String),

    #[error(transparent)]
    Choreography(#[from] ChoreographyError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::ModeRequest;
    use tempfile::TempDir;

    fn router(dir: &TempDir) -> (IntentRouter, Arc<ModeRequests>) {
        let requests = Arc::new(ModeRequests::new());
        (IntentRouter::new(Arc::clone(&requests), dir.path(), 1.0), requests)
    }

    #[test]
    fn test_mode_intents_raise_flags() {
        let dir = TempDir::new().unwrap();
        let (router, requests) = router(&dir);

        assert!(router.dispatch(Intent::Pause).is_none());
        assert!(requests.is_pending(ModeRequest::Pause));
    }

    #[test]
    fn test_kill_is_set_and_cleared() {
        let dir = TempDir::new().unwrap();
        let (router, requests) = router(&dir);

        router.dispatch(Intent::Kill { enabled: true });
        assert!(requests.is_killed());
        router.dispatch(Intent::Kill { enabled: false });
        assert!(!requests.is_killed());
    }

    #[test]
    fn test_reset_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let (router, requests) = router(&dir);

        assert!(router.dispatch(Intent::Reset).is_none());
        assert_eq!(requests.take(), None);
    }

    #[test]
    fn test_list_replies_with_sorted_show_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.jocs"), "{}").unwrap();
        std::fs::write(dir.path().join("a.jocs"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        let (router, _) = router(&dir);

        assert_eq!(
            router.dispatch(Intent::ListShows),
            Some(OutboundMessage::ListReply {
                files: vec!["a.jocs".to_string(), "b.jocs".to_string()]
            })
        );
    }

    #[test]
    fn test_load_stages_show() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("solo.jocs"),
            r#"{"roles": [{"home": [0, 0, 1]}]}"#,
        )
        .unwrap();
        let (router, requests) = router(&dir);

        let reply = router.dispatch(Intent::LoadShow {
            file: "solo.jocs".to_string(),
        });
        assert!(reply.is_none());
        assert_eq!(requests.take_staged_show().unwrap().name(), "solo");
    }

    #[test]
    fn test_load_rejects_paths_outside_data_dir() {
        let dir = TempDir::new().unwrap();
        let (router, requests) = router(&dir);

        for file in ["../secret.jocs", "/etc/passwd", "sub/show.jocs", ".."] {
            let reply = router.dispatch(Intent::LoadShow {
                file: file.to_string(),
            });
            assert!(matches!(reply, Some(OutboundMessage::Error { .. })), "{file}");
        }
        assert!(requests.take_staged_show().is_none());
    }

    #[test]
    fn test_malformed_message_gets_error_reply() {
        let dir = TempDir::new().unwrap();
        let (router, requests) = router(&dir);

        let reply = router.handle_message(r#"{"type":"explode"}"#);
        assert!(matches!(reply, Some(OutboundMessage::Error { .. })));
        assert_eq!(requests.take(), None);
    }

    #[test]
    fn test_calibrate_without_calibrator_is_refused() {
        let dir = TempDir::new().unwrap();
        let (router, _) = router(&dir);
        assert!(matches!(
            router.dispatch(Intent::Calibrate),
            Some(OutboundMessage::Error { .. })
        ));
    }
}
