//! Parameter files on disk.
//!
//! Layout under the params directory:
//!
//! ```text
//! default.json        fleet-wide defaults
//! <key>.calib.json    per-vehicle calibration (key is the net id, or "sim")
//! ```

use flockstep_proto::{ParamsError, Vehicle, write_atomic};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Reads and writes vehicle parameter files in one directory.
#[derive(Debug, Clone)]
pub struct ParamStore {
    dir: PathBuf,
}

impl ParamStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn default_path(&self) -> PathBuf {
        self.dir.join("default.json")
    }

    pub fn calibration_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.calib.json"))
    }

    /// Loads defaults and then the calibration for `key` into `vehicle`.
    ///
    /// Returns whether a calibration file was applied. Missing files leave
    /// the vehicle's current parameters in place.
    pub fn load_into(&self, vehicle: &mut dyn Vehicle, key: &str) -> bool {
        vehicle.read_params(&self.default_path());
        let calibrated = vehicle.read_params(&self.calibration_path(key));
        if calibrated {
            info!(key, hover_point = vehicle.params().hover_point, "Calibration loaded");
        } else {
            warn!(key, "Vehicle not calibrated, using default hover point");
        }
        calibrated
    }

    /// Records a calibrated hover point for `key`.
    ///
    /// Other keys already in the calibration file are kept.
    pub fn save_calibration(&self, key: &str, hover_point: f64) -> Result<PathBuf, ParamsError> {
        let path = self.calibration_path(key);

        let mut map = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(Value::Object(map)) => map,
                _ => {
                    warn!(path = %path.display(), "Existing calibration unreadable, replacing it");
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };

        map.insert("hoverPoint".to_string(), Value::from(hover_point));
        map.insert(
            "calibratedAt".to_string(),
            Value::from(chrono::Utc::now().to_rfc3339()),
        );

        let json = serde_json::to_string_pretty(&Value::Object(map))?;
        write_atomic(&path, &json)?;
        info!(path = %path.display(), hover_point, "Calibration saved");
        Ok(path)
    }
}
