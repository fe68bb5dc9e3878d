//! Persisted per-vehicle parameters.
//!
//! Parameter files are flat JSON objects. Reading one overlays only the keys
//! it contains, so a calibration file holding just `hoverPoint` can be
//! layered on top of a fleet-wide default file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Default hover thrust for an uncalibrated vehicle (normalized 0-1).
pub const DEFAULT_HOVER_POINT: f64 = 0.5;

/// Tunable parameters for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleParams {
    /// Collective thrust that holds the vehicle in a steady hover.
    #[serde(default = "default_hover_point")]
    pub hover_point: f64,

    /// Keys this crate does not interpret, preserved on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_hover_point() -> f64 {
    DEFAULT_HOVER_POINT
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            hover_point: DEFAULT_HOVER_POINT,
            extra: Map::new(),
        }
    }
}

impl VehicleParams {
    /// Overlays the keys of a JSON object onto these parameters.
    pub fn overlay(&mut self, patch: Map<String, Value>) -> Result<(), ParamsError> {
        let mut merged = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merged.extend(patch);
        *self = serde_json::from_value(Value::Object(merged))?;
        Ok(())
    }

    /// Reads a JSON object from disk and overlays it.
    pub fn overlay_file(&mut self, path: &Path) -> Result<(), ParamsError> {
        let patch = read_object(path)?;
        self.overlay(patch)
    }
}

/// Reads a file that must contain a single JSON object.
fn read_object(path: &Path) -> Result<Map<String, Value>, ParamsError> {
    let contents = std::fs::read_to_string(path)?;
    match serde_json::from_str(&contents)? {
        Value::Object(map) => Ok(map),
        _ => Err(ParamsError::NotAnObject(path.to_path_buf())),
    }
}

/// Writes `contents` to a sibling temp file, then renames it over `path`.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), ParamsError> {
    let tmp_path = path.with_extension("json.tmp");

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Errors reading or writing parameter files.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parameter file {0} does not contain a JSON object")]
    NotAnObject(PathBuf),
}
