//! Configuration types for a flockstep show session.
//!
//! The file is read with `serde_yaml`, so both YAML and the legacy JSON
//! layout (`jocsPath`, `jocsActiveIds`, `useMocap`, ...) load unchanged.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Base UDP port for vehicle links; each vehicle is offset by `10 * index`.
const BASE_LOCAL_PORT: u16 = 14550;
const BASE_REMOTE_PORT: u16 = 14555;
const PORT_STRIDE: u16 = 10;

/// Top-level configuration for a show session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowConfig {
    /// Path to the choreography file.
    pub jocs_path: PathBuf,

    /// Choreography roles flown this session, in roster order.
    pub jocs_active_ids: Vec<usize>,

    /// Use the motion-capture bridge instead of the simulator.
    #[serde(default)]
    pub use_mocap: bool,

    /// Scale factor applied to every choreography distance.
    #[serde(default = "default_scale")]
    pub theater_scale: f64,

    /// Enable the remote messaging transport.
    #[serde(default)]
    pub enable_messaging: bool,

    /// Enable the OSC control surface.
    #[serde(default, alias = "enableOSC")]
    pub enable_osc: bool,

    /// Motion-capture network addresses (mocap only).
    #[serde(default)]
    pub hardware_config: Option<HardwareConfig>,

    /// Vehicles available on the network.
    #[serde(default)]
    pub vehicles: Vec<VehicleEntry>,

    // ─────────────────────────────────────────────────────────────────────────
    // TUNABLES
    // ─────────────────────────────────────────────────────────────────────────

    /// Directory holding `default.json` and `<id>.calib.json` files.
    #[serde(default = "default_params_dir")]
    pub params_dir: PathBuf,

    /// Directory scanned for loadable `.jocs` show files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Listen address of the messaging transport.
    #[serde(default = "default_messaging_addr")]
    pub messaging_addr: String,

    /// UDP port of the OSC listener.
    #[serde(default = "default_osc_port")]
    pub osc_port: u16,

    /// Stepping loop rate.
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: u32,

    /// Emit a status snapshot every this many ticks.
    #[serde(default = "default_status_every")]
    pub status_every_ticks: u32,

    #[serde(default)]
    pub readiness: ReadinessConfig,

    #[serde(default)]
    pub stopping: StoppingConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,
}

fn default_scale() -> f64 {
    1.0
}

fn default_params_dir() -> PathBuf {
    PathBuf::from("./config/params/")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_messaging_addr() -> String {
    "0.0.0.0:8765".to_string()
}

fn default_osc_port() -> u16 {
    53100
}

fn default_tick_rate() -> u32 {
    100
}

fn default_status_every() -> u32 {
    20
}

/// Motion-capture client/server addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareConfig {
    pub client_address: String,
    pub server_address: String,
}

/// One vehicle on the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleEntry {
    pub net_id: u32,
}

/// When the fleet counts as steady enough to leave Preparing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessConfig {
    /// Maximum readiness distance (position + velocity error).
    #[serde(default = "default_readiness_threshold")]
    pub threshold: f64,

    /// Consecutive ticks every vehicle must stay below `threshold`.
    #[serde(default = "default_readiness_ticks")]
    pub ticks: u32,
}

fn default_readiness_threshold() -> f64 {
    0.15
}

fn default_readiness_ticks() -> u32 {
    50
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            threshold: default_readiness_threshold(),
            ticks: default_readiness_ticks(),
        }
    }
}

/// Landing behaviour while Stopping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppingConfig {
    /// Give up waiting for touchdown after this long and return to Idle.
    #[serde(default = "default_stopping_timeout")]
    pub timeout_secs: f64,

    /// Vertical speed of the landing path (m/s).
    #[serde(default = "default_descent_rate")]
    pub descent_rate: f64,

    /// Horizontal speed when returning over the home point (m/s).
    #[serde(default = "default_approach_speed")]
    pub approach_speed: f64,

    /// Height under which a slow vehicle counts as landed.
    #[serde(default = "default_landed_height")]
    pub landed_height: f64,
}

fn default_stopping_timeout() -> f64 {
    20.0
}

fn default_descent_rate() -> f64 {
    0.5
}

fn default_approach_speed() -> f64 {
    1.0
}

fn default_landed_height() -> f64 {
    0.1
}

impl Default for StoppingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_stopping_timeout(),
            descent_rate: default_descent_rate(),
            approach_speed: default_approach_speed(),
            landed_height: default_landed_height(),
        }
    }
}

/// Hover-thrust calibration sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationConfig {
    #[serde(default = "default_calibration_samples")]
    pub samples: u32,

    #[serde(default = "default_calibration_rate")]
    pub rate_hz: f64,
}

fn default_calibration_samples() -> u32 {
    40
}

fn default_calibration_rate() -> f64 {
    10.0
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            samples: default_calibration_samples(),
            rate_hz: default_calibration_rate(),
        }
    }
}

/// Network identity and derived link ports of one roster slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleLink {
    pub net_id: u32,
    pub local_port: u16,
    pub remote_port: u16,
}

impl ShowConfig {
    /// Loads configuration from a YAML or JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        debug!(path = %path_ref.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(path_ref)?;
        let config: Self = serde_yaml::from_str(&content)?;
        debug!(
            jocs = %config.jocs_path.display(),
            active = config.jocs_active_ids.len(),
            vehicles = config.vehicles.len(),
            mocap = config.use_mocap,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Returns warnings for suspicious-but-usable settings, or an error for
    /// settings the session cannot start with.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        let mut warnings = Vec::new();

        if self.jocs_active_ids.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "jocsActiveIds".to_string(),
                message: "at least one active role is required".to_string(),
            });
        }

        require_positive("theaterScale", self.theater_scale)?;

        if self.tick_rate_hz == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tickRateHz".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        require_positive("readiness.threshold", self.readiness.threshold)?;
        require_positive("stopping.timeoutSecs", self.stopping.timeout_secs)?;
        require_positive("stopping.descentRate", self.stopping.descent_rate)?;
        require_positive("stopping.approachSpeed", self.stopping.approach_speed)?;
        require_positive("stopping.landedHeight", self.stopping.landed_height)?;
        require_positive("calibration.rateHz", self.calibration.rate_hz)?;

        let mut seen_roles = HashSet::new();
        for id in &self.jocs_active_ids {
            if !seen_roles.insert(id) {
                return Err(ConfigError::InvalidValue {
                    field: "jocsActiveIds".to_string(),
                    message: format!("role {id} is listed more than once"),
                });
            }
        }

        if self.use_mocap {
            let mut seen_ids = HashSet::new();
            for v in &self.vehicles {
                if !seen_ids.insert(v.net_id) {
                    return Err(ConfigError::InvalidValue {
                        field: "vehicles".to_string(),
                        message: format!("net_id {} is listed more than once", v.net_id),
                    });
                }
            }

            if self.hardware_config.is_none() {
                warnings.push(ConfigWarning::MissingSection {
                    field: "hardwareConfig".to_string(),
                    message: "useMocap is set but no motion-capture addresses are configured"
                        .to_string(),
                });
            }
        }

        if self.enable_osc && !self.enable_messaging {
            warnings.push(ConfigWarning::Inconsistent {
                field: "enableOSC".to_string(),
                message: "OSC cues are accepted but no status will be published".to_string(),
            });
        }

        if self.status_every_ticks == 0 {
            warnings.push(ConfigWarning::Inconsistent {
                field: "statusEveryTicks".to_string(),
                message: "0 disables periodic status snapshots".to_string(),
            });
        }

        Ok(warnings)
    }

    /// Returns the stepping period.
    pub fn tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz))
    }

    /// Derives network identity and link ports for every configured vehicle.
    ///
    /// Motion-capture vehicles keep their configured id and share one remote
    /// port. Simulated vehicles are renumbered from zero and every port is
    /// offset by index.
    pub fn vehicle_links(&self) -> Vec<VehicleLink> {
        self.vehicles
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if self.use_mocap {
                    VehicleLink {
                        net_id: v.net_id,
                        local_port: port_offset(BASE_LOCAL_PORT, v.net_id),
                        remote_port: BASE_REMOTE_PORT,
                    }
                } else {
                    let index = i as u32;
                    VehicleLink {
                        net_id: index,
                        local_port: port_offset(BASE_LOCAL_PORT, index),
                        remote_port: port_offset(BASE_REMOTE_PORT, index),
                    }
                }
            })
            .collect()
    }

    /// Key used to name a vehicle's calibration file.
    pub fn calibration_key(&self, net_id: u32) -> String {
        if self.use_mocap {
            net_id.to_string()
        } else {
            "sim".to_string()
        }
    }
}

fn require_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("must be a positive number, got {value}"),
        })
    }
}

fn port_offset(base: u16, index: u32) -> u16 {
    let offset = index.saturating_mul(u32::from(PORT_STRIDE));
    u16::try_from(u32::from(base) + offset).unwrap_or(u16::MAX)
}

/// Non-fatal configuration issues.
#[derive(Debug, Clone)]
pub enum ConfigWarning {
    /// A section the selected mode expects is absent.
    MissingSection { field: String, message: String },
    /// Settings that work but probably do not do what was intended.
    Inconsistent { field: String, message: String },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingSection { field, message }
            | ConfigWarning::Inconsistent { field, message } => {
                write!(f, "Warning [{}]: {}", field, message)
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_JSON: &str = r#"{
        "jocsPath": "data/triangle.jocs",
        "jocsActiveIds": [0, 1, 2],
        "useMocap": false,
        "theaterScale": 0.5,
        "enableMessaging": true,
        "enableOSC": false,
        "vehicles": [{"net_id": 7}, {"net_id": 8}, {"net_id": 9}]
    }"#;

    #[test]
    fn test_parse_legacy_json_layout() {
        let config: ShowConfig = serde_yaml::from_str(LEGACY_JSON).unwrap();
        assert_eq!(config.jocs_path, PathBuf::from("data/triangle.jocs"));
        assert_eq!(config.jocs_active_ids, vec![0, 1, 2]);
        assert!(!config.use_mocap);
        assert!((config.theater_scale - 0.5).abs() < 1e-12);
        assert!(config.enable_messaging);
        assert!(!config.enable_osc);
        assert_eq!(config.vehicles.len(), 3);
    }

    #[test]
    fn test_defaults_for_tunables() {
        let config: ShowConfig = serde_yaml::from_str(LEGACY_JSON).unwrap();
        assert_eq!(config.tick_rate_hz, 100);
        assert_eq!(config.status_every_ticks, 20);
        assert_eq!(config.osc_port, 53100);
        assert_eq!(config.calibration.samples, 40);
        assert_eq!(config.params_dir, PathBuf::from("./config/params/"));
        assert_eq!(config.tick_period(), std::time::Duration::from_millis(10));
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
jocsPath: show.jocs
jocsActiveIds: [1]
readiness:
  threshold: 0.3
stopping:
  timeoutSecs: 5
"#;
        let config: ShowConfig = serde_yaml::from_str(yaml).unwrap();
        assert!((config.readiness.threshold - 0.3).abs() < 1e-12);
        assert_eq!(config.readiness.ticks, 50);
        assert!((config.stopping.timeout_secs - 5.0).abs() < 1e-12);
        assert!((config.stopping.descent_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_simulated_links_renumber_from_zero() {
        let config: ShowConfig = serde_yaml::from_str(LEGACY_JSON).unwrap();
        let links = config.vehicle_links();
        assert_eq!(
            links,
            vec![
                VehicleLink { net_id: 0, local_port: 14550, remote_port: 14555 },
                VehicleLink { net_id: 1, local_port: 14560, remote_port: 14565 },
                VehicleLink { net_id: 2, local_port: 14570, remote_port: 14575 },
            ]
        );
        assert_eq!(config.calibration_key(1), "sim");
    }

    #[test]
    fn test_mocap_links_keep_net_id() {
        let mut config: ShowConfig = serde_yaml::from_str(LEGACY_JSON).unwrap();
        config.use_mocap = true;
        let links = config.vehicle_links();
        assert_eq!(
            links[1],
            VehicleLink { net_id: 8, local_port: 14630, remote_port: 14555 }
        );
        assert_eq!(config.calibration_key(8), "8");
    }

    #[test]
    fn test_validate_rejects_empty_active_ids() {
        let yaml = "jocsPath: a.jocs\njocsActiveIds: []\n";
        let config: ShowConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(
            matches!(&err, ConfigError::InvalidValue { field, .. } if field == "jocsActiveIds"),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_roles() {
        let yaml = "jocsPath: a.jocs\njocsActiveIds: [0, 2, 0]\n";
        let config: ShowConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_warns_on_mocap_without_hardware() {
        let mut config: ShowConfig = serde_yaml::from_str(LEGACY_JSON).unwrap();
        config.use_mocap = true;
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(
            |w| matches!(w, ConfigWarning::MissingSection { field, .. } if field == "hardwareConfig")
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_mocap_ids() {
        let mut config: ShowConfig = serde_yaml::from_str(LEGACY_JSON).unwrap();
        config.use_mocap = true;
        config.vehicles.push(VehicleEntry { net_id: 7 });
        assert!(config.validate().is_err());
    }

    fn rejected_field(yaml: &str) -> String {
        let config: ShowConfig = serde_yaml::from_str(yaml).unwrap();
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => field,
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_non_positive_tunables() {
        let base = "jocsPath: a.jocs\njocsActiveIds: [0]\n";
        let cases = [
            ("theaterScale: 0\n", "theaterScale"),
            ("readiness:\n  threshold: -1\n", "readiness.threshold"),
            ("readiness:\n  threshold: 0\n", "readiness.threshold"),
            ("stopping:\n  timeoutSecs: 0\n", "stopping.timeoutSecs"),
            ("stopping:\n  descentRate: 0\n", "stopping.descentRate"),
            ("stopping:\n  approachSpeed: -0.5\n", "stopping.approachSpeed"),
            ("stopping:\n  landedHeight: 0\n", "stopping.landedHeight"),
            ("calibration:\n  rateHz: 0\n", "calibration.rateHz"),
        ];
        for (extra, field) in cases {
            assert_eq!(rejected_field(&format!("{base}{extra}")), field, "config: {extra}");
        }
    }

    #[test]
    fn test_validate_rejects_non_finite_tunables() {
        let base = "jocsPath: a.jocs\njocsActiveIds: [0]\n";
        let cases = [
            ("calibration:\n  rateHz: .nan\n", "calibration.rateHz"),
            ("stopping:\n  descentRate: .inf\n", "stopping.descentRate"),
            ("readiness:\n  threshold: .nan\n", "readiness.threshold"),
            ("theaterScale: .inf\n", "theaterScale"),
        ];
        for (extra, field) in cases {
            assert_eq!(rejected_field(&format!("{base}{extra}")), field, "config: {extra}");
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let config: ShowConfig = serde_yaml::from_str(LEGACY_JSON).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_required_field_is_error() {
        let result: Result<ShowConfig, _> = serde_yaml::from_str("useMocap: true\n");
        assert!(result.is_err());
    }
}
