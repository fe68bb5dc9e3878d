//! Choreography and timeline model.
//!
//! A choreography is a set of roles, each with a home point and a
//! time-indexed path. Paths are piecewise linear between keyframes and
//! clamp to their first/last keyframe outside their time domain, so a
//! controller following one can always produce a setpoint.

use flockstep_proto::Point;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A time-stamped position on a role's path.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Keyframe {
    /// Show time in seconds.
    pub t: f64,
    pub pos: [f64; 3],
}

#[derive(Debug, Deserialize)]
struct RawRole {
    home: [f64; 3],
    #[serde(default)]
    path: Vec<Keyframe>,
}

#[derive(Debug, Deserialize)]
struct RawChoreography {
    #[serde(default)]
    name: String,
    roles: Vec<RawRole>,
}

/// Piecewise-linear position over show time.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    times: Vec<f64>,
    points: Vec<Point>,
}

impl Trajectory {
    /// Builds a trajectory from `(time, point)` pairs.
    ///
    /// Times must be finite and strictly increasing; at least one pair is
    /// required.
    pub fn new(samples: Vec<(f64, Point)>) -> Result<Self, ChoreographyError> {
        if samples.is_empty() {
            return Err(ChoreographyError::EmptyPath);
        }

        let mut times = Vec::with_capacity(samples.len());
        let mut points = Vec::with_capacity(samples.len());
        for (t, p) in samples {
            if !t.is_finite() {
                return Err(ChoreographyError::InvalidTime { t });
            }
            if let Some(&prev) = times.last() {
                if t <= prev {
                    return Err(ChoreographyError::NonMonotonic { prev, next: t });
                }
            }
            times.push(t);
            points.push(p);
        }

        Ok(Self { times, points })
    }

    /// A trajectory that stays at one point forever.
    pub fn stationary(point: Point) -> Self {
        Self {
            times: vec![0.0],
            points: vec![point],
        }
    }

    pub fn start_time(&self) -> f64 {
        self.times[0]
    }

    pub fn end_time(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    /// Position at show time `t`, clamped to the path's domain.
    pub fn position(&self, t: f64) -> Point {
        match self.segment(t) {
            Some((i, alpha)) => self.points[i].lerp(&self.points[i + 1], alpha),
            None if t < self.start_time() => self.points[0],
            None => self.points[self.points.len() - 1],
        }
    }

    /// Velocity at show time `t`; zero outside the path's domain.
    pub fn velocity(&self, t: f64) -> Point {
        match self.segment(t) {
            Some((i, _)) => {
                let dt = self.times[i + 1] - self.times[i];
                (self.points[i + 1] - self.points[i]) / dt
            }
            None => Point::zeros(),
        }
    }

    /// Finds the segment `[times[i], times[i+1])` containing `t`.
    fn segment(&self, t: f64) -> Option<(usize, f64)> {
        let upper = self.times.partition_point(|&x| x <= t);
        if upper == 0 || upper == self.times.len() {
            return None;
        }
        let i = upper - 1;
        let alpha = (t - self.times[i]) / (self.times[i + 1] - self.times[i]);
        Some((i, alpha))
    }
}

/// One authored path of the show.
#[derive(Debug, Clone)]
pub struct Role {
    pub home: Point,
    pub trajectory: Arc<Trajectory>,
}

/// A parsed, scaled show.
#[derive(Debug, Clone)]
pub struct Choreography {
    name: String,
    roles: Vec<Role>,
}

impl Choreography {
    /// Loads a show file and scales every distance by `scale`.
    pub fn from_file(path: impl AsRef<Path>, scale: f64) -> Result<Self, ChoreographyError> {
        let path = path.as_ref();
        debug!(path = %path.display(), scale, "Loading choreography");
        let content = std::fs::read_to_string(path)?;
        let mut show = Self::parse(&content, scale)?;
        if show.name.is_empty() {
            show.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        Ok(show)
    }

    /// Parses show text (JSON or YAML) and scales every distance by `scale`.
    pub fn parse(content: &str, scale: f64) -> Result<Self, ChoreographyError> {
        let raw: RawChoreography = serde_yaml::from_str(content)?;
        if raw.roles.is_empty() {
            return Err(ChoreographyError::NoRoles);
        }

        let to_point = |p: [f64; 3]| Point::new(p[0], p[1], p[2]) * scale;

        let mut roles = Vec::with_capacity(raw.roles.len());
        for (index, role) in raw.roles.into_iter().enumerate() {
            let home = to_point(role.home);
            let trajectory = if role.path.is_empty() {
                Trajectory::stationary(home)
            } else {
                let samples = role.path.iter().map(|k| (k.t, to_point(k.pos))).collect();
                Trajectory::new(samples).map_err(|source| ChoreographyError::Role {
                    index,
                    source: Box::new(source),
                })?
            };
            roles.push(Role {
                home,
                trajectory: Arc::new(trajectory),
            });
        }

        Ok(Self {
            name: raw.name,
            roles,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self, id: usize) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    /// Home point of every role, in role order.
    pub fn homes(&self) -> Vec<Point> {
        self.roles.iter().map(|r| r.home).collect()
    }

    /// Show length: the last keyframe time over all roles.
    pub fn duration(&self) -> f64 {
        self.roles
            .iter()
            .map(|r| r.trajectory.end_time())
            .fold(0.0, f64::max)
    }
}

/// Errors loading a choreography.
#[derive(Debug, thiserror::Error)]
pub enum ChoreographyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("choreography defines no roles")]
    NoRoles,

    #[error("path has no keyframes")]
    EmptyPath,

    #[error("keyframe time {t} is not finite")]
    InvalidTime { t: f64 },

    #[error("keyframe times must increase: {next} follows {prev}")]
    NonMonotonic { prev: f64, next: f64 },

    #[error("role {index}: {source}")]
    Role {
        index: usize,
        #[source]
        source: Box<ChoreographyError>,
    },
}
