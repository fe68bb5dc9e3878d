//! # flockstep-proto
//!
//! Shared types, error definitions, and traits for the flockstep show
//! orchestrator.
//!
//! This crate provides the foundational abstractions used across all
//! flockstep crates, including:
//! - The `Vehicle` contract every physical or simulated aircraft proxy implements
//! - Kinematic and telemetry types exchanged between vehicles and the core
//! - Persisted per-vehicle parameters
//! - The JSON wire schema for operator messages and status snapshots

mod message;
mod params;
mod vehicle;

pub use message::{
    BatteryStatus, GlobalStatus, InboundMessage, OutboundMessage, STATUS_SCHEMA_VERSION,
    StatusSnapshot, VehicleStatus,
};
pub use params::{DEFAULT_HOVER_POINT, ParamsError, VehicleParams, write_atomic};
pub use vehicle::{Battery, KinematicState, Point, Vehicle, VehicleError, VehicleTelemetry};
