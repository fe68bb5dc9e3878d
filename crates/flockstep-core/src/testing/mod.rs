//! Testing utilities for deterministic fleet tests.

pub mod mock_vehicle;

pub use mock_vehicle::{MockVehicle, VehicleCommand};
