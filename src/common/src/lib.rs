pub mod config;
pub mod geo;
pub mod identity;
pub mod model;
pub mod store;
pub mod telemetry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use geo::GeofenceChecker;
