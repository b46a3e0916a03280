//! Test configuration builder for creating test setups quickly.

use chrono::NaiveTime;

use crate::config::{Configuration, DatabaseConfig, FenceConfig};
use crate::model::{CheckKind, ShiftWindow};

/// Builder for creating test configurations.
///
/// Starts from the production defaults and narrows them to what a test
/// needs: in-memory database, explicit fences, explicit shift windows.
///
/// # Example
///
/// ```rust,ignore
/// use common::testing::TestConfigBuilder;
///
/// let config = TestConfigBuilder::new()
///     .in_memory()
///     .without_fences()
///     .with_fence("lab", -6.2009, 106.781, 150.0)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: Configuration,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Configuration::default(),
        }
    }

    /// Use an in-memory SQLite database.
    pub fn in_memory(mut self) -> Self {
        self.config.database = DatabaseConfig::in_memory();
        self
    }

    /// Drop every configured fence, including the default campus fixture.
    pub fn without_fences(mut self) -> Self {
        self.config.geofence.fences.clear();
        self
    }

    /// Append a fence.
    pub fn with_fence(mut self, name: &str, lat: f64, lng: f64, radius_meters: f64) -> Self {
        self.config.geofence.fences.push(FenceConfig {
            name: name.to_string(),
            lat,
            lng,
            radius_meters,
        });
        self
    }

    /// Treat an empty fence list as "everywhere is approved".
    pub fn permissive_when_unfenced(mut self) -> Self {
        self.config.geofence.empty_fences_means_inside = true;
        self
    }

    /// Override the deletion batch size.
    pub fn with_batch_size(mut self, max_batch_size: usize) -> Self {
        self.config.deletion.max_batch_size = max_batch_size;
        self
    }

    /// Replace the shift windows with a single all-day window per kind,
    /// so time-of-day never interferes with unrelated assertions.
    pub fn with_open_windows(mut self) -> Self {
        let start = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
        self.config.attendance.windows = vec![
            ShiftWindow {
                kind: CheckKind::In,
                start,
                end,
            },
            ShiftWindow {
                kind: CheckKind::Out,
                start,
                end,
            },
        ];
        self
    }

    pub fn build(self) -> Configuration {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_builder() {
        let config = TestConfigBuilder::new().in_memory().build();
        assert_eq!(config.database.dsn, "sqlite::memory:");
    }

    #[test]
    fn test_fence_overrides() {
        let config = TestConfigBuilder::new()
            .without_fences()
            .with_fence("lab", 0.0, 0.0, 75.0)
            .build();

        assert_eq!(config.geofence.fences.len(), 1);
        assert_eq!(config.geofence.fences[0].name, "lab");
        assert_eq!(config.geofence.fences[0].radius_meters, 75.0);
    }

    #[test]
    fn test_open_windows_cover_midnight() {
        let config = TestConfigBuilder::new().with_open_windows().build();
        for window in &config.attendance.windows {
            assert!(window.contains(NaiveTime::from_hms_opt(0, 0, 0).unwrap()));
            assert!(window.contains(NaiveTime::from_hms_opt(23, 59, 59).unwrap()));
        }
    }
}
