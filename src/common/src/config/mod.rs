use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use once_cell::sync::OnceCell;

use crate::geo::{Coordinate, GeoFence};
use crate::model::{CheckKind, ShiftWindow};

pub static CONFIG: OnceCell<Configuration> = OnceCell::new();

/// Document database used by the SQL store adapter (PostgreSQL or SQLite DSN).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("sqlite://.data/presensi.db"),
        }
    }
}

impl DatabaseConfig {
    /// In-memory database configuration, used by tests.
    pub fn in_memory() -> Self {
        Self {
            dsn: String::from("sqlite::memory:"),
        }
    }
}

/// One configured fence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FenceConfig {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub radius_meters: f64,
}

/// Geofence validation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeofenceConfig {
    /// Verdict when no fences are configured. `false` (the default) means
    /// an empty fence list approves nothing; set to `true` only for demo
    /// or administrative deployments where location is not enforced.
    pub empty_fences_means_inside: bool,
    pub fences: Vec<FenceConfig>,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            empty_fences_means_inside: false,
            fences: vec![FenceConfig {
                name: String::from("Kampus Pusat"),
                lat: -6.2009,
                lng: 106.781,
                radius_meters: 300.0,
            }],
        }
    }
}

impl GeofenceConfig {
    pub fn fences(&self) -> Vec<GeoFence> {
        self.fences
            .iter()
            .map(|f| GeoFence {
                name: f.name.clone(),
                center: Coordinate::new(f.lat, f.lng),
                radius_meters: f.radius_meters,
            })
            .collect()
    }
}

/// Cascading-deletion settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeletionConfig {
    /// Records per delete batch. Kept below the store's 500-write batch
    /// limit; adjust together with the limit of the target backend.
    pub max_batch_size: usize,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 450,
        }
    }
}

/// Attendance recording settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttendanceConfig {
    /// Maximum age of a geolocation fix before a check event is rejected
    /// as stale.
    #[serde(with = "humantime_serde")]
    pub max_fix_age: Duration,
    /// Accepted daily windows per check kind.
    pub windows: Vec<ShiftWindow>,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            max_fix_age: Duration::from_secs(120),
            windows: vec![
                ShiftWindow {
                    kind: CheckKind::In,
                    start: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                    end: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                },
                ShiftWindow {
                    kind: CheckKind::Out,
                    start: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                    end: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
                },
            ],
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Database configuration for the SQL store adapter
    pub database: DatabaseConfig,
    /// Geofence validation
    pub geofence: GeofenceConfig,
    /// Account deletion cascade
    pub deletion: DeletionConfig,
    /// Daily attendance recording
    pub attendance: AttendanceConfig,
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from_path(std::path::Path::new("presensi.toml"))
    }

    pub fn load_from_path(path: &std::path::Path) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("PRESENSI__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}
