//! Geofencing primitives for attendance validation.
//!
//! Distances are great-circle distances on a spherical earth. Inputs are
//! WGS-84 decimal degrees and are not validated; NaN in, NaN out.

use serde::{Deserialize, Serialize};

use crate::config::GeofenceConfig;

/// Mean earth radius in meters. The single authoritative constant for every
/// distance computation in this workspace.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A (latitude, longitude) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Haversine distance between two coordinates, in meters.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

/// A named circular region approved for attendance events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFence {
    pub name: String,
    pub center: Coordinate,
    pub radius_meters: f64,
}

/// The fence closest to an observed point, regardless of containment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestFence {
    pub name: String,
    pub distance_meters: f64,
}

/// Outcome of evaluating a point against the configured fences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FenceVerdict {
    /// True when the point lies within at least one fence.
    pub inside: bool,
    /// Closest fence over the whole list, for "you are N m from X"
    /// messages. None only when no fences are configured.
    pub nearest: Option<NearestFence>,
}

/// Evaluates observed coordinates against a fixed set of fences.
pub struct GeofenceChecker {
    fences: Vec<GeoFence>,
    empty_means_inside: bool,
}

impl GeofenceChecker {
    /// `empty_means_inside` decides the verdict when no fences are
    /// configured: true treats the list as "no restriction", false treats
    /// it as "nowhere is approved".
    pub fn new(fences: Vec<GeoFence>, empty_means_inside: bool) -> Self {
        Self {
            fences,
            empty_means_inside,
        }
    }

    pub fn from_config(config: &GeofenceConfig) -> Self {
        Self::new(config.fences(), config.empty_fences_means_inside)
    }

    pub fn fence_count(&self) -> usize {
        self.fences.len()
    }

    /// Containment is union semantics: inside any one fence is inside,
    /// even when a different fence's center is closer. The nearest fence
    /// is the minimum distance over the whole list, independent of the
    /// verdict; equidistant fences resolve to the first in input order.
    pub fn evaluate(&self, point: Coordinate) -> FenceVerdict {
        if self.fences.is_empty() {
            return FenceVerdict {
                inside: self.empty_means_inside,
                nearest: None,
            };
        }

        let mut inside = false;
        let mut nearest: Option<NearestFence> = None;
        for fence in &self.fences {
            let distance = distance_meters(point, fence.center);
            if distance <= fence.radius_meters {
                inside = true;
            }
            let closer = nearest
                .as_ref()
                .is_none_or(|n| distance < n.distance_meters);
            if closer {
                nearest = Some(NearestFence {
                    name: fence.name.clone(),
                    distance_meters: distance,
                });
            }
        }

        FenceVerdict { inside, nearest }
    }
}
