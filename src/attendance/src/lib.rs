//! Daily check-in/check-out recording.
//!
//! A check event is accepted only when the account's role records
//! attendance at all, the time falls inside the configured shift window,
//! the geolocation fix is fresh and inside a fence, and no equal event
//! exists for the day. Accepted events become one document per
//! uid/date/kind.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::config::{AttendanceConfig, GeofenceConfig};
use common::geo::{Coordinate, GeofenceChecker, NearestFence};
use common::model::{AttendanceEntry, CheckKind, Role, ShiftWindow, collections};
use common::store::{CollectionPath, DocumentStore, StoreError};

/// A geolocation reading attached to a check event.
#[derive(Debug, Clone, Copy)]
pub struct LocationFix {
    pub coordinate: Coordinate,
    pub accuracy_meters: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// One check-in or check-out attempt.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub uid: String,
    pub role: Role,
    pub kind: CheckKind,
    pub location: Option<LocationFix>,
}

/// Accepted event, echoed back to the caller. Fence and distance are
/// absent only under the permissive empty-fence policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReceipt {
    pub record_id: String,
    pub kind: CheckKind,
    pub fence: Option<String>,
    pub distance_meters: Option<f64>,
}

/// Check event rejection.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("{0} accounts do not record attendance")]
    RoleNotEligible(Role),

    #[error("no {kind} window is open at {time}")]
    OutsideWindow {
        kind: CheckKind,
        time: chrono::NaiveTime,
    },

    #[error("a location fix is required")]
    LocationRequired,

    #[error("location fix is {age_secs}s old, limit is {limit_secs}s")]
    StaleLocation { age_secs: u64, limit_secs: u64 },

    #[error("outside every approved area{}", nearest_hint(.nearest))]
    OutsideFence { nearest: Option<NearestFence> },

    #[error("{kind} already recorded for {date}")]
    AlreadyRecorded {
        kind: CheckKind,
        date: chrono::NaiveDate,
    },

    #[error("cannot check out before checking in")]
    NotCheckedIn,

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn nearest_hint(nearest: &Option<NearestFence>) -> String {
    match nearest {
        Some(n) => format!(" ({:.0} m from {})", n.distance_meters, n.name),
        None => String::new(),
    }
}

/// Validates and records daily attendance events.
pub struct CheckInService {
    store: Arc<dyn DocumentStore>,
    checker: GeofenceChecker,
    windows: Vec<ShiftWindow>,
    max_fix_age: Duration,
}

impl CheckInService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        geofence: &GeofenceConfig,
        attendance: &AttendanceConfig,
    ) -> Self {
        Self {
            store,
            checker: GeofenceChecker::from_config(geofence),
            windows: attendance.windows.clone(),
            max_fix_age: attendance.max_fix_age,
        }
    }

    /// Record a check event observed at `now`.
    pub async fn record(
        &self,
        request: CheckRequest,
        now: DateTime<Utc>,
    ) -> Result<CheckReceipt, CheckError> {
        let collection = match request.role {
            Role::Superadmin => return Err(CheckError::RoleNotEligible(request.role)),
            Role::Mahasiswa => CollectionPath::root(collections::ATTENDANCE_RECORDS),
            Role::Dosen | Role::Karyawan => CollectionPath::root(collections::STAFF_ATTENDANCE),
        };

        let time = now.time();
        let window_open = self
            .windows
            .iter()
            .any(|w| w.kind == request.kind && w.contains(time));
        if !window_open {
            return Err(CheckError::OutsideWindow {
                kind: request.kind,
                time,
            });
        }

        let fix = request.location.ok_or(CheckError::LocationRequired)?;
        let age = now.signed_duration_since(fix.recorded_at);
        if age.num_seconds() < 0 || age.num_seconds() as u64 > self.max_fix_age.as_secs() {
            return Err(CheckError::StaleLocation {
                age_secs: age.num_seconds().max(0) as u64,
                limit_secs: self.max_fix_age.as_secs(),
            });
        }

        let verdict = self.checker.evaluate(fix.coordinate);
        if !verdict.inside {
            return Err(CheckError::OutsideFence {
                nearest: verdict.nearest,
            });
        }
        // Inside at least one fence; nearest is None only when the
        // empty-fence policy is permissive.
        let (fence, distance_meters) = match verdict.nearest {
            Some(n) => (Some(n.name), Some(n.distance_meters)),
            None => (None, None),
        };

        let date = now.date_naive();
        let record_id = AttendanceEntry::doc_id(&request.uid, date, request.kind);
        if self.store.get(&collection, &record_id).await?.is_some() {
            return Err(CheckError::AlreadyRecorded {
                kind: request.kind,
                date,
            });
        }
        if request.kind == CheckKind::Out {
            let in_id = AttendanceEntry::doc_id(&request.uid, date, CheckKind::In);
            if self.store.get(&collection, &in_id).await?.is_none() {
                return Err(CheckError::NotCheckedIn);
            }
        }

        let entry = AttendanceEntry {
            uid: request.uid.clone(),
            date,
            kind: request.kind,
            time,
            lat: Some(fix.coordinate.lat),
            lng: Some(fix.coordinate.lng),
            accuracy_m: fix.accuracy_meters,
            distance_m: distance_meters,
            fence: fence.clone(),
            created_at: now,
        };
        let data = serde_json::to_value(&entry).map_err(|source| StoreError::Malformed {
            id: record_id.clone(),
            source,
        })?;
        self.store.put(&collection, &record_id, data).await?;

        tracing::info!(
            uid = %request.uid,
            kind = %request.kind,
            fence = fence.as_deref().unwrap_or("-"),
            "attendance recorded"
        );
        Ok(CheckReceipt {
            record_id,
            kind: request.kind,
            fence,
            distance_meters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::store::InMemoryStore;
    use common::testing::TestConfigBuilder;

    const CAMPUS_LAT: f64 = -6.2009;
    const CAMPUS_LNG: f64 = 106.781;

    fn service(store: Arc<InMemoryStore>) -> CheckInService {
        let config = TestConfigBuilder::new()
            .without_fences()
            .with_fence("Kampus Pusat", CAMPUS_LAT, CAMPUS_LNG, 300.0)
            .with_open_windows()
            .build();
        CheckInService::new(store, &config.geofence, &config.attendance)
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap()
    }

    fn on_campus(now: DateTime<Utc>) -> LocationFix {
        LocationFix {
            coordinate: Coordinate::new(CAMPUS_LAT, CAMPUS_LNG),
            accuracy_meters: Some(8.0),
            recorded_at: now,
        }
    }

    fn request(uid: &str, role: Role, kind: CheckKind, location: Option<LocationFix>) -> CheckRequest {
        CheckRequest {
            uid: uid.to_string(),
            role,
            kind,
            location,
        }
    }

    #[tokio::test]
    async fn test_student_check_in_is_recorded() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(store.clone());
        let now = noon();

        let receipt = service
            .record(
                request("mhs-1", Role::Mahasiswa, CheckKind::In, Some(on_campus(now))),
                now,
            )
            .await
            .unwrap();

        assert_eq!(receipt.record_id, "mhs-1_2025-09-01_in");
        assert_eq!(receipt.fence.as_deref(), Some("Kampus Pusat"));
        let logs = CollectionPath::root(collections::ATTENDANCE_RECORDS);
        let doc = store.get(&logs, &receipt.record_id).await.unwrap().unwrap();
        assert_eq!(doc.data["uid"], "mhs-1");
        assert_eq!(doc.data["fence"], "Kampus Pusat");
    }

    #[tokio::test]
    async fn test_staff_roles_use_the_staff_log() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(store.clone());
        let now = noon();

        for (uid, role) in [("dsn-1", Role::Dosen), ("kry-1", Role::Karyawan)] {
            service
                .record(request(uid, role, CheckKind::In, Some(on_campus(now))), now)
                .await
                .unwrap();
        }
        let staff = CollectionPath::root(collections::STAFF_ATTENDANCE);
        assert_eq!(store.count(&staff).await, 2);
    }

    #[tokio::test]
    async fn test_superadmin_does_not_record_attendance() {
        let service = service(Arc::new(InMemoryStore::new()));
        let now = noon();
        let err = service
            .record(
                request("admin", Role::Superadmin, CheckKind::In, Some(on_campus(now))),
                now,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::RoleNotEligible(Role::Superadmin)));
    }

    #[tokio::test]
    async fn test_duplicate_check_in_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(store);
        let now = noon();

        service
            .record(
                request("mhs-1", Role::Mahasiswa, CheckKind::In, Some(on_campus(now))),
                now,
            )
            .await
            .unwrap();
        let err = service
            .record(
                request("mhs-1", Role::Mahasiswa, CheckKind::In, Some(on_campus(now))),
                now,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::AlreadyRecorded { .. }));
    }

    #[tokio::test]
    async fn test_check_out_requires_check_in() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(store);
        let now = noon();

        let err = service
            .record(
                request("mhs-1", Role::Mahasiswa, CheckKind::Out, Some(on_campus(now))),
                now,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::NotCheckedIn));

        service
            .record(
                request("mhs-1", Role::Mahasiswa, CheckKind::In, Some(on_campus(now))),
                now,
            )
            .await
            .unwrap();
        service
            .record(
                request("mhs-1", Role::Mahasiswa, CheckKind::Out, Some(on_campus(now))),
                now,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_off_campus_rejected_with_nearest_hint() {
        let service = service(Arc::new(InMemoryStore::new()));
        let now = noon();
        let far = LocationFix {
            coordinate: Coordinate::new(CAMPUS_LAT + 0.05, CAMPUS_LNG),
            accuracy_meters: None,
            recorded_at: now,
        };

        let err = service
            .record(request("mhs-1", Role::Mahasiswa, CheckKind::In, Some(far)), now)
            .await
            .unwrap_err();
        match err {
            CheckError::OutsideFence { nearest: Some(n) } => {
                assert_eq!(n.name, "Kampus Pusat");
                assert!(n.distance_meters > 300.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_and_stale_fixes_rejected() {
        let service = service(Arc::new(InMemoryStore::new()));
        let now = noon();

        let err = service
            .record(request("mhs-1", Role::Mahasiswa, CheckKind::In, None), now)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::LocationRequired));

        let stale = LocationFix {
            recorded_at: now - chrono::Duration::seconds(600),
            ..on_campus(now)
        };
        let err = service
            .record(request("mhs-1", Role::Mahasiswa, CheckKind::In, Some(stale)), now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckError::StaleLocation {
                age_secs: 600,
                limit_secs: 120
            }
        ));
    }

    #[tokio::test]
    async fn test_window_gate() {
        let store = Arc::new(InMemoryStore::new());
        let config = TestConfigBuilder::new()
            .without_fences()
            .with_fence("Kampus Pusat", CAMPUS_LAT, CAMPUS_LNG, 300.0)
            .build();
        let service = CheckInService::new(store, &config.geofence, &config.attendance);

        // Default check-in window opens at 06:00.
        let early = Utc.with_ymd_and_hms(2025, 9, 1, 4, 30, 0).unwrap();
        let err = service
            .record(
                request("mhs-1", Role::Mahasiswa, CheckKind::In, Some(on_campus(early))),
                early,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::OutsideWindow { .. }));
    }

    #[tokio::test]
    async fn test_permissive_policy_accepts_unfenced_deployment() {
        let store = Arc::new(InMemoryStore::new());
        let config = TestConfigBuilder::new()
            .without_fences()
            .permissive_when_unfenced()
            .with_open_windows()
            .build();
        let service = CheckInService::new(store, &config.geofence, &config.attendance);
        let now = noon();

        let receipt = service
            .record(
                request("mhs-1", Role::Mahasiswa, CheckKind::In, Some(on_campus(now))),
                now,
            )
            .await
            .unwrap();
        assert_eq!(receipt.fence, None);
        assert_eq!(receipt.distance_meters, None);
    }
}
