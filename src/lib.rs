//! Attendance portal backend core.
//!
//! Facade over the member crates: configuration, geofencing, and the
//! store/identity ports live in `common`; privileged account
//! administration in `registrar`; daily check recording in `attendance`.

pub use attendance::{CheckInService, CheckReceipt, CheckRequest, LocationFix};
pub use common::config::{CONFIG, Configuration};
pub use common::geo::{Coordinate, GeofenceChecker};
pub use common::identity::{IdentityProvider, InMemoryIdentity};
pub use common::model::{CheckKind, Role};
pub use common::store::{DocumentStore, InMemoryStore, SqlStore};
pub use common::telemetry::init_tracing;
pub use registrar::{DeletionReport, LecturerAccountRequest, Registrar};
