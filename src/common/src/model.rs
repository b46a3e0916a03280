//! Domain records shared across the portal services.
//!
//! Structs carry only the fields the services actually read or write;
//! documents in the store may hold more. Field names stay camelCase to
//! match the stored data of the deployed portal.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection names as laid out in the production document store.
pub mod collections {
    /// Top-level profile collection, one document per account uid.
    pub const USERS: &str = "users";
    /// Subcollection of a user document.
    pub const ENROLLMENTS: &str = "enrollments";
    /// Student attendance log, keyed by owner `uid`.
    pub const ATTENDANCE_RECORDS: &str = "attendance_records";
    /// Lecturer/staff attendance log, keyed by owner `uid`.
    pub const STAFF_ATTENDANCE: &str = "staff_attendance";
    /// Lecturer master data linked to an account via `authUid`.
    pub const LECTURER_MASTERS: &str = "master_dosen";
    /// Courses owned by a lecturer via `dosenUid`.
    pub const COURSES: &str = "courses";
    /// Subcollection of a course document.
    pub const SESSIONS: &str = "sessions";
    /// Subcollection of a course document.
    pub const STUDENTS: &str = "students";
}

/// Foreign-key field names used by equality queries.
pub mod fields {
    pub const OWNER_UID: &str = "uid";
    pub const AUTH_UID: &str = "authUid";
    pub const LECTURER_UID: &str = "dosenUid";
    pub const ROLE: &str = "role";
}

/// Account roles of the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Dosen,
    Mahasiswa,
    Karyawan,
}

impl Role {
    /// Tolerant parse of a stored role value. Profiles written by older
    /// clients carry mixed case and stray whitespace.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_lowercase().as_str() {
            "superadmin" => Some(Role::Superadmin),
            "dosen" => Some(Role::Dosen),
            "mahasiswa" => Some(Role::Mahasiswa),
            "karyawan" => Some(Role::Karyawan),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Dosen => "dosen",
            Role::Mahasiswa => "mahasiswa",
            Role::Karyawan => "karyawan",
        }
    }

    /// Only lecturers own course documents.
    pub fn owns_courses(&self) -> bool {
        matches!(self, Role::Dosen)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile document stored at `users/{uid}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub role: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_dosen_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// Direction of a daily attendance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    In,
    Out,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::In => "in",
            CheckKind::Out => "out",
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One check-in or check-out event. Document id is
/// `{uid}_{date}_{kind}`, which also makes duplicates self-evident.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub uid: String,
    pub date: NaiveDate,
    pub kind: CheckKind,
    pub time: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fence: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AttendanceEntry {
    pub fn doc_id(uid: &str, date: NaiveDate, kind: CheckKind) -> String {
        format!("{uid}_{date}_{kind}")
    }
}

/// Daily time window during which a check event is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftWindow {
    pub kind: CheckKind,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ShiftWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }
}
