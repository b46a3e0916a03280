//! Cascading removal of an account and everything that references it.
//!
//! The cascade is best-effort by design: dependent record sets are wiped
//! independently, failures are recorded per set instead of aborting the
//! whole operation, and completed delete batches are never rolled back.
//! The identity step is the one fatal exception, because leaving a live
//! login behind after its records are gone is worse than the reverse.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use common::config::DeletionConfig;
use common::identity::{IdentityError, IdentityProvider};
use common::model::{Role, collections, fields};
use common::store::{CollectionPath, Document, DocumentRef, DocumentStore, StoreError};

/// Count of removed records for one dependent set, plus the error that
/// stopped the wipe partway, if any. Records deleted before the error
/// stay deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetOutcome {
    pub deleted: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SetOutcome {
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }

    fn from_result(result: Result<u64, BatchDeleteError>) -> Self {
        match result {
            Ok(deleted) => Self {
                deleted,
                error: None,
            },
            Err(err) => Self {
                deleted: err.deleted,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Per-set accounting of one cascade run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionReport {
    pub subject_uid: String,
    pub role: Option<Role>,
    pub enrollments: SetOutcome,
    pub attendance: SetOutcome,
    pub staff_attendance: SetOutcome,
    pub lecturer_masters: SetOutcome,
    pub courses: SetOutcome,
    pub profile_deleted: bool,
    pub identity_deleted: bool,
}

impl DeletionReport {
    fn new(subject_uid: &str, role: Option<Role>) -> Self {
        Self {
            subject_uid: subject_uid.to_string(),
            role,
            enrollments: SetOutcome::default(),
            attendance: SetOutcome::default(),
            staff_attendance: SetOutcome::default(),
            lecturer_masters: SetOutcome::default(),
            courses: SetOutcome::default(),
            profile_deleted: false,
            identity_deleted: false,
        }
    }

    fn outcomes(&self) -> [&SetOutcome; 5] {
        [
            &self.enrollments,
            &self.attendance,
            &self.staff_attendance,
            &self.lecturer_masters,
            &self.courses,
        ]
    }

    /// True when every dependent set was wiped without error. Callers must
    /// not present a cascade as fully successful unless this holds.
    pub fn fully_clean(&self) -> bool {
        self.outcomes().iter().all(|o| o.is_clean())
    }

    /// Total records removed across all dependent sets.
    pub fn total_deleted(&self) -> u64 {
        self.outcomes().iter().map(|o| o.deleted).sum()
    }
}

/// A batched wipe stopped partway. `deleted` counts the records removed by
/// the batches that committed before the failure.
#[derive(Debug, thiserror::Error)]
#[error("aborted after {deleted} deletions: {source}")]
pub struct BatchDeleteError {
    pub deleted: u64,
    #[source]
    pub source: StoreError,
}

/// Cascade failure.
#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    #[error("subject uid must not be empty")]
    MissingSubject,

    #[error("a deletion for {0} is already in progress")]
    DeletionInProgress(String),

    #[error("profile cleanup failed for {uid}: {source}")]
    Profile {
        uid: String,
        /// Present when dependent sets were already wiped before the
        /// profile step failed.
        report: Option<Box<DeletionReport>>,
        #[source]
        source: StoreError,
    },

    #[error("identity deletion failed for {uid}: {source}")]
    Identity {
        uid: String,
        /// Store-side cleanup that already happened; it is not rolled back.
        report: Box<DeletionReport>,
        #[source]
        source: IdentityError,
    },
}

/// Removes an account and every record referencing it, in bounded
/// sequential batches, and reports what happened per dependent set.
pub struct AccountCascade {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    max_batch_size: usize,
    in_flight: Mutex<HashSet<String>>,
}

impl AccountCascade {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &DeletionConfig,
    ) -> Self {
        Self {
            store,
            identity,
            max_batch_size: config.max_batch_size,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Run the full cascade for `subject_uid`.
    ///
    /// Safe to repeat: every "already gone" condition counts as a
    /// zero-effect success, so a second run converges to an all-zero
    /// report instead of failing.
    pub async fn run(&self, subject_uid: &str) -> Result<DeletionReport, CascadeError> {
        if subject_uid.trim().is_empty() {
            return Err(CascadeError::MissingSubject);
        }
        let _in_flight = self.claim(subject_uid)?;

        let users = CollectionPath::root(collections::USERS);
        let profile = self
            .store
            .get(&users, subject_uid)
            .await
            .map_err(|source| CascadeError::Profile {
                uid: subject_uid.to_string(),
                report: None,
                source,
            })?;
        let role = profile
            .as_ref()
            .and_then(|doc| doc.data.get(fields::ROLE))
            .and_then(Value::as_str)
            .and_then(Role::parse);
        tracing::info!(uid = subject_uid, role = ?role, "starting account cascade");

        let mut report = DeletionReport::new(subject_uid, role);

        report.enrollments = self
            .wipe_collection(&users.child(subject_uid, collections::ENROLLMENTS))
            .await;

        report.attendance = self
            .wipe_matching(
                &CollectionPath::root(collections::ATTENDANCE_RECORDS),
                fields::OWNER_UID,
                subject_uid,
            )
            .await;
        report.staff_attendance = self
            .wipe_matching(
                &CollectionPath::root(collections::STAFF_ATTENDANCE),
                fields::OWNER_UID,
                subject_uid,
            )
            .await;
        report.lecturer_masters = self
            .wipe_matching(
                &CollectionPath::root(collections::LECTURER_MASTERS),
                fields::AUTH_UID,
                subject_uid,
            )
            .await;

        // Courses are gated on the resolved role, not on whether matching
        // documents exist: a stray dosenUid on someone else's course must
        // not be deleted through a non-lecturer's cascade.
        if role.is_some_and(|r| r.owns_courses()) {
            report.courses = self.wipe_courses(subject_uid).await;
        }

        if profile.is_some() {
            self.store
                .delete(&users, subject_uid)
                .await
                .map_err(|source| CascadeError::Profile {
                    uid: subject_uid.to_string(),
                    report: Some(Box::new(report.clone())),
                    source,
                })?;
            report.profile_deleted = true;
        }

        match self.identity.delete(subject_uid).await {
            Ok(()) => report.identity_deleted = true,
            Err(IdentityError::NotFound(_)) => {
                // The desired end state already holds.
                report.identity_deleted = true;
            }
            Err(source) => {
                tracing::error!(uid = subject_uid, error = %source, "identity deletion failed");
                return Err(CascadeError::Identity {
                    uid: subject_uid.to_string(),
                    report: Box::new(report),
                    source,
                });
            }
        }

        tracing::info!(
            uid = subject_uid,
            deleted = report.total_deleted(),
            clean = report.fully_clean(),
            "account cascade finished"
        );
        Ok(report)
    }

    /// Delete every record of `collection` matching `field == value`.
    /// Returns the number removed; on failure the error carries the count
    /// removed by the batches that had already committed.
    pub async fn delete_all_matching(
        &self,
        collection: &CollectionPath,
        field: &str,
        value: &str,
    ) -> Result<u64, BatchDeleteError> {
        let docs = self
            .store
            .query_eq(collection, field, value)
            .await
            .map_err(|source| BatchDeleteError { deleted: 0, source })?;
        self.delete_documents(collection, docs).await
    }

    /// Delete every record of `collection`.
    async fn delete_all(&self, collection: &CollectionPath) -> Result<u64, BatchDeleteError> {
        let docs = self
            .store
            .list(collection)
            .await
            .map_err(|source| BatchDeleteError { deleted: 0, source })?;
        self.delete_documents(collection, docs).await
    }

    async fn delete_documents(
        &self,
        collection: &CollectionPath,
        docs: Vec<Document>,
    ) -> Result<u64, BatchDeleteError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let refs: Vec<DocumentRef> = docs
            .into_iter()
            .map(|doc| DocumentRef::new(collection.clone(), doc.id))
            .collect();

        // Sequential batches: the running count stays meaningful when a
        // later batch fails, and the backend is never flooded.
        let mut deleted = 0u64;
        for chunk in refs.chunks(self.max_batch_size) {
            self.store
                .delete_batch(chunk.to_vec())
                .await
                .map_err(|source| BatchDeleteError { deleted, source })?;
            deleted += chunk.len() as u64;
            tracing::debug!(collection = %collection, deleted, "delete batch committed");
        }
        Ok(deleted)
    }

    async fn wipe_matching(
        &self,
        collection: &CollectionPath,
        field: &str,
        value: &str,
    ) -> SetOutcome {
        let outcome = SetOutcome::from_result(self.delete_all_matching(collection, field, value).await);
        if let Some(error) = &outcome.error {
            tracing::warn!(collection = %collection, error = %error, "dependent set wipe incomplete");
        }
        outcome
    }

    async fn wipe_collection(&self, collection: &CollectionPath) -> SetOutcome {
        let outcome = SetOutcome::from_result(self.delete_all(collection).await);
        if let Some(error) = &outcome.error {
            tracing::warn!(collection = %collection, error = %error, "dependent set wipe incomplete");
        }
        outcome
    }

    /// Remove every course owned by the subject, clearing each course's
    /// sessions and students first. A course whose subcollections could
    /// not be fully cleared is kept, and the next course is still
    /// attempted.
    async fn wipe_courses(&self, subject_uid: &str) -> SetOutcome {
        let courses_path = CollectionPath::root(collections::COURSES);
        let courses = match self
            .store
            .query_eq(&courses_path, fields::LECTURER_UID, subject_uid)
            .await
        {
            Ok(courses) => courses,
            Err(err) => {
                return SetOutcome {
                    deleted: 0,
                    error: Some(err.to_string()),
                };
            }
        };

        let mut outcome = SetOutcome::default();
        for course in courses {
            let sessions = self
                .wipe_collection(&courses_path.child(&course.id, collections::SESSIONS))
                .await;
            let students = self
                .wipe_collection(&courses_path.child(&course.id, collections::STUDENTS))
                .await;
            tracing::debug!(
                course = %course.id,
                sessions = sessions.deleted,
                students = students.deleted,
                "course subcollections cleared"
            );

            if let Some(err) = sessions.error.or(students.error) {
                if outcome.error.is_none() {
                    outcome.error = Some(format!("course {}: {err}", course.id));
                }
                continue;
            }
            match self.store.delete(&courses_path, &course.id).await {
                Ok(()) => outcome.deleted += 1,
                Err(err) => {
                    if outcome.error.is_none() {
                        outcome.error = Some(format!("course {}: {err}", course.id));
                    }
                }
            }
        }
        outcome
    }

    /// Advisory per-subject guard: two concurrent cascades for the same
    /// uid would double-count and race on the identity step.
    fn claim(&self, subject_uid: &str) -> Result<InFlight<'_>, CascadeError> {
        // A poisoned lock only means a previous cascade panicked; the set
        // itself is still consistent.
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(subject_uid.to_string()) {
            return Err(CascadeError::DeletionInProgress(subject_uid.to_string()));
        }
        Ok(InFlight {
            set: &self.in_flight,
            uid: subject_uid.to_string(),
        })
    }
}

struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    uid: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.uid);
    }
}
