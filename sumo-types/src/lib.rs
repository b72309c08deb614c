//! Shared record types passed between the controller's subsystems.
//!
//! These mirror the narrow record types called for in the reconciler's
//! re-architecture notes: `Tenant`, `Job`, `JobUpdate`, `StorageLocation`,
//! rather than ad-hoc dictionaries passed hand to hand.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod errors;
pub use errors::ErrorKind;

/// A registered tenant and its per-tenant resource quotas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: String,
    pub namespace: String,
    pub api_token: String,
    pub max_cpu: i32,
    pub max_memory_gi: i32,
    pub max_concurrent_jobs: i32,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Derives a Kubernetes-safe namespace from a tenant id: lowercased,
    /// with underscores and spaces folded to hyphens.
    pub fn derive_namespace(tenant_id: &str) -> String {
        tenant_id
            .to_lowercase()
            .replace('_', "-")
            .replace(' ', "-")
    }
}

/// A job's lifecycle status. Advances monotonically: PENDING -> RUNNING ->
/// {SUCCEEDED, FAILED}. No backwards transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCEEDED" => Ok(JobStatus::Succeeded),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(format!("unrecognised job status: {other}")),
        }
    }
}

/// A durable job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub tenant_id: String,
    pub workload_name: String,
    pub namespace: String,
    pub status: JobStatus,
    pub scenario_data: serde_json::Value,
    pub cpu_request: i32,
    pub memory_gi: i32,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result_location: Option<String>,
    pub result_files: Option<serde_json::Value>,
}

impl Job {
    /// `sim-<job_id[:8]>`, the deterministic workload name derived from the id.
    pub fn derive_workload_name(job_id: &Uuid) -> String {
        format!("sim-{}", short_id(job_id))
    }
}

/// First 8 hex characters of a job id, used throughout resource naming
/// (`sim-<shortId>`, `upload-<shortId>`, `sumo-<shortId>-chunk<i>`, ...).
pub fn short_id(job_id: &Uuid) -> String {
    job_id.simple().to_string()[..8].to_string()
}

/// A planned mutation to a job row, produced by a pure reconciler pass and
/// applied by the small driver that owns the actual database writes.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result_location: Option<String>,
    pub result_files: Option<serde_json::Value>,
}

impl JobUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.started_at.is_none()
            && self.finished_at.is_none()
            && self.result_location.is_none()
            && self.result_files.is_none()
    }
}

/// Which result backend a job's output lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Volume,
    S3,
    Gcs,
    Azure,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageBackend::Volume => "volume",
            StorageBackend::S3 => "s3",
            StorageBackend::Gcs => "gcs",
            StorageBackend::Azure => "azure",
        };
        f.write_str(s)
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "volume" | "pvc" => Ok(StorageBackend::Volume),
            "s3" => Ok(StorageBackend::S3),
            "gcs" => Ok(StorageBackend::Gcs),
            "azure" => Ok(StorageBackend::Azure),
            other => Err(format!("unrecognised storage backend: {other}")),
        }
    }
}

/// A resolved location handle for a job's results, returned by the storage
/// planner's `location_for`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageLocation {
    pub backend: StorageBackend,
    /// Volume backend: `/results/<job_id>`. Object-store backends: the
    /// `<prefix>/<tenant>/<job_id>/` key prefix.
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvc_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_or_account: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_derivation_folds_underscores_and_spaces() {
        assert_eq!(Tenant::derive_namespace("Acme_Corp demo"), "acme-corp-demo");
    }

    #[test]
    fn short_id_is_first_eight_hex_chars() {
        let id = Uuid::parse_str("12345678-9abc-def0-1234-56789abcdef0").unwrap();
        assert_eq!(short_id(&id), "12345678");
    }

    #[test]
    fn job_status_round_trips_through_display_and_from_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Succeeded,
            JobStatus::Failed,
        ] {
            let s = status.to_string();
            assert_eq!(JobStatus::from_str(&s).unwrap(), status);
        }
    }

    #[test]
    fn terminal_statuses_are_succeeded_and_failed_only() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
