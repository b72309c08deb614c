//! Durable state for tenants and jobs, backed by Postgres via
//! `deadpool-postgres`. One connection pool is shared across the HTTP
//! surface and the reconciler loop.

mod error;
mod jobs;
mod schema;
mod tenants;

pub use error::Error;
pub use jobs::{
    get_job, get_job_for_tenant, insert_job, list_active_jobs, list_all_jobs, list_jobs_by_status,
    list_jobs_for_tenant, list_jobs_pending_upload, update_job,
};
pub use schema::init_schema;
pub use tenants::{
    count_active_jobs, get_tenant, get_tenant_by_token, insert_tenant, list_tenants, regenerate_token,
    update_tenant_limits,
};

#[cfg(test)]
mod tests {
    use sumo_types::JobUpdate;

    #[test]
    fn empty_job_update_is_detected() {
        assert!(JobUpdate::default().is_empty());
    }
}
