//! Ensures a tenant's namespace, quota, limit range and result volume
//! exist and match the tenant's current caps, creating or patching
//! whatever is missing or stale. Safe to call on every admission: each
//! step is a no-op once the cluster already matches.

use sumo_orchestrator::{Error, OrchestratorPort, QuotaSpec};
use sumo_types::Tenant;

pub fn quota_resource_name(namespace: &str) -> String {
    format!("{namespace}-quota")
}

pub fn limit_range_name(namespace: &str) -> String {
    format!("{namespace}-limits")
}

pub fn result_pvc_name(namespace: &str) -> String {
    format!("results-{namespace}")
}

fn quota_spec(tenant: &Tenant) -> QuotaSpec {
    QuotaSpec {
        cpu: tenant.max_cpu,
        memory_gi: tenant.max_memory_gi,
        // One pod per allowed concurrent job, plus headroom for the
        // provisioning/upload/cleanup side-workloads that touch the
        // namespace without counting against a tenant's job quota.
        max_pods: tenant.max_concurrent_jobs * 2 + 4,
    }
}

/// Storage class used when the cluster reports none at all.
const FALLBACK_STORAGE_CLASS: &str = "ebs-gp3";

/// Picks the storage class for the tenant's result PVC: the one
/// annotated default, else the first the cluster reports, else
/// [`FALLBACK_STORAGE_CLASS`].
async fn default_storage_class(port: &dyn OrchestratorPort) -> Result<String, Error> {
    let classes = port.list_storage_classes().await?;
    if let Some(default) = classes.iter().find(|c| c.is_default) {
        return Ok(default.name.clone());
    }
    if let Some(first) = classes.into_iter().next() {
        return Ok(first.name);
    }
    Ok(FALLBACK_STORAGE_CLASS.to_string())
}

/// Idempotently provisions everything a tenant's namespace needs:
/// the namespace itself, its `ResourceQuota`, its `LimitRange`, and a
/// shared results `PersistentVolumeClaim`. Returns `true` if any write
/// occurred, `false` if the cluster already matched.
pub async fn ensure_tenant_isolation(
    port: &dyn OrchestratorPort,
    tenant: &Tenant,
    result_volume_size_gi: i32,
) -> Result<bool, Error> {
    let namespace = &tenant.namespace;
    port.ensure_namespace(namespace).await?;

    let quota = quota_spec(tenant);
    let quota_changed = port
        .apply_resource_quota(namespace, &quota_resource_name(namespace), quota)
        .await?;
    let limits_changed = port
        .apply_limit_range(namespace, &limit_range_name(namespace), quota)
        .await?;

    let storage_class = default_storage_class(port).await.unwrap_or_else(|_| FALLBACK_STORAGE_CLASS.to_string());
    let pvc_created = port
        .ensure_pvc(
            namespace,
            &result_pvc_name(namespace),
            result_volume_size_gi,
            Some(&storage_class),
        )
        .await?;

    let changed = quota_changed || limits_changed || pvc_created;
    if changed {
        tracing::info!(namespace, quota_changed, limits_changed, pvc_created, "tenant isolation reconciled");
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sumo_orchestrator::fake::FakeOrchestrator;

    use super::*;

    fn tenant() -> Tenant {
        Tenant {
            tenant_id: "acme".to_string(),
            namespace: "acme".to_string(),
            api_token: "tok".to_string(),
            max_cpu: 4,
            max_memory_gi: 8,
            max_concurrent_jobs: 3,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn second_call_is_a_pure_no_op() {
        let port = FakeOrchestrator::new();
        let t = tenant();
        assert!(ensure_tenant_isolation(&port, &t, 50).await.unwrap());
        assert!(!ensure_tenant_isolation(&port, &t, 50).await.unwrap());
    }

    #[tokio::test]
    async fn quota_cap_change_forces_a_write() {
        let port = FakeOrchestrator::new();
        let mut t = tenant();
        ensure_tenant_isolation(&port, &t, 50).await.unwrap();
        t.max_cpu = 16;
        assert!(ensure_tenant_isolation(&port, &t, 50).await.unwrap());
    }

    #[tokio::test]
    async fn resource_names_are_derived_from_namespace() {
        assert_eq!(quota_resource_name("acme"), "acme-quota");
        assert_eq!(limit_range_name("acme"), "acme-limits");
        assert_eq!(result_pvc_name("acme"), "results-acme");
    }
}
