use std::collections::HashMap;

use chrono::Utc;
use futures_util::{StreamExt, stream};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::helpers::{format_cpu, format_memory, normalize_timestamp};
use crate::models::k8s::{Deployment, Pod};
use crate::models::views::{
    ContainerRef, HealthStatus, PodRecord, WorkloadCondition, WorkloadRecord,
};

use super::{ClientError, WorkloadApi, metrics};

// Annotation keys that mark a deployment as a game-server workload.
pub const GAME_ANNOTATION: &str = "game-server/game";
pub const INSTANCE_ANNOTATION: &str = "game-server/instance";
pub const COMPONENT_ANNOTATION: &str = "game-server/component";
pub const FILES_URL_ANNOTATION: &str = "game-server/files-url";

const DEFAULT_CONTAINER_ANNOTATION: &str = "kubectl.kubernetes.io/default-container";

const ENRICH_CONCURRENCY: usize = 8;

/// Discovery engine over one orchestrator endpoint. Stateless; every
/// call re-derives its view from the live cluster.
pub struct FleetClient<C: WorkloadApi> {
    api: C,
    default_namespace: String,
}

/// Inspect one raw deployment and produce a normalized record, or
/// `None` when it does not carry the game annotation and therefore
/// does not participate.
pub fn classify(item: &Deployment) -> Option<WorkloadRecord> {
    let annotations = item.metadata.annotations.clone().unwrap_or_default();
    let game = annotations
        .get(GAME_ANNOTATION)
        .filter(|g| !g.is_empty())?
        .clone();
    let instance = annotations
        .get(INSTANCE_ANNOTATION)
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());
    let component = annotations
        .get(COMPONENT_ANNOTATION)
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());

    let replicas = item.spec.replicas.unwrap_or(1);
    let available_replicas = item.status.available_replicas.unwrap_or(0);
    // Scaled to zero is deliberate, not failed; one available replica
    // keeps the workload active even with unavailable siblings.
    let status = if replicas == 0 || available_replicas > 0 {
        HealthStatus::Active
    } else {
        HealthStatus::Failed
    };

    let conditions = item
        .status
        .conditions
        .iter()
        .map(|c| WorkloadCondition {
            condition_type: c.condition_type.clone(),
            status: c.status.clone(),
            message: c.message.clone(),
            last_transition_time: c
                .last_transition_time
                .as_deref()
                .map(normalize_timestamp),
        })
        .collect();

    Some(WorkloadRecord {
        name: item.metadata.name.clone(),
        namespace: item.metadata.namespace.clone(),
        game,
        instance,
        component,
        replicas,
        available_replicas,
        unavailable_replicas: item.status.unavailable_replicas.unwrap_or(0),
        status,
        conditions,
        selector: item.spec.selector.match_labels.clone().unwrap_or_default(),
        files_url: annotations.get(FILES_URL_ANNOTATION).cloned(),
        cpu_usage: None,
        memory_usage: None,
    })
}

/// Comma-joined `key=value` selector in sorted key order, so equal
/// label maps always produce the same query string.
fn join_labels(labels: &HashMap<String, String>) -> String {
    let mut pairs: Vec<String> = labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    pairs.sort();
    pairs.join(",")
}

fn pod_selector(labels: Option<&HashMap<String, String>>, workload: &str) -> String {
    match labels {
        Some(labels) if !labels.is_empty() => join_labels(labels),
        _ => format!("app={}", workload),
    }
}

fn pod_record(pod: &Pod) -> PodRecord {
    let status = match pod.status.phase.as_str() {
        "" => "Unknown".to_string(),
        "Running" => {
            let all_ready = !pod.status.container_statuses.is_empty()
                && pod.status.container_statuses.iter().all(|c| c.ready);
            if all_ready {
                "Running".to_string()
            } else {
                "NotReady".to_string()
            }
        }
        phase => phase.to_string(),
    };

    PodRecord {
        name: pod.metadata.name.clone(),
        namespace: pod.metadata.namespace.clone(),
        status,
        created_at: pod
            .metadata
            .creation_timestamp
            .as_deref()
            .map(normalize_timestamp),
        containers: pod
            .spec
            .containers
            .iter()
            .map(|c| ContainerRef {
                name: c.name.clone(),
                image: c.image.clone(),
            })
            .collect(),
        annotations: pod.metadata.annotations.clone().unwrap_or_default(),
    }
}

impl<C: WorkloadApi> FleetClient<C> {
    pub fn new(api: C, default_namespace: String) -> Self {
        Self {
            api,
            default_namespace,
        }
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    /// List all participating workloads, classified and enriched with
    /// live usage, in a deterministic (namespace, name) order.
    pub async fn list_workloads(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<WorkloadRecord>, ClientError> {
        let items = self.list_raw(namespace).await?;
        let records: Vec<WorkloadRecord> = items.iter().filter_map(classify).collect();

        let mut enriched: Vec<WorkloadRecord> = stream::iter(records)
            .map(|rec| self.enrich(rec))
            .buffered(ENRICH_CONCURRENCY)
            .collect()
            .await;

        enriched.sort_by(|a, b| {
            a.namespace
                .cmp(&b.namespace)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(enriched)
    }

    async fn list_raw(&self, namespace: Option<&str>) -> Result<Vec<Deployment>, ClientError> {
        // An explicitly requested namespace yields the best available
        // view: a failure there is logged, not surfaced.
        if let Some(ns) = namespace {
            return match self.api.list_deployments(Some(ns)).await {
                Ok(items) => Ok(items),
                Err(e) => {
                    warn!(namespace = ns, "namespace listing failed, returning empty view: {}", e);
                    Ok(Vec::new())
                }
            };
        }

        match self.api.list_deployments(None).await {
            Ok(items) => {
                debug!(count = items.len(), "cluster-wide deployment listing");
                Ok(items)
            }
            Err(ClientError::Authorization(reason)) => {
                info!("cluster-wide listing denied ({}), probing namespaces", reason);
                let mut items = Vec::new();
                for ns in self.accessible_namespaces().await? {
                    match self.api.list_deployments(Some(&ns)).await {
                        Ok(mut more) => items.append(&mut more),
                        Err(e) => {
                            warn!(namespace = %ns, "skipping namespace during fallback: {}", e)
                        }
                    }
                }
                Ok(items)
            }
            Err(e) => Err(e),
        }
    }

    /// Which namespaces the caller's credentials may read, determined
    /// by a cheap limit-1 probe per namespace. Namespaces that deny the
    /// probe are excluded; any other probe failure propagates.
    async fn accessible_namespaces(&self) -> Result<Vec<String>, ClientError> {
        let all = match self.api.list_namespaces().await {
            Ok(all) => all,
            Err(e) => {
                warn!(
                    "namespace listing failed ({}), assuming only {:?}",
                    e, self.default_namespace
                );
                return Ok(vec![self.default_namespace.clone()]);
            }
        };

        let mut accessible = Vec::new();
        for ns in all {
            match self.api.probe_deployments(&ns).await {
                Ok(()) => accessible.push(ns),
                Err(ClientError::Authorization(_)) => {
                    debug!(namespace = %ns, "excluded by access probe")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(accessible)
    }

    async fn enrich(&self, mut record: WorkloadRecord) -> WorkloadRecord {
        let selector = pod_selector(Some(&record.selector), &record.name);
        match metrics::collect_usage(&self.api, &record.namespace, &selector).await {
            Ok(usage) if usage.is_empty() => {
                record.cpu_usage = Some("N/A".to_string());
                record.memory_usage = Some("N/A".to_string());
            }
            Ok(usage) => {
                let cpu: f64 = usage.values().map(|u| u.cpu_millicores).sum();
                let memory: i64 = usage.values().map(|u| u.memory_bytes).sum();
                record.cpu_usage = Some(format_cpu(cpu));
                record.memory_usage = Some(format_memory(memory));
            }
            Err(e) => {
                warn!(
                    workload = %record.name,
                    namespace = %record.namespace,
                    "usage enrichment failed: {}", e
                );
                record.cpu_usage = Some("Error".to_string());
                record.memory_usage = Some("Error".to_string());
            }
        }
        record
    }

    /// Pods backing one workload, newest first.
    pub async fn list_pods(
        &self,
        namespace: &str,
        workload: &str,
    ) -> Result<Vec<PodRecord>, ClientError> {
        let deployment = self.api.get_deployment(namespace, workload).await?;
        let selector = pod_selector(deployment.spec.selector.match_labels.as_ref(), workload);
        let pods = self.api.list_pods(namespace, &selector).await?;

        let mut records: Vec<PodRecord> = pods.iter().map(pod_record).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Raw log text for one pod. With no explicit container the pod's
    /// default-container annotation wins, else the orchestrator picks.
    pub async fn get_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> Result<String, ClientError> {
        let container = match container {
            Some(c) => Some(c.to_string()),
            None => {
                let p = self.api.get_pod(namespace, pod).await?;
                p.metadata
                    .annotations
                    .as_ref()
                    .and_then(|a| a.get(DEFAULT_CONTAINER_ANNOTATION))
                    .cloned()
            }
        };
        self.api
            .get_pod_logs(namespace, pod, container.as_deref(), tail_lines)
            .await
    }

    pub async fn scale(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<String, ClientError> {
        self.api.get_deployment(namespace, name).await?;
        let patch = json!({"spec": {"replicas": replicas}});
        self.api.patch_deployment(namespace, name, &patch).await?;

        let action = if replicas > 0 { "started" } else { "stopped" };
        info!(namespace, name, replicas, "deployment {}", action);
        Ok(format!(
            "Deployment {}/{} {} successfully",
            namespace, name, action
        ))
    }

    pub async fn restart(&self, namespace: &str, name: &str) -> Result<String, ClientError> {
        let patch = json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": {
                            "kubectl.kubernetes.io/restartedAt": Utc::now().to_rfc3339()
                        }
                    }
                }
            }
        });
        self.api.patch_deployment(namespace, name, &patch).await?;

        info!(namespace, name, "deployment restarted");
        Ok(format!(
            "Deployment {}/{} restarted successfully",
            namespace, name
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::k8s::{
        DeploymentCondition, DeploymentSpec, DeploymentStatus, LabelSelector, ObjectMeta,
        PodSpec, PodStatus,
    };

    fn deployment(
        annotations: &[(&str, &str)],
        replicas: Option<i32>,
        available: Option<i32>,
    ) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: "web".into(),
                namespace: "default".into(),
                annotations: Some(
                    annotations
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            spec: DeploymentSpec {
                replicas,
                selector: LabelSelector::default(),
            },
            status: DeploymentStatus {
                available_replicas: available,
                ..Default::default()
            },
        }
    }

    #[test]
    fn unannotated_deployments_do_not_participate() {
        assert!(classify(&deployment(&[], Some(1), Some(1))).is_none());
        assert!(classify(&deployment(&[("game-server/game", "")], Some(1), Some(1))).is_none());
        assert!(
            classify(&deployment(&[("other/key", "x")], Some(1), Some(1))).is_none()
        );
    }

    #[test]
    fn instance_and_component_default_to_unknown() {
        let rec = classify(&deployment(&[("game-server/game", "foo")], Some(1), Some(1))).unwrap();
        assert_eq!(rec.game, "foo");
        assert_eq!(rec.instance, "unknown");
        assert_eq!(rec.component, "unknown");
    }

    #[test]
    fn health_derivation() {
        let ann = [("game-server/game", "foo")];
        // scaled to zero is never failed
        let rec = classify(&deployment(&ann, Some(0), None)).unwrap();
        assert_eq!(rec.status, HealthStatus::Active);
        // one available replica keeps it active
        let rec = classify(&deployment(&ann, Some(3), Some(1))).unwrap();
        assert_eq!(rec.status, HealthStatus::Active);
        // wants replicas, none available
        let rec = classify(&deployment(&ann, Some(2), Some(0))).unwrap();
        assert_eq!(rec.status, HealthStatus::Failed);
        let rec = classify(&deployment(&ann, Some(2), None)).unwrap();
        assert_eq!(rec.status, HealthStatus::Failed);
        // unset replica count defaults to 1
        let rec = classify(&deployment(&ann, None, None)).unwrap();
        assert_eq!(rec.status, HealthStatus::Failed);
    }

    #[test]
    fn conditions_copied_with_normalized_timestamps() {
        let mut dep = deployment(&[("game-server/game", "foo")], Some(1), Some(1));
        dep.status.conditions = vec![DeploymentCondition {
            condition_type: "Available".into(),
            status: "True".into(),
            message: Some("ok".into()),
            last_transition_time: Some("2024-03-01T12:00:00+02:00".into()),
        }];
        let rec = classify(&dep).unwrap();
        assert_eq!(rec.conditions.len(), 1);
        assert_eq!(rec.conditions[0].condition_type, "Available");
        assert_eq!(
            rec.conditions[0].last_transition_time.as_deref(),
            Some("2024-03-01T10:00:00+00:00")
        );
    }

    #[test]
    fn files_url_passes_through() {
        let rec = classify(&deployment(
            &[
                ("game-server/game", "foo"),
                ("game-server/files-url", "https://files.example/foo"),
            ],
            Some(1),
            Some(1),
        ))
        .unwrap();
        assert_eq!(rec.files_url.as_deref(), Some("https://files.example/foo"));
    }

    #[test]
    fn selector_joins_sorted_and_falls_back() {
        let labels: HashMap<String, String> = [("b", "2"), ("a", "1")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(pod_selector(Some(&labels), "web"), "a=1,b=2");
        assert_eq!(pod_selector(None, "web"), "app=web");
        assert_eq!(pod_selector(Some(&HashMap::new()), "web"), "app=web");
    }

    fn running_pod(ready: &[bool]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: "web-0".into(),
                namespace: "default".into(),
                ..Default::default()
            },
            spec: PodSpec::default(),
            status: PodStatus {
                phase: "Running".into(),
                container_statuses: ready
                    .iter()
                    .map(|r| crate::models::k8s::ContainerStatus {
                        name: "c".into(),
                        ready: *r,
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn pod_status_derivation() {
        assert_eq!(pod_record(&running_pod(&[true, true])).status, "Running");
        assert_eq!(pod_record(&running_pod(&[true, false])).status, "NotReady");
        assert_eq!(pod_record(&running_pod(&[])).status, "NotReady");

        let mut pod = running_pod(&[true]);
        pod.status.phase = "Pending".into();
        assert_eq!(pod_record(&pod).status, "Pending");
        pod.status.phase = String::new();
        assert_eq!(pod_record(&pod).status, "Unknown");
    }
}
