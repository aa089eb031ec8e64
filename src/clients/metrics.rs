use std::collections::HashMap;

use tracing::{error, warn};

use crate::helpers::{ParseError, format_cpu, format_memory, parse_cpu, parse_memory};
use crate::models::k8s::PodMetrics;
use crate::models::views::PodUsage;

use super::{ClientError, WorkloadApi};

/// Query live usage for all pods matching `selector` in `namespace`,
/// keyed by pod name. Metrics are best-effort: an absent metrics
/// capability or a failed query degrades to an empty map, never an
/// error. Malformed quantities do propagate so the caller can mark the
/// one affected record.
pub async fn collect_usage<C: WorkloadApi>(
    api: &C,
    namespace: &str,
    selector: &str,
) -> Result<HashMap<String, PodUsage>, ClientError> {
    let items = match api.list_pod_metrics(namespace, selector).await {
        Ok(items) => items,
        Err(ClientError::NotFound(_)) => {
            warn!(namespace, "metrics capability not installed, skipping usage");
            return Ok(HashMap::new());
        }
        Err(e) => {
            error!(namespace, selector, "pod metrics query failed: {}", e);
            return Ok(HashMap::new());
        }
    };

    let mut usage = HashMap::new();
    for pod in &items {
        usage.insert(pod.metadata.name.clone(), sum_pod(pod)?);
    }
    Ok(usage)
}

/// Sum container usage into one total per pod.
fn sum_pod(pod: &PodMetrics) -> Result<PodUsage, ParseError> {
    let mut cpu_millicores = 0.0;
    let mut memory_bytes = 0;
    for container in &pod.containers {
        cpu_millicores += parse_cpu(&container.usage.cpu)?;
        memory_bytes += parse_memory(&container.usage.memory)?;
    }
    Ok(PodUsage {
        cpu_display: format_cpu(cpu_millicores),
        memory_display: format_memory(memory_bytes),
        cpu_millicores,
        memory_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::k8s::{ContainerMetrics, ObjectMeta, ResourceUsage};

    fn pod_metrics(containers: &[(&str, &str, &str)]) -> PodMetrics {
        PodMetrics {
            metadata: ObjectMeta {
                name: "web-0".into(),
                ..Default::default()
            },
            containers: containers
                .iter()
                .map(|(name, cpu, memory)| ContainerMetrics {
                    name: name.to_string(),
                    usage: ResourceUsage {
                        cpu: cpu.to_string(),
                        memory: memory.to_string(),
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn sums_containers() {
        let pod = pod_metrics(&[("app", "250m", "256Mi"), ("sidecar", "1", "1Gi")]);
        let usage = sum_pod(&pod).unwrap();
        assert_eq!(usage.cpu_millicores, 1250.0);
        assert_eq!(usage.memory_bytes, 256 * 1024 * 1024 + 1024 * 1024 * 1024);
        assert_eq!(usage.cpu_display, "1.25 cores");
        assert_eq!(usage.memory_display, "1.25Gi");
    }

    #[test]
    fn malformed_quantity_is_an_error() {
        let pod = pod_metrics(&[("app", "bogus", "256Mi")]);
        assert!(sum_pod(&pod).is_err());
    }
}
