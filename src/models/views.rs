use serde::Serialize;
use std::collections::HashMap;

/// Derived workload health. A deployment scaled to zero is `Active`;
/// `Failed` means it wants replicas but none are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Active,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkloadCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// One participating deployment, normalized for the fleet view.
/// `cpu_usage`/`memory_usage` are `None` until metrics enrichment runs,
/// then formatted totals, `"N/A"` when the metrics capability returned
/// nothing, or `"Error"` when enrichment for this record failed.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadRecord {
    pub name: String,
    pub namespace: String,
    pub game: String,
    pub instance: String,
    pub component: String,
    pub replicas: i32,
    pub available_replicas: i32,
    pub unavailable_replicas: i32,
    pub status: HealthStatus,
    pub conditions: Vec<WorkloadCondition>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub selector: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_url: Option<String>,
    pub cpu_usage: Option<String>,
    pub memory_usage: Option<String>,
}

/// Per-game rollup counts for the dashboard listing.
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub name: String,
    pub instance_count: usize,
    pub component_count: usize,
    pub failing_deployments: usize,
}

/// One instance of a game with its components sorted by component name.
#[derive(Debug, Clone, Serialize)]
pub struct GameInstanceGroup {
    pub name: String,
    pub components: Vec<WorkloadRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerRef {
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    pub status: String,
    pub created_at: Option<String>,
    pub containers: Vec<ContainerRef>,
    pub annotations: HashMap<String, String>,
}

/// Aggregated live usage for one pod, summed over its containers.
#[derive(Debug, Clone)]
pub struct PodUsage {
    pub cpu_display: String,
    pub memory_display: String,
    pub cpu_millicores: f64,
    pub memory_bytes: i64,
}
