use std::collections::{BTreeMap, BTreeSet};

use crate::models::views::{GameInstanceGroup, GameSummary, HealthStatus, WorkloadRecord};

#[derive(Default)]
struct GameAccumulator {
    instances: BTreeSet<String>,
    components: BTreeSet<(String, String)>,
    failing: usize,
}

/// Roll workload records up into one summary per game, sorted by game
/// name. Components are counted as distinct (instance, component)
/// pairs.
pub fn summarize_games(records: &[WorkloadRecord]) -> Vec<GameSummary> {
    let mut games: BTreeMap<String, GameAccumulator> = BTreeMap::new();

    for rec in records {
        let acc = games.entry(rec.game.clone()).or_default();
        acc.instances.insert(rec.instance.clone());
        acc.components
            .insert((rec.instance.clone(), rec.component.clone()));
        if rec.status == HealthStatus::Failed {
            acc.failing += 1;
        }
    }

    games
        .into_iter()
        .map(|(name, acc)| GameSummary {
            name,
            instance_count: acc.instances.len(),
            component_count: acc.components.len(),
            failing_deployments: acc.failing,
        })
        .collect()
}

/// Group one game's records by instance. Groups come back sorted by
/// instance name, each group's components sorted by component name.
pub fn list_instances(records: &[WorkloadRecord], game: &str) -> Vec<GameInstanceGroup> {
    let mut instances: BTreeMap<String, Vec<WorkloadRecord>> = BTreeMap::new();

    for rec in records.iter().filter(|r| r.game == game) {
        instances
            .entry(rec.instance.clone())
            .or_default()
            .push(rec.clone());
    }

    instances
        .into_iter()
        .map(|(name, mut components)| {
            components.sort_by(|a, b| a.component.cmp(&b.component));
            GameInstanceGroup { name, components }
        })
        .collect()
}
