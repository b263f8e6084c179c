use std::collections::HashMap;

use crate::event::SchedulerEvent;

/// One independent group of events sharing a `loop_id` (or none).
#[derive(Debug, Clone)]
pub struct Group {
    pub group_id: String,
    pub event_ids: Vec<String>,
    pub total_duration_ms: u64,
}

/// A lane of groups assigned to one of `parallel_budget` workers.
#[derive(Debug, Clone, Default)]
pub struct Lane {
    pub groups: Vec<Group>,
    pub total_duration_ms: u64,
}

/// Partitions events into groups by `loop_id` (events with no `loop_id`
/// each form their own singleton group), then distributes groups onto
/// `parallel_budget` lanes with largest-first bin packing. Execution
/// order within a group stays sequential; group-to-lane assignment is
/// deterministic given the same durations and budget.
pub fn partition_into_lanes(
    events: &[SchedulerEvent],
    durations_ms: &HashMap<String, u64>,
    parallel_budget: usize,
) -> Vec<Lane> {
    let mut groups: HashMap<String, Group> = HashMap::new();
    for event in events {
        let group_id = event
            .loop_id
            .clone()
            .unwrap_or_else(|| format!("solo:{}", event.event_id));
        let duration = durations_ms.get(&event.event_id).copied().unwrap_or(0);
        let entry = groups.entry(group_id.clone()).or_insert_with(|| Group {
            group_id: group_id.clone(),
            event_ids: Vec::new(),
            total_duration_ms: 0,
        });
        entry.event_ids.push(event.event_id.clone());
        entry.total_duration_ms += duration;
    }

    // Between-group order is deterministic (sorted by group id); events
    // within a group keep the order they were supplied in (sequential).
    let mut group_list: Vec<Group> = groups.into_values().collect();
    group_list.sort_by(|a, b| a.group_id.cmp(&b.group_id));
    // Largest-first bin packing: stable on ties because of the prior sort
    // by group id.
    group_list.sort_by(|a, b| b.total_duration_ms.cmp(&a.total_duration_ms));

    let budget = parallel_budget.max(1);
    let mut lanes: Vec<Lane> = (0..budget).map(|_| Lane::default()).collect();
    for group in group_list {
        let lightest = lanes
            .iter()
            .enumerate()
            .min_by_key(|(_, l)| l.total_duration_ms)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        lanes[lightest].total_duration_ms += group.total_duration_ms;
        lanes[lightest].groups.push(group);
    }
    for lane in &mut lanes {
        lane.groups.sort_by(|a, b| a.group_id.cmp(&b.group_id));
    }
    lanes
}

/// `T(stage) = S_main + max_i S_sub,i`: the offline parallelism
/// accounting metric recorded per stage.
pub fn stage_metric(main_duration_ms: u64, sub_durations_ms: &[u64]) -> u64 {
    main_duration_ms + sub_durations_ms.iter().copied().max().unwrap_or(0)
}
