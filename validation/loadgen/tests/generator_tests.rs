//! Tree shape and teardown order of generated unit trees.

use loadgen::pipeline::{MemoryPipeline, PipelineEvent};
use loadgen::{Counters, LoadConfig, UnitGenerator};
use std::sync::Arc;
use std::time::Duration;

fn setup(config: &LoadConfig) -> (UnitGenerator<MemoryPipeline>, Arc<MemoryPipeline>, Arc<Counters>) {
    let pipeline = Arc::new(MemoryPipeline::recording());
    let counters = Arc::new(Counters::new());
    let generator = UnitGenerator::new(config, pipeline.clone(), counters.clone());
    (generator, pipeline, counters)
}

fn starts(events: &[PipelineEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::UnitStarted { id, .. } => Some(*id),
            _ => None,
        })
        .collect()
}

fn ends(events: &[PipelineEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::UnitEnded { id, .. } => Some(*id),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Tree shape
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_depth_d_creates_d_plus_one_units() {
    for depth in [0usize, 1, 3, 8] {
        let config = LoadConfig {
            depth,
            metrics: false,
            ..Default::default()
        };
        let (generator, pipeline, counters) = setup(&config);
        let tree = generator.generate(0).await;

        let events = pipeline.events();
        assert_eq!(tree.units, depth as u64 + 1);
        assert_eq!(starts(&events).len(), depth + 1);
        assert_eq!(ends(&events).len(), depth + 1);
        assert_eq!(counters.units(), depth as u64 + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_end_order_is_reverse_of_start_order() {
    let config = LoadConfig {
        depth: 6,
        ..Default::default()
    };
    let (generator, pipeline, _) = setup(&config);
    generator.generate(2).await;

    let events = pipeline.events();
    let mut started = starts(&events);
    started.reverse();
    assert_eq!(ends(&events), started);

    // Every start precedes every end.
    let first_end = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::UnitEnded { .. }))
        .unwrap();
    assert!(events[first_end..]
        .iter()
        .all(|e| !matches!(e, PipelineEvent::UnitStarted { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_children_nest_linearly_under_root() {
    let config = LoadConfig {
        depth: 3,
        attr_count: 4,
        ..Default::default()
    };
    let (generator, pipeline, _) = setup(&config);
    generator.generate(9).await;

    let started: Vec<_> = pipeline
        .events()
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::UnitStarted {
                id,
                parent,
                name,
                attributes,
                ..
            } => Some((id, parent, name, attributes)),
            _ => None,
        })
        .collect();

    let names: Vec<_> = started.iter().map(|s| s.2.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "worker-9-root",
            "worker-9-child-3",
            "worker-9-child-2",
            "worker-9-child-1"
        ]
    );

    assert_eq!(started[0].1, None);
    for pair in started.windows(2) {
        assert_eq!(pair[1].1, Some(pair[0].0));
    }
    assert!(started.iter().all(|s| s.3 == 4));
}

#[tokio::test(start_paused = true)]
async fn test_root_context_points_at_root_unit() {
    let config = LoadConfig {
        depth: 2,
        ..Default::default()
    };
    let (generator, pipeline, _) = setup(&config);
    let tree = generator.generate(0).await;

    let root_id = starts(&pipeline.events())[0];
    assert_eq!(tree.root, Some(root_id));
}

// ============================================================================
// Companion telemetry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_metric_once_per_tree_tagged_with_worker() {
    let config = LoadConfig {
        depth: 2,
        metrics: true,
        ..Default::default()
    };
    let (generator, pipeline, _) = setup(&config);
    generator.generate(4).await;
    generator.generate(4).await;

    let counters: Vec<_> = pipeline
        .events()
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::Counter {
                metric,
                delta,
                tags,
            } => Some((metric, delta, tags)),
            _ => None,
        })
        .collect();

    assert_eq!(counters.len(), 2);
    for (metric, delta, tags) in counters {
        assert_eq!(metric, loadgen::generator::TREES_GENERATED_METRIC);
        assert_eq!(delta, 1);
        assert_eq!(tags, vec![("worker_id", 4)]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_metric_or_log_when_disabled() {
    let config = LoadConfig {
        depth: 1,
        metrics: false,
        logs: false,
        ..Default::default()
    };
    let (generator, pipeline, counters) = setup(&config);
    generator.generate(0).await;

    assert_eq!(pipeline.counter_total(), 0);
    assert_eq!(pipeline.logs_emitted(), 0);
    assert_eq!(counters.logs(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_one_log_per_tree_after_root_ends() {
    let config = LoadConfig {
        depth: 2,
        logs: true,
        attr_count: 3,
        ..Default::default()
    };
    let (generator, pipeline, counters) = setup(&config);
    generator.generate(1).await;

    let events = pipeline.events();
    let log_pos = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::Log { .. }))
        .unwrap();
    let last_end = events
        .iter()
        .rposition(|e| matches!(e, PipelineEvent::UnitEnded { .. }))
        .unwrap();
    assert!(log_pos > last_end);

    match &events[log_pos] {
        PipelineEvent::Log {
            unit, attributes, ..
        } => {
            assert_eq!(*unit, Some(starts(&events)[0]));
            assert_eq!(*attributes, 3);
        }
        _ => unreachable!(),
    }
    assert_eq!(counters.logs(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tree_completes_even_if_slow() {
    let config = LoadConfig {
        depth: 20,
        max_child_delay: Duration::from_millis(4),
        ..Default::default()
    };
    let (generator, pipeline, _) = setup(&config);
    let tree = generator.generate(0).await;

    assert_eq!(pipeline.open_units(), 0);
    assert!(tree.elapsed <= Duration::from_millis(80));
}
