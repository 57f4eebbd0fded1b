//! End-to-end scheduling scenarios.
//!
//! Region agents run in-process behind `LocalAgentClient`s; the broker,
//! pipeline and scheduler are the real ones.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fog_core::config::{SchedulerConfig, ScorePluginEntry};
use fog_core::resources::{CPU, MEMORY};
use fog_core::{
    ContainerSpec, FogConfig, NodeInfo, Resources, ServiceGraphMembership, WorkloadSubmission,
};
use foggrid_sampling::{AgentClient, Broker, LocalAgentClient, NodeStore, RegionAgent, StrategyRegistry};
use foggrid_scheduler::{
    PluginRegistry, PluginSet, Scheduler, SchedulerHandle, SchedulingOutcome, SchedulingQueue, QueuedRequest,
    TopologyCatalog,
};
use foggrid_scheduler::plugins::priority_sort::PrioritySort;
use tokio::sync::broadcast;

const GI: u64 = 1 << 30;

fn node(name: &str, region: &str, cpu: u64, mem_gi: u64) -> NodeInfo {
    NodeInfo::new(name, region, Resources::new().with(CPU, cpu).with(MEMORY, mem_gi * GI))
}

fn agent(region: &str, nodes: Vec<NodeInfo>) -> Arc<dyn AgentClient> {
    let strategies = StrategyRegistry::with_defaults()
        .build(&["random".to_string(), "round-robin".to_string()])
        .unwrap();
    let agent = RegionAgent::new(region, NodeStore::with_nodes(nodes), strategies);
    Arc::new(LocalAgentClient::new(Arc::new(agent)))
}

fn workload(id: &str, cpu: u64, mem_gi: u64) -> WorkloadSubmission {
    WorkloadSubmission {
        id: id.to_string(),
        containers: vec![ContainerSpec {
            name: "main".to_string(),
            limits: Resources::new().with(CPU, cpu).with(MEMORY, mem_gi * GI),
        }],
        priority: None,
        created_at_ms: None,
        service_graph: None,
    }
}

fn build_scheduler(config: &FogConfig, agents: Vec<Arc<dyn AgentClient>>) -> Scheduler {
    let catalog = Arc::new(TopologyCatalog::from_config(&config.topology).unwrap());
    let plugins = PluginSet::build(
        &PluginRegistry::with_defaults(),
        &config.scheduler,
        &SchedulerHandle::new(catalog),
    )
    .unwrap();
    let broker = Broker::new(agents, &config.broker);
    Scheduler::new(&config.scheduler, plugins, Arc::new(broker), config.broker.strategy.clone())
}

async fn next_outcome(rx: &mut broadcast::Receiver<SchedulingOutcome>) -> SchedulingOutcome {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no outcome within 5s")
        .unwrap()
}

fn placed(outcome: SchedulingOutcome) -> fog_core::PlacementDecision {
    match outcome {
        SchedulingOutcome::Placed(d) => d,
        other => panic!("expected a placement, got {other:?}"),
    }
}

// ── Scenario A: only one node fits ─────────────────────────────

#[tokio::test]
async fn single_feasible_node_wins_with_max_score() {
    let mut config = FogConfig::default();
    config.scheduler.sample_basis_points = 10_000;

    let nodes = vec![
        node("node-1", "edge", 1, 8),
        node("node-2", "edge", 3, 8),
        node("node-3", "edge", 4, 2),
    ];
    let scheduler = build_scheduler(&config, vec![agent("edge", nodes)]);
    let mut outcomes = scheduler.subscribe();
    scheduler.start();

    scheduler.submit(workload("web", 2, 4)).unwrap();
    let decision = placed(next_outcome(&mut outcomes).await);
    assert_eq!(decision.node, "node-2");
    assert_eq!(decision.region, "edge");
    assert_eq!(decision.score, 100);
    assert_eq!(decision.attempts, 1);

    scheduler.shutdown().await;
}

// ── Scenario B: priority order ─────────────────────────────────

#[tokio::test]
async fn queue_dequeues_higher_priority_first() {
    let queue = SchedulingQueue::new(8, Arc::new(PrioritySort::new()));
    let mut low = workload("low", 1, 1);
    low.priority = Some(5);
    low.created_at_ms = Some(1);
    let mut high = workload("high", 1, 1);
    high.priority = Some(10);
    high.created_at_ms = Some(2);

    queue.try_enqueue(QueuedRequest::new(low.validate().unwrap())).unwrap();
    queue.try_enqueue(QueuedRequest::new(high.validate().unwrap())).unwrap();

    assert_eq!(queue.dequeue().await.unwrap().request.id, "high");
    assert_eq!(queue.dequeue().await.unwrap().request.id, "low");
}

#[tokio::test]
async fn scheduler_places_higher_priority_first() {
    let config = FogConfig {
        scheduler: SchedulerConfig {
            workers: 1,
            sample_basis_points: 10_000,
            ..SchedulerConfig::default()
        },
        ..FogConfig::default()
    };
    let scheduler = build_scheduler(&config, vec![agent("edge", vec![node("node-1", "edge", 8, 8)])]);
    let mut outcomes = scheduler.subscribe();

    let mut low = workload("batch", 1, 1);
    low.priority = Some(5);
    let mut high = workload("checkout", 1, 1);
    high.priority = Some(10);
    scheduler.submit(low).unwrap();
    scheduler.submit(high).unwrap();
    scheduler.start();

    assert_eq!(next_outcome(&mut outcomes).await.request_id(), "checkout");
    assert_eq!(next_outcome(&mut outcomes).await.request_id(), "batch");
    scheduler.shutdown().await;
}

// ── Multi-region sampling ──────────────────────────────────────

#[tokio::test]
async fn nodes_from_every_region_are_candidates() {
    let mut config = FogConfig::default();
    config.scheduler.sample_basis_points = 10_000;

    let agents = vec![
        agent("north", vec![node("north-1", "north", 1, 1), node("north-2", "north", 1, 1)]),
        agent("south", vec![node("south-1", "south", 16, 32)]),
    ];
    let scheduler = build_scheduler(&config, agents);
    let mut outcomes = scheduler.subscribe();
    scheduler.start();

    scheduler.submit(workload("analytics", 8, 16)).unwrap();
    let decision = placed(next_outcome(&mut outcomes).await);
    assert_eq!(decision.node, "south-1");
    assert_eq!(decision.region, "south");

    scheduler.shutdown().await;
}

// ── Service-graph placement ────────────────────────────────────

const TOPOLOGY: &str = r#"
[scheduler]
workers = 1
sample_basis_points = 10000

[scheduler.plugins]
pre_filter = ["ResourcesFit", "NetworkQos"]
filter = ["ResourcesFit", "NetworkQos", "RegionHeadLatency"]
score = [
    { name = "ResourcesFit" },
    { name = "NetworkQos" },
    { name = "RegionHeadLatency", weight = 2 },
]
reserve = ["PlacementRecorder"]

[topology]
nodes = ["n1", "n2", "n3"]
region_head = "n1"

[[topology.links]]
from = "n1"
to = "n2"
qos = { quality_class = "1Gbps", latency = { packet_delay_ms = 5 } }

[[topology.links]]
from = "n2"
to = "n3"
qos = { quality_class = "1Gbps", latency = { packet_delay_ms = 60 } }

[[topology.service_graphs]]
name = "shop"
max_delay_ms = 50
services = ["frontend", "cart"]

[[topology.service_graphs.links]]
from = "frontend"
to = "cart"
qos = { max_packet_delay_ms = 10 }
"#;

#[tokio::test]
async fn linked_service_lands_near_its_peer() {
    let config = FogConfig::from_toml_str(TOPOLOGY).unwrap();
    let nodes = vec![
        node("n1", "edge", 2, 8),
        node("n2", "edge", 8, 8),
        node("n3", "edge", 16, 16),
    ];
    let scheduler = build_scheduler(&config, vec![agent("edge", nodes)]);
    let mut outcomes = scheduler.subscribe();

    let mut frontend = workload("frontend-1", 1, 1);
    frontend.priority = Some(10);
    frontend.service_graph = Some(ServiceGraphMembership {
        graph: "shop".to_string(),
        service: "frontend".to_string(),
    });
    let mut cart = workload("cart-1", 4, 1);
    cart.priority = Some(5);
    cart.service_graph = Some(ServiceGraphMembership {
        graph: "shop".to_string(),
        service: "cart".to_string(),
    });

    scheduler.submit(frontend).unwrap();
    scheduler.submit(cart).unwrap();
    scheduler.start();

    // n3 is 65ms from the head, beyond the graph's 50ms bound.
    let frontend = placed(next_outcome(&mut outcomes).await);
    assert_eq!(frontend.request_id, "frontend-1");
    assert_ne!(frontend.node, "n3");

    // n1 lacks cpu; n3 is too far from the frontend.
    let cart = placed(next_outcome(&mut outcomes).await);
    assert_eq!(cart.request_id, "cart-1");
    assert_eq!(cart.node, "n2");

    scheduler.shutdown().await;
}

#[tokio::test]
async fn unknown_service_graph_is_unschedulable() {
    let mut config = FogConfig::from_toml_str(TOPOLOGY).unwrap();
    config.scheduler.max_retries = 0;
    let scheduler = build_scheduler(&config, vec![agent("edge", vec![node("n2", "edge", 8, 8)])]);
    let mut outcomes = scheduler.subscribe();
    scheduler.start();

    let mut stray = workload("stray", 1, 1);
    stray.service_graph = Some(ServiceGraphMembership {
        graph: "bank".to_string(),
        service: "ledger".to_string(),
    });
    scheduler.submit(stray).unwrap();

    match next_outcome(&mut outcomes).await {
        SchedulingOutcome::Unschedulable { reason, attempts, .. } => {
            assert!(reason.contains("unknown service graph"));
            assert_eq!(attempts, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    scheduler.shutdown().await;
}

#[tokio::test]
async fn failing_region_is_dropped_from_sample() {
    let mut config = FogConfig::default();
    config.scheduler.sample_basis_points = 10_000;

    // An agent without the configured strategy rejects every request.
    let strategies: HashMap<_, _> = StrategyRegistry::with_defaults()
        .build(&["round-robin".to_string()])
        .unwrap();
    let broken: Arc<dyn AgentClient> = Arc::new(LocalAgentClient::new(Arc::new(RegionAgent::new(
        "broken",
        NodeStore::with_nodes(vec![node("b-1", "broken", 64, 64)]),
        strategies,
    ))));

    let scheduler = build_scheduler(&config, vec![broken, agent("edge", vec![node("e-1", "edge", 4, 8)])]);
    let mut outcomes = scheduler.subscribe();
    scheduler.start();

    scheduler.submit(workload("api", 1, 1)).unwrap();
    let decision = placed(next_outcome(&mut outcomes).await);
    assert_eq!(decision.node, "e-1");
    scheduler.shutdown().await;
}

// ── Least recently used node ───────────────────────────────────

#[tokio::test]
async fn consecutive_placements_spread_over_idle_nodes() {
    let mut config = FogConfig::default();
    config.scheduler.sample_basis_points = 10_000;
    config.scheduler.workers = 1;
    config.scheduler.plugins.score = vec![ScorePluginEntry {
        name: "LeastRecentlyUsedNode".to_string(),
        weight: 1,
    }];

    let nodes = vec![node("e-1", "edge", 8, 8), node("e-2", "edge", 8, 8), node("e-3", "edge", 8, 8)];
    let scheduler = build_scheduler(&config, vec![agent("edge", nodes)]);
    let mut outcomes = scheduler.subscribe();
    scheduler.start();

    let mut used = Vec::new();
    for id in ["a", "b", "c"] {
        scheduler.submit(workload(id, 1, 1)).unwrap();
        used.push(placed(next_outcome(&mut outcomes).await).node);
    }
    used.sort();
    assert_eq!(used, vec!["e-1", "e-2", "e-3"]);

    scheduler.shutdown().await;
}
