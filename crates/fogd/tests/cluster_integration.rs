//! Cluster integration tests.
//!
//! Region agents serve their real HTTP router on loopback ports; the
//! scheduler reaches them through `HttpAgentClient`s behind the broker,
//! the way `fogd scheduler` does.

use std::sync::Arc;
use std::time::Duration;

use fog_core::FogConfig;
use fog_core::resources::{CPU, MEMORY};
use fog_core::{ContainerSpec, NodeInfo, Resources, SamplingRequest, WorkloadSubmission};
use foggrid_sampling::{
    AgentClient, Broker, HttpAgentClient, NodeStore, RegionAgent, SamplingError, StaticNodeSource,
    StrategyRegistry, agent_router, run_sync_loop,
};
use foggrid_scheduler::{PluginRegistry, PluginSet, Scheduler, SchedulerHandle, SchedulingOutcome, TopologyCatalog};
use tokio::net::TcpListener;
use tokio::sync::watch;

const GI: u64 = 1 << 30;

fn node(name: &str, region: &str, cpu: u64, mem_gi: u64) -> NodeInfo {
    NodeInfo::new(name, region, Resources::new().with(CPU, cpu).with(MEMORY, mem_gi * GI))
}

/// Serve a region agent on an ephemeral port; returns `host:port`.
async fn spawn_agent(region: &str, nodes: Vec<NodeInfo>) -> String {
    let strategies = StrategyRegistry::with_defaults()
        .build(&["random".to_string(), "round-robin".to_string(), "resource-aware".to_string()])
        .unwrap();
    let agent = Arc::new(RegionAgent::new(region, NodeStore::with_nodes(nodes), strategies));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        axum::serve(listener, agent_router(agent)).await.unwrap();
    });
    addr
}

/// Accepts connections and never answers.
async fn spawn_silent_agent() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

fn test_config() -> FogConfig {
    let mut config = FogConfig::default();
    config.scheduler.sample_basis_points = 10_000;
    config.broker.agent_timeout_ms = 200;
    config.broker.deadline_ms = 1_000;
    config
}

fn clients(agents: &[(&str, &str)]) -> Vec<Arc<dyn AgentClient>> {
    agents
        .iter()
        .map(|(region, addr)| Arc::new(HttpAgentClient::new(*region, *addr)) as Arc<dyn AgentClient>)
        .collect()
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

fn scheduler(config: &FogConfig, broker: Broker) -> Scheduler {
    let catalog = Arc::new(TopologyCatalog::from_config(&config.topology).unwrap());
    let plugins = PluginSet::build(
        &PluginRegistry::with_defaults(),
        &config.scheduler,
        &SchedulerHandle::new(catalog),
    )
    .unwrap();
    Scheduler::new(&config.scheduler, plugins, Arc::new(broker), config.broker.strategy.clone())
}

// ── Broker over HTTP ───────────────────────────────────────────

#[tokio::test]
async fn broker_merges_regions_over_http() {
    let north = spawn_agent("north", vec![node("n-1", "north", 4, 8), node("n-2", "north", 4, 8)]).await;
    let south = spawn_agent("south", vec![node("s-1", "south", 4, 8)]).await;
    let config = test_config();
    let broker = Broker::new(clients(&[("north", &north), ("south", &south)]), &config.broker);

    let set = broker
        .sample_nodes(&SamplingRequest::new(10_000, "round-robin"))
        .await
        .unwrap();
    assert_eq!(set.nodes.len(), 3);
    assert_eq!(set.regions, vec!["north", "south"]);
    assert!(set.failures.is_empty());
}

#[tokio::test]
async fn silent_agent_times_out_and_is_dropped() {
    let live = spawn_agent("live", vec![node("l-1", "live", 4, 8)]).await;
    let silent = spawn_silent_agent().await;
    let config = test_config();
    let broker = Broker::new(clients(&[("live", &live), ("silent", &silent)]), &config.broker);

    let set = broker.sample_nodes(&SamplingRequest::new(10_000, "random")).await.unwrap();
    assert_eq!(set.regions, vec!["live"]);
    assert_eq!(set.failures.len(), 1);
    assert!(set.failures[0].is_timeout());
    assert_eq!(set.failures[0].region(), "silent");
}

#[tokio::test]
async fn all_agents_failing_is_an_error() {
    let silent = spawn_silent_agent().await;
    let config = test_config();
    let broker = Broker::new(
        clients(&[("silent", &silent), ("gone", "127.0.0.1:1")]),
        &config.broker,
    );

    let err = broker.sample_nodes(&SamplingRequest::new(10_000, "random")).await.unwrap_err();
    match err {
        SamplingError::AllAgentsFailed(failures) => {
            assert_eq!(failures.len(), 2);
            assert!(failures.iter().any(|f| f.is_timeout()));
            assert!(failures.iter().any(|f| !f.is_timeout()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unknown_strategy_is_rejected_not_timed_out() {
    let addr = spawn_agent("edge", vec![node("e-1", "edge", 4, 8)]).await;
    let config = test_config();
    let broker = Broker::new(clients(&[("edge", &addr)]), &config.broker);

    let err = broker.sample_nodes(&SamplingRequest::new(100, "gravity")).await.unwrap_err();
    match err {
        SamplingError::AllAgentsFailed(failures) => assert!(!failures[0].is_timeout()),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn cancellation_aborts_fan_out() {
    let silent = spawn_silent_agent().await;
    let mut config = test_config();
    config.broker.agent_timeout_ms = 5_000;
    config.broker.deadline_ms = 5_000;
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let broker = Broker::new(clients(&[("silent", &silent)]), &config.broker).with_cancellation(cancel_rx);

    let fan_out = tokio::spawn(async move { broker.sample_nodes(&SamplingRequest::new(100, "random")).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel_tx.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), fan_out).await.unwrap().unwrap();
    assert!(matches!(result, Err(SamplingError::Cancelled)));
}

// ── Scheduling over HTTP ───────────────────────────────────────

#[tokio::test]
async fn end_to_end_placement_over_http() {
    let edge = spawn_agent(
        "edge",
        vec![node("node-1", "edge", 1, 8), node("node-2", "edge", 3, 8), node("node-3", "edge", 4, 2)],
    )
    .await;
    let config = test_config();
    let broker = Broker::new(clients(&[("edge", &edge)]), &config.broker);
    let scheduler = scheduler(&config, broker);
    let mut outcomes = scheduler.subscribe();
    scheduler.start();

    scheduler.submit(workload("web", 2, 4)).unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
        .await
        .unwrap()
        .unwrap();
    match outcome {
        SchedulingOutcome::Placed(d) => {
            assert_eq!(d.node, "node-2");
            assert_eq!(d.score, 100);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    scheduler.shutdown().await;
}

#[tokio::test]
async fn synced_nodes_become_schedulable() {
    // The agent starts empty; the sync loop fills its store.
    let store = NodeStore::new();
    let strategies = StrategyRegistry::with_defaults().build(&["random".to_string()]).unwrap();
    let agent = Arc::new(RegionAgent::new("edge", store.clone(), strategies));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        axum::serve(listener, agent_router(agent)).await.unwrap();
    });

    let (stop_tx, stop_rx) = watch::channel(false);
    let source = Arc::new(StaticNodeSource::new(vec![node("late-1", "edge", 8, 8)]));
    let sync = tokio::spawn(run_sync_loop(store.clone(), source, Duration::from_millis(20), stop_rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let status = HttpAgentClient::new("edge", addr.clone()).status().await.unwrap();
    assert_eq!(status.nodes, 1);

    let mut config = test_config();
    config.scheduler.max_retries = 0;
    let broker = Broker::new(clients(&[("edge", &addr)]), &config.broker);
    let scheduler = scheduler(&config, broker);
    let mut outcomes = scheduler.subscribe();
    scheduler.start();
    scheduler.submit(workload("job", 1, 1)).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, SchedulingOutcome::Placed(ref d) if d.node == "late-1"));

    scheduler.shutdown().await;
    stop_tx.send(true).unwrap();
    sync.await.unwrap();
}
