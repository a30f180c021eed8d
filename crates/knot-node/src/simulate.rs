//! In-process gossip simulation
//!
//! N services run as tokio tasks arranged in a ring. A single sync token
//! travels round the ring; the holder syncs with its next peer (round
//! robin), waits `sync.interval_ms`, then hands the token on. When the
//! step budget is spent a stop token follows the same path.

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::service::ConsensusService;
use crate::sync::SyncMessage;
use hashbrown::HashMap;
use knot_core::{CreatorId, EventId, Round};
use knot_crypto::KeyPair;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Simulation parameters
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub nodes: usize,
    pub steps: usize,
    /// Template for every node; `expected_participants` is set to `nodes`
    pub node: NodeConfig,
}

impl SimulationConfig {
    pub fn new(nodes: usize, steps: usize) -> Self {
        Self {
            nodes,
            steps,
            node: NodeConfig::default(),
        }
    }
}

/// Final state of one simulated node
#[derive(Clone, Debug, Serialize)]
pub struct NodeReport {
    pub name: String,
    /// Hex-encoded creator id
    pub creator: String,
    pub events: usize,
    pub max_round: Round,
    pub ordered: usize,
    #[serde(skip)]
    pub log: Vec<EventId>,
}

/// Outcome of a simulation run
#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    pub nodes: usize,
    pub steps: usize,
    pub reports: Vec<NodeReport>,
    /// Length of the consensus prefix every node agrees on
    pub common_prefix: usize,
    /// Every pair of logs agrees on their common length
    pub consistent: bool,
    /// Prometheus exposition of the first node, when metrics are enabled
    #[serde(skip)]
    pub metrics: Option<String>,
}

#[derive(Clone, Copy, Debug)]
enum Token {
    Sync { step: usize },
    Stop,
}

/// Run the ring simulation to completion
pub async fn run_simulation(config: SimulationConfig) -> Result<SimulationReport> {
    if config.nodes < 2 {
        return Err(NodeError::Simulation(format!(
            "need at least 2 nodes, got {}",
            config.nodes
        )));
    }

    let mut node_config = config.node.clone();
    node_config.consensus.expected_participants = config.nodes;

    let mut services = Vec::with_capacity(config.nodes);
    for i in 0..config.nodes {
        let mut per_node = node_config.clone();
        per_node.node.name = format!("node-{i}");
        let keys = KeyPair::derive("knot.simulation", i as u64);
        services.push(Arc::new(ConsensusService::new(&per_node, keys)?));
    }
    for service in &services {
        for peer in &services {
            service.add_peer(peer.creator_id());
        }
    }
    let directory: Arc<HashMap<CreatorId, Arc<ConsensusService>>> = Arc::new(
        services
            .iter()
            .map(|s| (s.creator_id(), Arc::clone(s)))
            .collect(),
    );

    let (senders, receivers): (Vec<_>, Vec<_>) =
        (0..config.nodes).map(|_| mpsc::channel::<Token>(1)).unzip();
    let interval = Duration::from_millis(node_config.sync.interval_ms);

    info!(nodes = config.nodes, steps = config.steps, "starting simulation");

    let mut handles = Vec::with_capacity(config.nodes);
    for (i, mut inbox) in receivers.into_iter().enumerate() {
        let service = Arc::clone(&services[i]);
        let directory = Arc::clone(&directory);
        let next = senders[(i + 1) % config.nodes].clone();
        let steps = config.steps;

        handles.push(tokio::spawn(async move {
            while let Some(token) = inbox.recv().await {
                match token {
                    Token::Stop => {
                        let _ = next.send(Token::Stop).await;
                        break;
                    }
                    Token::Sync { step } if step >= steps => {
                        let _ = next.send(Token::Stop).await;
                        break;
                    }
                    Token::Sync { step } => {
                        if let Err(e) = gossip_once(&service, &directory) {
                            let _ = next.send(Token::Stop).await;
                            return Err(e);
                        }
                        if !interval.is_zero() {
                            tokio::time::sleep(interval).await;
                        }
                        let _ = next.send(Token::Sync { step: step + 1 }).await;
                    }
                }
            }
            Ok::<(), NodeError>(())
        }));
    }

    senders[0]
        .send(Token::Sync { step: 0 })
        .await
        .map_err(|e| NodeError::Simulation(e.to_string()))?;
    drop(senders);

    for handle in handles {
        handle
            .await
            .map_err(|e| NodeError::Simulation(e.to_string()))??;
    }

    let reports: Vec<NodeReport> = services.iter().map(|s| report(s)).collect();
    let (consistent, common_prefix) = check_prefixes(&reports);
    let metrics = services[0].metrics().map(|m| m.render()).transpose()?;
    info!(consistent, common_prefix, "simulation finished");

    Ok(SimulationReport {
        nodes: config.nodes,
        steps: config.steps,
        reports,
        common_prefix,
        consistent,
        metrics,
    })
}

/// One sync from `service` to its next peer, over the wire encoding
fn gossip_once(
    service: &ConsensusService,
    directory: &HashMap<CreatorId, Arc<ConsensusService>>,
) -> Result<()> {
    let Some(peer) = service.next_peer() else {
        return Ok(());
    };
    let Some(target) = directory.get(&peer) else {
        return Ok(());
    };

    let bytes = service.prepare_sync(&peer).encode()?;
    let message = SyncMessage::decode(&bytes)?;
    let admission = target.receive_sync(message)?;
    debug!(from = service.name(), to = target.name(), bytes = bytes.len(), created = ?admission.map(|a| a.id), "gossip");
    Ok(())
}

fn report(service: &ConsensusService) -> NodeReport {
    let stats = service.stats();
    let log: Vec<EventId> = service
        .consensus_log()
        .into_iter()
        .map(|o| o.event.id())
        .collect();
    NodeReport {
        name: service.name().to_string(),
        creator: service.creator_id().to_hex(),
        events: stats.events,
        max_round: stats.max_round,
        ordered: log.len(),
        log,
    }
}

/// Whether all logs agree pairwise on their shared length, and the length
/// of the shortest log.
pub fn check_prefixes(reports: &[NodeReport]) -> (bool, usize) {
    let common = reports.iter().map(|r| r.log.len()).min().unwrap_or(0);
    let consistent = reports.iter().all(|a| {
        reports.iter().all(|b| {
            let shared = a.log.len().min(b.log.len());
            a.log[..shared] == b.log[..shared]
        })
    });
    (consistent, common)
}
