//! Failover trials.
//!
//! # Responsibilities
//! - Remove the current leader/primary through the fault injector
//! - Wait, bounded, for a different node to take over
//! - Verify consistency through the new leader and restore the removed node
//!
//! # Design Decisions
//! - Every trial returns a `FailoverRecord`; failures are tags, not errors
//! - The promotion wait is cut by a deadline fixed at injection time, so a
//!   slow probe cannot push a trial past its bound
//! - Once a node has been stopped, restoring it is always attempted

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::time::{self, Instant};
use uuid::Uuid;

use crate::config::{FailoverConfig, TrialTarget};
use crate::consensus::{LeaderVerifier, SplitBrainDetected};
use crate::failover::consistency::ConsistencyVerifier;
use crate::failover::injector::FaultInjector;
use crate::failover::record::{
    FailoverRecord, FailureKind, QuorumTrialRecord, RestoreOutcome, TimeoutCause, TrialPhase, TrialSummary,
};
use crate::observability::metrics;
use crate::probe::{ProbeError, Prober};
use crate::resilience::backoff::calculate_backoff;
use crate::topology::{quorum_size, NodeDescriptor, TierKind, Topology};

/// How the promotion wait ended before the deadline.
enum Takeover {
    Promoted(NodeDescriptor),
    SplitBrain(SplitBrainDetected),
}

pub struct FailoverOrchestrator {
    topology: Arc<Topology>,
    verifier: LeaderVerifier,
    consistency: ConsistencyVerifier,
    injector: Arc<dyn FaultInjector>,
    config: FailoverConfig,
}

impl FailoverOrchestrator {
    pub fn new(
        topology: Arc<Topology>,
        prober: Prober,
        injector: Arc<dyn FaultInjector>,
        config: FailoverConfig,
    ) -> Self {
        let grace = Duration::from_millis(config.grace_ms);
        Self {
            topology,
            verifier: LeaderVerifier::new(prober.clone()),
            consistency: ConsistencyVerifier::new(prober, grace),
            injector,
            config,
        }
    }

    fn tier(&self, target: TrialTarget) -> &[NodeDescriptor] {
        self.topology.tier(match target {
            TrialTarget::Consensus => TierKind::Consensus,
            TrialTarget::Serving => TierKind::Serving,
        })
    }

    /// Run one trial against the leader/primary of `target`.
    pub async fn run_trial(&self, target: TrialTarget) -> FailoverRecord {
        let mut record = FailoverRecord::new(target);
        tracing::info!(trial_id = %record.trial_id, kind = %target, "Failover trial starting");

        self.execute(&mut record).await;
        record.finished_at = Utc::now();

        metrics::record_failover(
            target.as_str(),
            record.passed(),
            record.elapsed_ms.map(Duration::from_millis),
        );
        if record.passed() {
            tracing::info!(
                trial_id = %record.trial_id,
                removed = ?record.target,
                new_leader = ?record.new_leader,
                elapsed_ms = ?record.elapsed_ms,
                "Failover trial passed"
            );
        } else {
            tracing::error!(
                trial_id = %record.trial_id,
                removed = ?record.target,
                phase = ?record.phase,
                failures = ?record.failures,
                "Failover trial failed"
            );
        }
        record
    }

    /// Run `trials` trials back to back.
    pub async fn run_trials(&self, trials: u32, target: TrialTarget) -> TrialSummary {
        let mut records = Vec::with_capacity(trials as usize);
        for n in 1..=trials {
            tracing::info!(trial = n, of = trials, kind = %target, "Running failover trial");
            records.push(self.run_trial(target).await);
        }

        let summary = TrialSummary::from_records(target, records);
        tracing::info!(
            kind = %target,
            passed = summary.passed,
            failed = summary.failed,
            max_elapsed_ms = ?summary.max_elapsed_ms,
            "Failover trials complete"
        );
        summary
    }

    async fn execute(&self, record: &mut FailoverRecord) {
        let target = record.kind;
        let nodes = self.tier(target);

        let removed = match self.authority(target, nodes, None).await {
            Ok(Some(node)) => node,
            Ok(None) => {
                record.failures.push(FailureKind::NoLeader);
                return;
            }
            Err(split) => {
                record.failures.push(FailureKind::SplitBrain { nodes: split.nodes });
                return;
            }
        };
        record.target = Some(removed.name.clone());

        if let Err(e) = self.injector.stop(&removed).await {
            record.failures.push(FailureKind::InjectionFailed { reason: e.to_string() });
            return;
        }
        let started = Instant::now();
        record.started_at = Some(Utc::now());
        advance(record, TrialPhase::FaultInjected);

        advance(record, TrialPhase::AwaitingPromotion);
        let deadline = started + Duration::from_secs(self.config.wait_timeout_secs);
        match time::timeout_at(deadline, self.await_takeover(target, nodes, &removed.name)).await {
            Ok(Takeover::Promoted(leader)) => {
                record.detected_at = Some(Utc::now());
                record.elapsed_ms = Some(started.elapsed().as_millis() as u64);
                record.new_leader = Some(leader.name.clone());
                advance(record, TrialPhase::Promoted);
                self.check_consistency(record, nodes, &removed, &leader).await;
            }
            Ok(Takeover::SplitBrain(split)) => {
                record.failures.push(FailureKind::SplitBrain { nodes: split.nodes });
            }
            Err(_) => {
                let cause = self.timeout_cause().await;
                record.failures.push(FailureKind::FailoverTimeout { cause });
                advance(record, TrialPhase::TimedOut);
            }
        }

        let outcome = self.restore(target, &removed).await;
        if let Some(error) = &outcome.error {
            record.failures.push(FailureKind::RejoinFailed { reason: error.clone() });
        } else if outcome.authoritative {
            record.failures.push(FailureKind::ResumedAsLeader);
        } else {
            advance(record, TrialPhase::Restored);
        }
        record.restore = Some(outcome);
    }

    /// The single node holding the writer role, ignoring `exclude`.
    async fn authority(
        &self,
        target: TrialTarget,
        nodes: &[NodeDescriptor],
        exclude: Option<&str>,
    ) -> Result<Option<NodeDescriptor>, SplitBrainDetected> {
        let candidates: Vec<NodeDescriptor> = nodes
            .iter()
            .filter(|n| Some(n.name.as_str()) != exclude)
            .cloned()
            .collect();

        match target {
            TrialTarget::Consensus => self.verifier.find_leader(&candidates).await,
            TrialTarget::Serving => self.find_primary(&candidates).await,
        }
    }

    async fn find_primary(&self, nodes: &[NodeDescriptor]) -> Result<Option<NodeDescriptor>, SplitBrainDetected> {
        let prober = self.verifier.prober();
        let statuses = join_all(nodes.iter().map(|n| prober.serving_status(n))).await;
        let primaries: Vec<&NodeDescriptor> = nodes
            .iter()
            .zip(statuses)
            .filter(|(_, status)| matches!(status, Ok(s) if s.is_primary()))
            .map(|(node, _)| node)
            .collect();

        match primaries.as_slice() {
            [] => Ok(None),
            [primary] => Ok(Some((*primary).clone())),
            many => {
                let nodes: Vec<String> = many.iter().map(|n| n.name.clone()).collect();
                tracing::error!(nodes = ?nodes, "Multiple serving primaries");
                metrics::record_split_brain(TierKind::Serving);
                Err(SplitBrainDetected { nodes })
            }
        }
    }

    /// Poll until a node other than `removed` holds the writer role.
    async fn await_takeover(&self, target: TrialTarget, nodes: &[NodeDescriptor], removed: &str) -> Takeover {
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        loop {
            match self.authority(target, nodes, Some(removed)).await {
                Ok(Some(leader)) => return Takeover::Promoted(leader),
                Ok(None) => tracing::debug!(removed = %removed, "No takeover yet"),
                Err(split) => return Takeover::SplitBrain(split),
            }
            time::sleep(poll).await;
        }
    }

    /// Distinguish a lost majority from a stalled election.
    async fn timeout_cause(&self) -> TimeoutCause {
        let members = self.topology.tier(TierKind::Consensus);
        if members.is_empty() {
            return TimeoutCause::NoPromotion;
        }

        let prober = self.verifier.prober();
        let live = join_all(members.iter().map(|n| prober.liveness(n)))
            .await
            .into_iter()
            .filter(Result::is_ok)
            .count();

        if live < quorum_size(members.len()) {
            tracing::warn!(live = live, members = members.len(), "Consensus tier below quorum");
            TimeoutCause::NoQuorum
        } else {
            TimeoutCause::NoPromotion
        }
    }

    async fn check_consistency(
        &self,
        record: &mut FailoverRecord,
        nodes: &[NodeDescriptor],
        removed: &NodeDescriptor,
        leader: &NodeDescriptor,
    ) {
        let survivors: Vec<NodeDescriptor> = nodes.iter().filter(|n| n.name != removed.name).cloned().collect();
        let key = format!("probe-{}", Uuid::new_v4().simple());
        let value = record.trial_id.to_string();

        match self.consistency.write_then_verify(leader, &survivors, &key, &value).await {
            Ok(report) => {
                if !report.is_consistent() {
                    record.failures.push(FailureKind::ConsistencyViolation {
                        nodes: report.missing_nodes(),
                    });
                }
                record.consistency = Some(report);
                advance(record, TrialPhase::ConsistencyChecked);
            }
            Err(e) => {
                tracing::error!(node = %leader.name, error = %e, "Write through new leader rejected");
                record.failures.push(FailureKind::WriteRejected { reason: e.to_string() });
            }
        }
    }

    /// Start `node` again and wait for it to answer in a follower role.
    async fn restore(&self, target: TrialTarget, node: &NodeDescriptor) -> RestoreOutcome {
        let started = Instant::now();
        let mut outcome = RestoreOutcome {
            node: node.name.clone(),
            rejoined: false,
            authoritative: false,
            elapsed_ms: 0,
            error: None,
        };

        if let Err(e) = self.injector.start(node).await {
            outcome.error = Some(e.to_string());
            return outcome;
        }

        let limit = Duration::from_secs(self.config.rejoin_timeout_secs);
        let deadline = started + limit;
        let base_ms = self.config.poll_interval_ms.max(1);
        let mut attempt = 1;

        loop {
            match self.role(target, node).await {
                Ok(authoritative) => {
                    outcome.rejoined = true;
                    outcome.authoritative = authoritative;
                    break;
                }
                Err(e) if Instant::now() >= deadline => {
                    outcome.error = Some(format!("not back within {:?}: {}", limit, e));
                    break;
                }
                Err(_) => {
                    let delay = calculate_backoff(attempt, base_ms, base_ms * 8);
                    time::sleep(delay.min(deadline.saturating_duration_since(Instant::now()))).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }

        outcome.elapsed_ms = started.elapsed().as_millis() as u64;
        if outcome.authoritative {
            tracing::error!(node = %node.name, "Restored node resumed the writer role");
        } else if outcome.rejoined {
            tracing::info!(node = %node.name, elapsed_ms = outcome.elapsed_ms, "Node rejoined as follower");
        }
        outcome
    }

    /// Whether `node` currently reports the writer role.
    async fn role(&self, target: TrialTarget, node: &NodeDescriptor) -> Result<bool, ProbeError> {
        let prober = self.verifier.prober();
        match target {
            TrialTarget::Consensus => prober.consensus_self(node).await.map(|s| s.is_leader),
            TrialTarget::Serving => prober.serving_status(node).await.map(|s| s.is_primary()),
        }
    }

    /// Stop the named consensus members together and observe whether the
    /// survivors still accept a write.
    ///
    /// The decision is recorded as observed. Only a rejection while a majority
    /// remained reachable fails the trial.
    pub async fn run_quorum_loss_trial(&self, names: &[String]) -> QuorumTrialRecord {
        let members = self.topology.tier(TierKind::Consensus);
        let mut record = QuorumTrialRecord {
            trial_id: Uuid::new_v4(),
            stopped: Vec::new(),
            majority_removed: false,
            decision: None,
            restored: Vec::new(),
            failures: Vec::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        tracing::info!(trial_id = %record.trial_id, nodes = ?names, "Quorum loss trial starting");

        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            match members.iter().find(|n| &n.name == name) {
                Some(node) => targets.push(node.clone()),
                None => record.failures.push(FailureKind::InjectionFailed {
                    reason: format!("'{}' is not a consensus member", name),
                }),
            }
        }

        let mut stopped = Vec::new();
        if record.failures.is_empty() {
            let results = join_all(targets.iter().map(|n| self.injector.stop(n))).await;
            for (node, result) in targets.into_iter().zip(results) {
                match result {
                    Ok(()) => stopped.push(node),
                    Err(e) => record.failures.push(FailureKind::InjectionFailed { reason: e.to_string() }),
                }
            }
        }
        record.stopped = stopped.iter().map(|n| n.name.clone()).collect();

        if record.failures.is_empty() {
            let survivors: Vec<NodeDescriptor> = members
                .iter()
                .filter(|m| !stopped.iter().any(|s| s.name == m.name))
                .cloned()
                .collect();
            record.majority_removed = survivors.len() < quorum_size(members.len());

            time::sleep(self.consistency.grace()).await;
            let key = format!("probe-{}", Uuid::new_v4().simple());
            // stopped members stay in the set so the decision counts the whole tier
            let decision = self
                .verifier
                .quorum_write_probe(members, &key, &record.trial_id.to_string())
                .await;

            if decision.contradicts_majority() {
                tracing::warn!(
                    accepted = decision.accepted,
                    reachable = decision.reachable,
                    total = decision.total,
                    "Write decision contradicts the reachable majority, check the store's quorum size"
                );
            }
            match (decision.accepted, record.majority_removed) {
                (false, false) => record.failures.push(FailureKind::QuorumLost { intentional: false }),
                (false, true) => tracing::info!(survivors = survivors.len(), "Write rejected with majority removed"),
                (true, true) | (true, false) => {}
            }
            record.decision = Some(decision);
        }

        for node in &stopped {
            let outcome = self.restore(TrialTarget::Consensus, node).await;
            if let Some(error) = &outcome.error {
                record.failures.push(FailureKind::RejoinFailed { reason: error.clone() });
            }
            record.restored.push(outcome);
        }

        record.finished_at = Utc::now();
        metrics::record_failover("quorum_loss", record.passed(), None);
        if !record.passed() {
            tracing::error!(trial_id = %record.trial_id, failures = ?record.failures, "Quorum loss trial failed");
        }
        record
    }
}

fn advance(record: &mut FailoverRecord, phase: TrialPhase) {
    tracing::debug!(trial_id = %record.trial_id, from = ?record.phase, to = ?phase, "Trial phase");
    record.phase = phase;
}
