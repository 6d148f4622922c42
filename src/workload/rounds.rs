//! Built-in game manager.
//!
//! Plays a fixed number of rounds: each round announces itself to every peer,
//! drains whatever peers announced in the meantime, then waits for the next
//! round. `fail_at_round` makes a round fail on purpose for fault drills, and
//! `panic_at_round` makes it panic instead.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::net::{Envelope, Message};
use crate::observability::metrics;
use crate::workload::controller::{WorkloadController, WorkloadError};
use crate::workload::factory::{BuildError, WorkloadArgs, WorkloadContext};

const DEFAULT_ROUND_INTERVAL_MS: u64 = 1000;
const DEFAULT_TOPIC: &str = "round";

/// Round-based game manager.
#[derive(Debug)]
pub struct RoundsGame {
    ctx: WorkloadContext,
    max_rounds: u64,
    round_interval: Duration,
    topic: String,
    fail_at_round: Option<u64>,
    panic_at_round: Option<u64>,
    rounds_played: u64,
    peer_announcements: u64,
}

impl RoundsGame {
    /// Registry name.
    pub const TARGET: &'static str = "swarm.rounds";

    /// Build from `[game_manager]` arguments. `max_rounds` is required.
    pub fn from_args(args: &WorkloadArgs<'_>, ctx: WorkloadContext) -> Result<Self, BuildError> {
        let max_rounds = args.required_u64("max_rounds")?;
        let interval_ms = args
            .optional_u64("round_interval_ms")?
            .unwrap_or(DEFAULT_ROUND_INTERVAL_MS);
        let topic = args.optional_str("topic")?.unwrap_or(DEFAULT_TOPIC).to_string();
        let fail_at_round = args.optional_u64("fail_at_round")?;
        let panic_at_round = args.optional_u64("panic_at_round")?;

        Ok(Self {
            ctx,
            max_rounds,
            round_interval: Duration::from_millis(interval_ms),
            topic,
            fail_at_round,
            panic_at_round,
            rounds_played: 0,
            peer_announcements: 0,
        })
    }

    pub fn rounds_played(&self) -> u64 {
        self.rounds_played
    }

    pub fn peer_announcements(&self) -> u64 {
        self.peer_announcements
    }

    async fn play_round(&mut self, round: u64) -> Result<(), WorkloadError> {
        if self.fail_at_round == Some(round) {
            return Err(WorkloadError::RoundFailed {
                round,
                reason: "injected failure".to_string(),
            });
        }
        if self.panic_at_round == Some(round) {
            panic!("injected panic at round {round}");
        }

        let node_id = self.ctx.backend.node_id();
        let announcement = Message::payload(
            node_id,
            self.topic.clone(),
            json!({ "round": round, "role": self.ctx.rendezvous.role }),
        );
        let delivered = self.ctx.backend.broadcast(announcement).await?;

        while let Some(envelope) = self.ctx.backend.try_recv() {
            self.observe(envelope);
        }

        self.rounds_played = round;
        metrics::record_round();
        tracing::info!(
            round = round,
            max_rounds = self.max_rounds,
            delivered = delivered,
            peers = self.ctx.backend.peers().len(),
            "Round complete"
        );
        Ok(())
    }

    fn observe(&mut self, envelope: Envelope) {
        if let Message::Payload { from, topic, body } = envelope.message {
            if topic == self.topic && from != self.ctx.backend.node_id() {
                self.peer_announcements += 1;
                tracing::debug!(peer = %envelope.peer, from = %from, body = %body, "Peer announcement");
            }
        }
    }
}

#[async_trait]
impl WorkloadController for RoundsGame {
    fn name(&self) -> &str {
        "rounds"
    }

    async fn run(&mut self) -> Result<(), WorkloadError> {
        tracing::info!(
            max_rounds = self.max_rounds,
            interval_ms = self.round_interval.as_millis() as u64,
            role = %self.ctx.rendezvous.role,
            "Game starting"
        );

        for round in 1..=self.max_rounds {
            self.play_round(round).await?;
            if round < self.max_rounds {
                tokio::time::sleep(self.round_interval).await;
            }
        }

        tracing::info!(
            rounds = self.rounds_played,
            peer_announcements = self.peer_announcements,
            "Game finished"
        );
        Ok(())
    }
}
