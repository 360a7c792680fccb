//! Assignment cycle: one pass over every unassigned conversation.

use std::time::Instant;

use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{debug, error, info, trace};

use super::registry::Registry;
use crate::error::{Error, Result};
use crate::model::{Conversation, User};
use crate::store::ConversationStore;
use crate::telemetry::metrics;

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Conversations returned by the store.
    pub fetched: usize,
    pub assigned: usize,
    /// Team has no registry entry (not round-robin, or unknown).
    pub skipped_no_pool: usize,
    /// Round-robin team without members.
    pub skipped_empty_pool: usize,
    /// Drawn member was at or over the team cap.
    pub skipped_capacity: usize,
    /// A store call failed for this conversation.
    pub failed: usize,
}

/// How a single conversation was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Assigned,
    NoPool,
    EmptyPool,
    AtCapacity,
}

/// One pass of the engine against a fixed registry snapshot.
pub struct AssignmentCycle<'a> {
    registry: &'a Registry,
    conversations: &'a dyn ConversationStore,
    actor: &'a User,
}

impl<'a> AssignmentCycle<'a> {
    pub fn new(
        registry: &'a Registry,
        conversations: &'a dyn ConversationStore,
        actor: &'a User,
    ) -> Self {
        Self {
            registry,
            conversations,
            actor,
        }
    }

    /// Fetch unassigned conversations and try each exactly once.
    ///
    /// Only the initial fetch can fail the cycle. Per-conversation failures
    /// are logged and counted, and the pass continues.
    pub async fn run(&self) -> Result<CycleReport> {
        let start = Instant::now();
        let pending = self.conversations.unassigned_conversations().await?;

        let mut report = CycleReport {
            fetched: pending.len(),
            ..CycleReport::default()
        };
        if !pending.is_empty() {
            debug!(count = pending.len(), "found unassigned conversations");
        }

        for conversation in &pending {
            let (reason, counter) = match self.assign(conversation).await {
                Ok(Outcome::Assigned) => {
                    report.assigned += 1;
                    continue;
                }
                Ok(Outcome::NoPool) => ("no_pool", &mut report.skipped_no_pool),
                Ok(Outcome::EmptyPool) => ("empty_pool", &mut report.skipped_empty_pool),
                Ok(Outcome::AtCapacity) => ("capacity", &mut report.skipped_capacity),
                Err(e) => {
                    error!(
                        conversation_id = %conversation.id,
                        team_id = ?conversation.assigned_team_id,
                        error = %e,
                        "error auto-assigning conversation"
                    );
                    ("store_error", &mut report.failed)
                }
            };
            *counter += 1;
            metrics::conversations_skipped().add(1, &[KeyValue::new("reason", reason)]);
        }

        metrics::cycle_duration_ms().record(start.elapsed().as_secs_f64() * 1000.0, &[]);
        if report.assigned > 0 {
            info!(
                assigned = report.assigned,
                fetched = report.fetched,
                "auto-assigned conversations"
            );
        }
        Ok(report)
    }

    async fn assign(&self, conversation: &Conversation) -> Result<Outcome> {
        let Some(team_id) = conversation.assigned_team_id else {
            trace!(conversation_id = %conversation.id, "conversation has no team, skipping");
            return Ok(Outcome::NoPool);
        };

        // The draw consumes the member's turn even if the cap rejects them.
        let (user_id, cap) = match self.registry.next_candidate(team_id) {
            Ok(candidate) => candidate,
            Err(Error::TeamNotFound(_)) => {
                trace!(
                    conversation_id = %conversation.id,
                    %team_id,
                    "team not in round-robin registry, skipping"
                );
                return Ok(Outcome::NoPool);
            }
            Err(Error::EmptyPool(_)) => {
                debug!(
                    conversation_id = %conversation.id,
                    %team_id,
                    "round-robin team has no members, skipping"
                );
                return Ok(Outcome::EmptyPool);
            }
            Err(e) => return Err(e),
        };

        let active = self
            .conversations
            .active_user_conversations_count(user_id)
            .await?;
        if active >= cap {
            debug!(
                conversation_id = %conversation.id,
                %team_id,
                %user_id,
                active,
                max_auto_assigned_conversations = cap,
                "user at auto-assignment limit, skipping"
            );
            return Ok(Outcome::AtCapacity);
        }

        self.conversations
            .update_user_assignee(conversation.id, user_id, self.actor)
            .await?;
        debug!(conversation_id = %conversation.id, %team_id, %user_id, "conversation assigned");
        metrics::conversations_assigned().add(1, &[KeyValue::new("team_id", team_id.0 as i64)]);
        Ok(Outcome::Assigned)
    }
}
