//! In-process store implementing both store traits.
//!
//! Used by tests and for dry runs without a database. Every conversation
//! assigned to a user counts as active until it is closed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{ConversationStore, TeamStore};
use crate::error::{Error, Result};
use crate::model::{Conversation, ConversationId, Team, TeamId, User, UserId};

/// A recorded assignment write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub actor_id: UserId,
}

#[derive(Debug, Default)]
struct Inner {
    teams: Vec<Team>,
    members: HashMap<TeamId, Vec<UserId>>,
    /// Conversations in insertion order with their open flag.
    conversations: Vec<(Conversation, bool)>,
    assignments: Vec<AssignmentRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a team together with its ordered member list.
    pub fn put_team(&self, team: Team, members: Vec<UserId>) {
        let mut inner = self.lock();
        inner.members.insert(team.id, members);
        match inner.teams.iter_mut().find(|t| t.id == team.id) {
            Some(existing) => *existing = team,
            None => inner.teams.push(team),
        }
    }

    pub fn remove_team(&self, team_id: TeamId) {
        let mut inner = self.lock();
        inner.teams.retain(|t| t.id != team_id);
        inner.members.remove(&team_id);
    }

    /// Add an open conversation.
    pub fn add_conversation(&self, conversation: Conversation) -> ConversationId {
        let id = conversation.id;
        self.lock().conversations.push((conversation, true));
        id
    }

    /// Mark a conversation as no longer active.
    pub fn close_conversation(&self, id: ConversationId) -> Result<()> {
        let mut inner = self.lock();
        let entry = inner
            .conversations
            .iter_mut()
            .find(|(c, _)| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("conversation {id}")))?;
        entry.1 = false;
        Ok(())
    }

    pub fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.lock()
            .conversations
            .iter()
            .find(|(c, _)| c.id == id)
            .map(|(c, _)| c.clone())
    }

    /// Every assignment written so far, oldest first.
    pub fn assignments(&self) -> Vec<AssignmentRecord> {
        self.lock().assignments.clone()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn unassigned_conversations(&self) -> Result<Vec<Conversation>> {
        Ok(self
            .lock()
            .conversations
            .iter()
            .filter(|(c, open)| *open && c.awaiting_assignment())
            .map(|(c, _)| c.clone())
            .collect())
    }

    async fn update_user_assignee(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        actor: &User,
    ) -> Result<()> {
        let mut inner = self.lock();
        let (conversation, _) = inner
            .conversations
            .iter_mut()
            .find(|(c, _)| c.id == conversation_id)
            .ok_or_else(|| Error::NotFound(format!("conversation {conversation_id}")))?;
        // Same guard as the Postgres store: never replace an existing assignee.
        if conversation.assigned_user_id.is_some() {
            return Err(Error::NotFound(format!(
                "unassigned conversation {conversation_id}"
            )));
        }
        conversation.assigned_user_id = Some(user_id);
        inner.assignments.push(AssignmentRecord {
            conversation_id,
            user_id,
            actor_id: actor.id,
        });
        Ok(())
    }

    async fn active_user_conversations_count(&self, user_id: UserId) -> Result<u32> {
        let count = self
            .lock()
            .conversations
            .iter()
            .filter(|(c, open)| *open && c.assigned_user_id == Some(user_id))
            .count();
        Ok(count as u32)
    }
}

#[async_trait]
impl TeamStore for MemoryStore {
    async fn all_teams(&self) -> Result<Vec<Team>> {
        Ok(self.lock().teams.clone())
    }

    async fn team_members(&self, team_id: TeamId) -> Result<Vec<UserId>> {
        self.lock()
            .members
            .get(&team_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("team {team_id}")))
    }
}
