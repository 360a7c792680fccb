//! Store abstractions consumed by the assignment engine.
//!
//! The engine never talks to a database directly. It reads teams, members
//! and conversations and writes a single assignment through these two
//! traits. [`crate::db::Db`] implements both against Postgres and
//! [`memory::MemoryStore`] implements both in process.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Conversation, ConversationId, Team, TeamId, User, UserId};

pub use memory::MemoryStore;

/// Conversation reads and the single assignment write.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Conversations assigned to a team but not to a user.
    async fn unassigned_conversations(&self) -> Result<Vec<Conversation>>;

    /// Assign a conversation to a user, attributing the change to `actor`.
    async fn update_user_assignee(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        actor: &User,
    ) -> Result<()>;

    /// Number of open conversations currently assigned to the user.
    async fn active_user_conversations_count(&self, user_id: UserId) -> Result<u32>;
}

/// Team and membership reads.
#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn all_teams(&self) -> Result<Vec<Team>>;

    /// Member IDs of a team, in the store's membership order.
    async fn team_members(&self, team_id: TeamId) -> Result<Vec<UserId>>;
}
