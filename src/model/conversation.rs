//! Conversation types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{TeamId, UserId};

/// Newtype for conversation IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A support conversation. Only the assignment fields matter here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub assigned_team_id: Option<TeamId>,
    pub assigned_user_id: Option<UserId>,
}

impl Conversation {
    /// A conversation routed to a team but not yet to a user.
    pub fn for_team(team_id: TeamId) -> Self {
        Self {
            id: ConversationId::new(),
            assigned_team_id: Some(team_id),
            assigned_user_id: None,
        }
    }

    /// Whether the engine should try to assign this conversation.
    pub fn awaiting_assignment(&self) -> bool {
        self.assigned_team_id.is_some() && self.assigned_user_id.is_none()
    }
}
