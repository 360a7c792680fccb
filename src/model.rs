//! Core data model.
//!
//! Teams own a conversation queue and an assignment policy. Conversations
//! reference a team and, once assigned, a user. The engine only reads these
//! records and writes a single field (the assigned user).

pub mod conversation;
pub mod team;
pub mod user;

pub use conversation::{Conversation, ConversationId};
pub use team::{AssignmentType, Team, TeamId};
pub use user::{User, UserId};
