//! Team types.

use serde::{Deserialize, Serialize};

/// Newtype for team IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub i32);

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How conversations routed to a team get distributed to its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentType {
    /// Members take turns; the engine assigns automatically.
    RoundRobin,
    /// Anything else. Such teams are assigned by hand.
    Manual(String),
}

impl AssignmentType {
    pub fn is_round_robin(&self) -> bool {
        matches!(self, Self::RoundRobin)
    }
}

impl std::fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "Round robin"),
            Self::Manual(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for AssignmentType {
    /// Parses the stored policy label. Only the exact `"Round robin"` label
    /// enables rotation; anything else, including other casings, is manual.
    fn from(s: &str) -> Self {
        if s == "Round robin" {
            Self::RoundRobin
        } else {
            Self::Manual(s.to_string())
        }
    }
}

/// A support team as seen by the assignment engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub assignment_type: AssignmentType,
    /// Maximum active conversations a member may hold and still receive
    /// automatic assignments.
    pub max_auto_assigned_conversations: u32,
}

impl Team {
    /// A round-robin team.
    pub fn round_robin(id: i32, name: impl Into<String>, cap: u32) -> Self {
        Self {
            id: TeamId(id),
            name: name.into(),
            assignment_type: AssignmentType::RoundRobin,
            max_auto_assigned_conversations: cap,
        }
    }

    /// A team whose conversations are assigned manually.
    pub fn manual(id: i32, name: impl Into<String>) -> Self {
        Self {
            id: TeamId(id),
            name: name.into(),
            assignment_type: AssignmentType::Manual("Manual".to_string()),
            max_auto_assigned_conversations: 0,
        }
    }
}
