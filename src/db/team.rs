//! Team and membership queries.

use async_trait::async_trait;

use super::Db;
use crate::error::Result;
use crate::model::{AssignmentType, Team, TeamId, UserId};
use crate::store::TeamStore;

#[async_trait]
impl TeamStore for Db {
    async fn all_teams(&self) -> Result<Vec<Team>> {
        let rows: Vec<TeamRow> = sqlx::query_as(
            "SELECT id, name, conversation_assignment_type, max_auto_assigned_conversations
             FROM teams ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Team::from).collect())
    }

    /// Enabled, non-deleted members in the order they joined the team.
    async fn team_members(&self, team_id: TeamId) -> Result<Vec<UserId>> {
        let rows: Vec<(i32,)> = sqlx::query_as(
            "SELECT u.id
             FROM team_members tm
             JOIN users u ON u.id = tm.user_id
             WHERE tm.team_id = $1 AND u.enabled AND u.deleted_at IS NULL
             ORDER BY tm.created_at, tm.id",
        )
        .bind(team_id.0)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(|(id,)| UserId(id)).collect())
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct TeamRow {
    id: i32,
    name: String,
    conversation_assignment_type: String,
    max_auto_assigned_conversations: i32,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Self {
            id: TeamId(row.id),
            name: row.name,
            assignment_type: AssignmentType::from(row.conversation_assignment_type.as_str()),
            // Negative caps are treated as zero: never auto-assign.
            max_auto_assigned_conversations: u32::try_from(row.max_auto_assigned_conversations)
                .unwrap_or(0),
        }
    }
}
