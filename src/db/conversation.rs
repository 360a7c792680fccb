//! Conversation queries: unassigned candidates, assignment, active counts.

use async_trait::async_trait;
use uuid::Uuid;

use super::Db;
use crate::error::{Error, Result};
use crate::model::{Conversation, ConversationId, TeamId, User, UserId};
use crate::store::ConversationStore;

/// Statuses that no longer need an assignee.
const TERMINAL_STATUSES: &[&str] = &["Resolved", "Closed"];

#[async_trait]
impl ConversationStore for Db {
    async fn unassigned_conversations(&self) -> Result<Vec<Conversation>> {
        let rows: Vec<ConversationRow> = sqlx::query_as(
            "SELECT c.uuid, c.assigned_team_id, c.assigned_user_id
             FROM conversations c
             LEFT JOIN conversation_statuses s ON s.id = c.status_id
             WHERE c.assigned_team_id IS NOT NULL
             AND c.assigned_user_id IS NULL
             AND (s.name IS NULL OR NOT (s.name = ANY($1)))
             ORDER BY c.created_at",
        )
        .bind(TERMINAL_STATUSES)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    /// Sets the assignee only while the conversation is still unassigned,
    /// and records an activity message from `actor`, in one transaction.
    async fn update_user_assignee(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        actor: &User,
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        let updated: Option<(i32,)> = sqlx::query_as(
            "UPDATE conversations SET assigned_user_id = $1, updated_at = now()
             WHERE uuid = $2 AND assigned_user_id IS NULL
             RETURNING id",
        )
        .bind(user_id.0)
        .bind(conversation_id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id,)) = updated else {
            return Err(Error::NotFound(format!(
                "unassigned conversation {conversation_id}"
            )));
        };

        sqlx::query(
            "INSERT INTO conversation_messages (conversation_id, type, private, sender_id, sender_type, content, meta)
             VALUES ($1, 'activity', true, $2, 'user', $3, $4)",
        )
        .bind(id)
        .bind(actor.id.0)
        .bind(format!("Assigned to user {user_id} by {}", actor.email))
        .bind(serde_json::json!({
            "event": "assigned_user",
            "assignee_id": user_id.0,
            "automatic": true,
        }))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn active_user_conversations_count(&self, user_id: UserId) -> Result<u32> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*)
             FROM conversations c
             JOIN conversation_statuses s ON s.id = c.status_id
             WHERE c.assigned_user_id = $1 AND s.name = 'Open'",
        )
        .bind(user_id.0)
        .fetch_one(self.pool())
        .await?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct ConversationRow {
    uuid: Uuid,
    assigned_team_id: Option<i32>,
    assigned_user_id: Option<i32>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: ConversationId(row.uuid),
            assigned_team_id: row.assigned_team_id.map(TeamId),
            assigned_user_id: row.assigned_user_id.map(UserId),
        }
    }
}
