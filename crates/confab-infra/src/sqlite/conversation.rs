//! SQLite turn log and conversation listing.
//!
//! One repository implements both `TurnRepository` and
//! `ConversationRepository`: they share a database and the orchestrator
//! needs both through a single handle.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use confab_core::repository::conversation::{ConversationRepository, TurnRepository};
use confab_types::chat::{Conversation, ConversationTurn, MessageRole};
use confab_types::error::RepositoryError;

use super::pool::DatabasePool;

pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct TurnRow {
    id: String,
    conversation_id: String,
    role: String,
    text: String,
    user_id: String,
    created_at: String,
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    model: Option<String>,
    response_ms: Option<i64>,
}

impl TurnRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            role: row.try_get("role")?,
            text: row.try_get("text")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            prompt_tokens: row.try_get("prompt_tokens")?,
            completion_tokens: row.try_get("completion_tokens")?,
            model: row.try_get("model")?,
            response_ms: row.try_get("response_ms")?,
        })
    }

    fn into_turn(self) -> Result<ConversationTurn, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid turn id: {e}")))?;
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ConversationTurn {
            id,
            conversation_id: self.conversation_id,
            role,
            text: self.text,
            created_at: parse_datetime(&self.created_at)?,
            user_id: self.user_id,
            prompt_tokens: self.prompt_tokens.map(|v| v as u32),
            completion_tokens: self.completion_tokens.map(|v| v as u32),
            model: self.model,
            response_ms: self.response_ms.map(|v| v as u64),
        })
    }
}

struct ConversationRow {
    id: String,
    user_id: String,
    title: Option<String>,
    prompt_tokens: i64,
    completion_tokens: i64,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            prompt_tokens: row.try_get("prompt_tokens")?,
            completion_tokens: row.try_get("completion_tokens")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        Ok(Conversation {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            prompt_tokens: self.prompt_tokens as u64,
            completion_tokens: self.completion_tokens as u64,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// TurnRepository
// ---------------------------------------------------------------------------

impl TurnRepository for SqliteConversationRepository {
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO conversation_turns (id, conversation_id, role, text, user_id, created_at, prompt_tokens, completion_tokens, model, response_ms)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(turn.id.to_string())
        .bind(&turn.conversation_id)
        .bind(turn.role.to_string())
        .bind(&turn.text)
        .bind(&turn.user_id)
        .bind(turn.created_at.to_rfc3339())
        .bind(turn.prompt_tokens.map(i64::from))
        .bind(turn.completion_tokens.map(i64::from))
        .bind(&turn.model)
        .bind(turn.response_ms.map(|v| v as i64))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn load_recent_turns(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM (
                   SELECT * FROM conversation_turns
                   WHERE conversation_id = ?
                   ORDER BY seq DESC
                   LIMIT ?
               ) ORDER BY seq ASC"#,
        )
        .bind(conversation_id)
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in &rows {
            turns.push(TurnRow::from_row(row).map_err(query_error)?.into_turn()?);
        }
        Ok(turns)
    }

    async fn delete_all_turns(&self, conversation_id: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM conversation_turns WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// ConversationRepository
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn ensure_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
        title: &str,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO conversations (id, user_id, title, prompt_tokens, completion_tokens, created_at, updated_at)
               VALUES (?, ?, ?, 0, 0, ?, ?)
               ON CONFLICT(id) DO NOTHING"#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(title)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => Ok(Some(
                ConversationRow::from_row(&row)
                    .map_err(query_error)?
                    .into_conversation()?,
            )),
            None => Ok(None),
        }
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE user_id = ? ORDER BY updated_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            conversations.push(
                ConversationRow::from_row(row)
                    .map_err(query_error)?
                    .into_conversation()?,
            );
        }
        Ok(conversations)
    }

    async fn rename_conversation(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE conversations SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(Utc::now().to_rfc3339())
            .bind(conversation_id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn add_usage(
        &self,
        conversation_id: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"UPDATE conversations
               SET prompt_tokens = prompt_tokens + ?,
                   completion_tokens = completion_tokens + ?,
                   updated_at = ?
               WHERE id = ?"#,
        )
        .bind(i64::from(prompt_tokens))
        .bind(i64::from(completion_tokens))
        .bind(Utc::now().to_rfc3339())
        .bind(conversation_id)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_pool;

    #[tokio::test]
    async fn test_recent_turns_are_oldest_first_and_capped() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);

        for text in ["one", "two", "three", "four"] {
            repo.append_turn(&ConversationTurn::user("c1", "u1", text))
                .await
                .unwrap();
        }
        repo.append_turn(&ConversationTurn::user("c2", "u1", "elsewhere"))
            .await
            .unwrap();

        let turns = repo.load_recent_turns("c1", 3).await.unwrap();
        let texts: Vec<_> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["two", "three", "four"]);
    }

    #[tokio::test]
    async fn test_assistant_turn_round_trips_usage() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);

        let mut turn = ConversationTurn::assistant("c1", "u1", "Hello");
        turn.prompt_tokens = Some(12);
        turn.completion_tokens = Some(3);
        turn.model = Some("gpt-4o-mini".to_string());
        turn.response_ms = Some(420);
        repo.append_turn(&turn).await.unwrap();

        let loaded = repo.load_recent_turns("c1", 10).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, turn.id);
        assert_eq!(loaded[0].role, MessageRole::Assistant);
        assert_eq!(loaded[0].completion_tokens, Some(3));
        assert_eq!(loaded[0].response_ms, Some(420));
    }

    #[tokio::test]
    async fn test_delete_all_turns_counts_and_is_idempotent() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);

        repo.append_turn(&ConversationTurn::user("c1", "u1", "a"))
            .await
            .unwrap();
        repo.append_turn(&ConversationTurn::user("c1", "u1", "b"))
            .await
            .unwrap();

        assert_eq!(repo.delete_all_turns("c1").await.unwrap(), 2);
        assert_eq!(repo.delete_all_turns("c1").await.unwrap(), 0);
        assert!(repo.load_recent_turns("c1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conversation_lifecycle() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);

        repo.ensure_conversation("c1", "u1", "First").await.unwrap();
        repo.ensure_conversation("c1", "u1", "Ignored").await.unwrap();
        repo.add_usage("c1", 10, 4).await.unwrap();
        repo.add_usage("c1", 5, 1).await.unwrap();

        let conversation = repo.get_conversation("c1").await.unwrap().unwrap();
        assert_eq!(conversation.title.as_deref(), Some("First"));
        assert_eq!(conversation.prompt_tokens, 15);
        assert_eq!(conversation.completion_tokens, 5);

        repo.rename_conversation("c1", "Renamed").await.unwrap();
        assert!(matches!(
            repo.rename_conversation("nope", "x").await,
            Err(RepositoryError::NotFound)
        ));

        repo.ensure_conversation("c2", "u2", "Other user").await.unwrap();
        let listed = repo.list_conversations("u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title.as_deref(), Some("Renamed"));

        repo.delete_conversation("c1").await.unwrap();
        assert!(repo.get_conversation("c1").await.unwrap().is_none());
    }
}
