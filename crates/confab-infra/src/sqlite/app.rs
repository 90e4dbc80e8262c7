//! SQLite application profile repository.

use chrono::Utc;
use sqlx::Row;

use confab_core::repository::app::AppProfileRepository;
use confab_types::app::AppProfile;
use confab_types::error::RepositoryError;

use super::pool::DatabasePool;

pub struct SqliteAppProfileRepository {
    pool: DatabasePool,
}

impl SqliteAppProfileRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct AppRow {
    id: String,
    name: String,
    model_id: Option<String>,
    prompt: Option<String>,
    knowledge_ids: String,
    description: Option<String>,
}

impl AppRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            model_id: row.try_get("model_id")?,
            prompt: row.try_get("prompt")?,
            knowledge_ids: row.try_get("knowledge_ids")?,
            description: row.try_get("description")?,
        })
    }

    fn into_profile(self) -> Result<AppProfile, RepositoryError> {
        let knowledge_ids: Vec<String> = serde_json::from_str(&self.knowledge_ids)
            .map_err(|e| RepositoryError::Query(format!("invalid knowledge_ids: {e}")))?;
        Ok(AppProfile {
            id: self.id,
            name: self.name,
            model_id: self.model_id,
            prompt: self.prompt,
            knowledge_ids,
            description: self.description,
        })
    }
}

fn encode_knowledge_ids(app: &AppProfile) -> Result<String, RepositoryError> {
    serde_json::to_string(&app.knowledge_ids).map_err(|e| RepositoryError::Query(e.to_string()))
}

impl AppProfileRepository for SqliteAppProfileRepository {
    async fn list(&self) -> Result<Vec<AppProfile>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM app_profiles ORDER BY name, id")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut apps = Vec::with_capacity(rows.len());
        for row in &rows {
            let app_row = AppRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            apps.push(app_row.into_profile()?);
        }
        Ok(apps)
    }

    async fn get(&self, id: &str) -> Result<Option<AppProfile>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM app_profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let app_row =
                    AppRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(app_row.into_profile()?))
            }
            None => Ok(None),
        }
    }

    async fn create(&self, app: &AppProfile) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO app_profiles (id, name, model_id, prompt, knowledge_ids, description, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&app.id)
        .bind(&app.name)
        .bind(&app.model_id)
        .bind(&app.prompt)
        .bind(encode_knowledge_ids(app)?)
        .bind(&app.description)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("app '{}' already exists", app.id))
            }
            _ => RepositoryError::Query(e.to_string()),
        })?;
        Ok(())
    }

    async fn update(&self, app: &AppProfile) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE app_profiles
               SET name = ?, model_id = ?, prompt = ?, knowledge_ids = ?, description = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&app.name)
        .bind(&app.model_id)
        .bind(&app.prompt)
        .bind(encode_knowledge_ids(app)?)
        .bind(&app.description)
        .bind(Utc::now().to_rfc3339())
        .bind(&app.id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM app_profiles WHERE id = ?")
            .bind(id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
