//! SQLite model configuration repository.
//!
//! Secrets are stored as given; masking happens in the management service
//! before anything leaves the process.

use chrono::Utc;
use sqlx::Row;

use confab_core::repository::model_config::ModelConfigRepository;
use confab_types::error::RepositoryError;
use confab_types::provider::{ModelConfig, ModelType};

use super::pool::DatabasePool;

pub struct SqliteModelConfigRepository {
    pool: DatabasePool,
}

impl SqliteModelConfigRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn row_to_config(row: &sqlx::sqlite::SqliteRow) -> Result<ModelConfig, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let model_type: String = row.try_get("model_type").map_err(get)?;
    let model_type: ModelType = model_type
        .parse()
        .map_err(|e: String| RepositoryError::Query(e))?;
    let response_limit: Option<i64> = row.try_get("response_limit").map_err(get)?;
    let dimension: Option<i64> = row.try_get("dimension").map_err(get)?;

    Ok(ModelConfig {
        id: row.try_get("id").map_err(get)?,
        model_type,
        provider: row.try_get("provider").map_err(get)?,
        model: row.try_get("model").map_err(get)?,
        name: row.try_get("name").map_err(get)?,
        response_limit: response_limit.map(|v| v as u32),
        temperature: row.try_get("temperature").map_err(get)?,
        top_p: row.try_get("top_p").map_err(get)?,
        api_key: row.try_get("api_key").map_err(get)?,
        secret_key: row.try_get("secret_key").map_err(get)?,
        base_url: row.try_get("base_url").map_err(get)?,
        endpoint: row.try_get("endpoint").map_err(get)?,
        gemini_project: row.try_get("gemini_project").map_err(get)?,
        gemini_location: row.try_get("gemini_location").map_err(get)?,
        azure_deployment_name: row.try_get("azure_deployment_name").map_err(get)?,
        image_size: row.try_get("image_size").map_err(get)?,
        image_quality: row.try_get("image_quality").map_err(get)?,
        image_style: row.try_get("image_style").map_err(get)?,
        dimension: dimension.map(|v| v as u32),
    })
}

fn write_error(e: sqlx::Error, id: &str) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(format!("model config '{id}' already exists"))
        }
        _ => RepositoryError::Query(e.to_string()),
    }
}

impl ModelConfigRepository for SqliteModelConfigRepository {
    async fn list(&self, model_type: Option<ModelType>) -> Result<Vec<ModelConfig>, RepositoryError> {
        let rows = match model_type {
            Some(model_type) => {
                sqlx::query("SELECT * FROM model_configs WHERE model_type = ? ORDER BY id")
                    .bind(model_type.to_string())
                    .fetch_all(&self.pool.reader)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM model_configs ORDER BY id")
                    .fetch_all(&self.pool.reader)
                    .await
            }
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_config).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<ModelConfig>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM model_configs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(row_to_config).transpose()
    }

    async fn create(&self, config: &ModelConfig) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO model_configs (
                   id, model_type, provider, model, name, response_limit, temperature, top_p,
                   api_key, secret_key, base_url, endpoint, gemini_project, gemini_location,
                   azure_deployment_name, image_size, image_quality, image_style, dimension,
                   created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&config.id)
        .bind(config.model_type.to_string())
        .bind(&config.provider)
        .bind(&config.model)
        .bind(&config.name)
        .bind(config.response_limit.map(i64::from))
        .bind(config.temperature)
        .bind(config.top_p)
        .bind(&config.api_key)
        .bind(&config.secret_key)
        .bind(&config.base_url)
        .bind(&config.endpoint)
        .bind(&config.gemini_project)
        .bind(&config.gemini_location)
        .bind(&config.azure_deployment_name)
        .bind(&config.image_size)
        .bind(&config.image_quality)
        .bind(&config.image_style)
        .bind(config.dimension.map(i64::from))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| write_error(e, &config.id))?;
        Ok(())
    }

    async fn update(&self, config: &ModelConfig) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE model_configs
               SET model_type = ?, provider = ?, model = ?, name = ?, response_limit = ?,
                   temperature = ?, top_p = ?, api_key = ?, secret_key = ?, base_url = ?,
                   endpoint = ?, gemini_project = ?, gemini_location = ?,
                   azure_deployment_name = ?, image_size = ?, image_quality = ?,
                   image_style = ?, dimension = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(config.model_type.to_string())
        .bind(&config.provider)
        .bind(&config.model)
        .bind(&config.name)
        .bind(config.response_limit.map(i64::from))
        .bind(config.temperature)
        .bind(config.top_p)
        .bind(&config.api_key)
        .bind(&config.secret_key)
        .bind(&config.base_url)
        .bind(&config.endpoint)
        .bind(&config.gemini_project)
        .bind(&config.gemini_location)
        .bind(&config.azure_deployment_name)
        .bind(&config.image_size)
        .bind(&config.image_quality)
        .bind(&config.image_style)
        .bind(config.dimension.map(i64::from))
        .bind(Utc::now().to_rfc3339())
        .bind(&config.id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| write_error(e, &config.id))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM model_configs WHERE id = ?")
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
