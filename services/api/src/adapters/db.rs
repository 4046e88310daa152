//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cim_analyzer_core::domain::{AnalysisResult, NewAnalysisResult, User, UserCredentials};
use cim_analyzer_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: String,
    email: Option<String>,
    full_name: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: String,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct AnalysisResultRecord {
    id: i64,
    user_id: String,
    filename: String,
    preview_text: String,
    summary_json: String,
    created_at: DateTime<Utc>,
    user_rating: Option<f64>,
    confidence_score: Option<f64>,
}
impl AnalysisResultRecord {
    fn to_domain(self) -> AnalysisResult {
        AnalysisResult {
            id: self.id,
            user_id: self.user_id,
            filename: self.filename,
            preview_text: self.preview_text,
            summary_json: self.summary_json,
            created_at: self.created_at,
            user_rating: self.user_rating,
            confidence_score: self.confidence_score,
        }
    }
}

const RESULT_COLUMNS: &str = "id, user_id, filename, preview_text, summary_json, created_at, user_rating, confidence_score";

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn result_not_found(result_id: i64) -> PortError {
    PortError::NotFound(format!("Result {} not found", result_id))
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn get_or_create_user(&self, user_id: &str) -> PortResult<User> {
        sqlx::query("INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, full_name FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn create_user_with_email(
        &self,
        user_id: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, email, hashed_password) VALUES ($1, $2, $3) RETURNING id, email, full_name",
        )
        .bind(user_id)
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                PortError::Conflict(format!("{} is already registered", email))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password FROM users WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(UserCredentials {
            user_id: record.id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn list_users(&self) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, full_name FROM users ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_result(&self, new_result: NewAnalysisResult) -> PortResult<AnalysisResult> {
        let sql = format!(
            "INSERT INTO analysis_results (user_id, filename, preview_text, summary_json) VALUES ($1, $2, $3, $4) RETURNING {}",
            RESULT_COLUMNS
        );
        let record = sqlx::query_as::<_, AnalysisResultRecord>(&sql)
            .bind(&new_result.user_id)
            .bind(&new_result.filename)
            .bind(&new_result.preview_text)
            .bind(&new_result.summary_json)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_results_for_user(&self, user_id: &str) -> PortResult<Vec<AnalysisResult>> {
        let sql = format!(
            "SELECT {} FROM analysis_results WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            RESULT_COLUMNS
        );
        let records = sqlx::query_as::<_, AnalysisResultRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_result_for_user(
        &self,
        result_id: i64,
        user_id: &str,
    ) -> PortResult<AnalysisResult> {
        let sql = format!(
            "SELECT {} FROM analysis_results WHERE id = $1 AND user_id = $2",
            RESULT_COLUMNS
        );
        let record = sqlx::query_as::<_, AnalysisResultRecord>(&sql)
            .bind(result_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| result_not_found(result_id))?;
        Ok(record.to_domain())
    }

    async fn update_rating(&self, result_id: i64, user_id: &str, rating: f64) -> PortResult<()> {
        let done = sqlx::query(
            "UPDATE analysis_results SET user_rating = $1 WHERE id = $2 AND user_id = $3",
        )
        .bind(rating)
        .bind(result_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if done.rows_affected() == 0 {
            return Err(result_not_found(result_id));
        }
        Ok(())
    }

    async fn update_confidence(
        &self,
        result_id: i64,
        user_id: &str,
        confidence: f64,
    ) -> PortResult<()> {
        let done = sqlx::query(
            "UPDATE analysis_results SET confidence_score = $1 WHERE id = $2 AND user_id = $3",
        )
        .bind(confidence)
        .bind(result_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if done.rows_affected() == 0 {
            return Err(result_not_found(result_id));
        }
        Ok(())
    }

    async fn delete_result(&self, result_id: i64, user_id: &str) -> PortResult<()> {
        let done = sqlx::query("DELETE FROM analysis_results WHERE id = $1 AND user_id = $2")
            .bind(result_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if done.rows_affected() == 0 {
            return Err(result_not_found(result_id));
        }
        Ok(())
    }

    async fn purge_all(&self) -> PortResult<(u64, u64)> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let results = sqlx::query("DELETE FROM analysis_results")
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?
            .rows_affected();
        let users = sqlx::query("DELETE FROM users")
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?
            .rows_affected();
        tx.commit().await.map_err(unexpected)?;
        Ok((results, users))
    }
}
