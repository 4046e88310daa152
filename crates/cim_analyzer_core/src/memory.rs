//! crates/cim_analyzer_core/src/memory.rs
//!
//! An in-process `DatabaseService` with the same ownership and uniqueness
//! rules as the Postgres adapter. Only compiled for tests.

use crate::domain::{AnalysisResult, NewAnalysisResult, User, UserCredentials};
use crate::ports::{DatabaseService, PortError, PortResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Mutex;

#[derive(Default)]
struct Tables {
    users: Vec<(User, Option<String>)>,
    results: Vec<AnalysisResult>,
    next_result_id: i64,
}

#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<std::sync::MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::Unexpected("memory database lock poisoned".to_string()))
    }
}

fn not_found(result_id: i64) -> PortError {
    PortError::NotFound(format!("Result {} not found", result_id))
}

#[async_trait]
impl DatabaseService for MemoryDatabase {
    async fn get_or_create_user(&self, user_id: &str) -> PortResult<User> {
        let mut tables = self.lock()?;
        if let Some((user, _)) = tables.users.iter().find(|(u, _)| u.id == user_id) {
            return Ok(user.clone());
        }
        let user = User {
            id: user_id.to_string(),
            email: None,
            full_name: None,
        };
        tables.users.push((user.clone(), None));
        Ok(user)
    }

    async fn create_user_with_email(
        &self,
        user_id: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut tables = self.lock()?;
        if tables
            .users
            .iter()
            .any(|(u, _)| u.id == user_id || u.email.as_deref() == Some(email))
        {
            return Err(PortError::Conflict(format!("{} is already registered", email)));
        }
        let user = User {
            id: user_id.to_string(),
            email: Some(email.to_string()),
            full_name: None,
        };
        tables
            .users
            .push((user.clone(), Some(hashed_password.to_string())));
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let tables = self.lock()?;
        tables
            .users
            .iter()
            .find_map(|(u, hash)| match (u.email.as_deref(), hash) {
                (Some(e), Some(hash)) if e == email => Some(UserCredentials {
                    user_id: u.id.clone(),
                    email: e.to_string(),
                    hashed_password: hash.clone(),
                }),
                _ => None,
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn list_users(&self) -> PortResult<Vec<User>> {
        Ok(self.lock()?.users.iter().map(|(u, _)| u.clone()).collect())
    }

    async fn create_result(&self, new_result: NewAnalysisResult) -> PortResult<AnalysisResult> {
        let mut tables = self.lock()?;
        if !tables.users.iter().any(|(u, _)| u.id == new_result.user_id) {
            return Err(PortError::Unexpected(format!(
                "foreign key violation: user {} does not exist",
                new_result.user_id
            )));
        }
        tables.next_result_id += 1;
        // Strictly increasing timestamps keep newest-first ordering deterministic.
        let created_at = Utc::now() + Duration::microseconds(tables.next_result_id);
        let result = AnalysisResult {
            id: tables.next_result_id,
            user_id: new_result.user_id,
            filename: new_result.filename,
            preview_text: new_result.preview_text,
            summary_json: new_result.summary_json,
            created_at,
            user_rating: None,
            confidence_score: None,
        };
        tables.results.push(result.clone());
        Ok(result)
    }

    async fn list_results_for_user(&self, user_id: &str) -> PortResult<Vec<AnalysisResult>> {
        let tables = self.lock()?;
        let mut results: Vec<AnalysisResult> = tables
            .results
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }

    async fn get_result_for_user(
        &self,
        result_id: i64,
        user_id: &str,
    ) -> PortResult<AnalysisResult> {
        let tables = self.lock()?;
        tables
            .results
            .iter()
            .find(|r| r.id == result_id && r.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found(result_id))
    }

    async fn update_rating(&self, result_id: i64, user_id: &str, rating: f64) -> PortResult<()> {
        let mut tables = self.lock()?;
        let result = tables
            .results
            .iter_mut()
            .find(|r| r.id == result_id && r.user_id == user_id)
            .ok_or_else(|| not_found(result_id))?;
        result.user_rating = Some(rating);
        Ok(())
    }

    async fn update_confidence(
        &self,
        result_id: i64,
        user_id: &str,
        confidence: f64,
    ) -> PortResult<()> {
        let mut tables = self.lock()?;
        let result = tables
            .results
            .iter_mut()
            .find(|r| r.id == result_id && r.user_id == user_id)
            .ok_or_else(|| not_found(result_id))?;
        result.confidence_score = Some(confidence);
        Ok(())
    }

    async fn delete_result(&self, result_id: i64, user_id: &str) -> PortResult<()> {
        let mut tables = self.lock()?;
        let before = tables.results.len();
        tables
            .results
            .retain(|r| !(r.id == result_id && r.user_id == user_id));
        if tables.results.len() == before {
            return Err(not_found(result_id));
        }
        Ok(())
    }

    async fn purge_all(&self) -> PortResult<(u64, u64)> {
        let mut tables = self.lock()?;
        let counts = (tables.results.len() as u64, tables.users.len() as u64);
        tables.results.clear();
        tables.users.clear();
        Ok(counts)
    }
}
