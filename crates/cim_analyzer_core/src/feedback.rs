//! crates/cim_analyzer_core/src/feedback.rs
//!
//! Owner-scoped reads and user annotations on stored analysis results.

use crate::domain::AnalysisResult;
use crate::error::AnalysisError;
use crate::ports::{DatabaseService, PortError};
use std::ops::RangeInclusive;
use std::sync::Arc;

pub const RATING_RANGE: RangeInclusive<f64> = 1.0..=5.0;
pub const CONFIDENCE_RANGE: RangeInclusive<f64> = 0.0..=1.0;

const RESULT_NOT_FOUND: &str = "Result not found";

#[derive(Clone)]
pub struct ResultService {
    db: Arc<dyn DatabaseService>,
}

impl ResultService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<AnalysisResult>, AnalysisError> {
        Ok(self.db.list_results_for_user(user_id).await?)
    }

    /// Sets the user's rating. Ownership is checked before the range.
    pub async fn rate(
        &self,
        result_id: i64,
        user_id: &str,
        rating: f64,
    ) -> Result<f64, AnalysisError> {
        self.owned(result_id, user_id).await?;
        if !RATING_RANGE.contains(&rating) {
            return Err(AnalysisError::InvalidInput(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        self.db
            .update_rating(result_id, user_id, rating)
            .await
            .map_err(not_found)?;
        Ok(rating)
    }

    /// Overrides the confidence score. Ownership is checked before the range.
    pub async fn set_confidence(
        &self,
        result_id: i64,
        user_id: &str,
        confidence: f64,
    ) -> Result<f64, AnalysisError> {
        self.owned(result_id, user_id).await?;
        if !CONFIDENCE_RANGE.contains(&confidence) {
            return Err(AnalysisError::InvalidInput(
                "Confidence must be between 0 and 1".to_string(),
            ));
        }
        self.db
            .update_confidence(result_id, user_id, confidence)
            .await
            .map_err(not_found)?;
        Ok(confidence)
    }

    pub async fn delete(&self, result_id: i64, user_id: &str) -> Result<(), AnalysisError> {
        self.db
            .delete_result(result_id, user_id)
            .await
            .map_err(not_found)
    }

    async fn owned(&self, result_id: i64, user_id: &str) -> Result<AnalysisResult, AnalysisError> {
        self.db
            .get_result_for_user(result_id, user_id)
            .await
            .map_err(not_found)
    }
}

// The store's own message may name the owner; callers only ever see this one.
fn not_found(e: PortError) -> AnalysisError {
    match e {
        PortError::NotFound(_) => AnalysisError::NotFound(RESULT_NOT_FOUND.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewAnalysisResult;
    use crate::memory::MemoryDatabase;

    async fn seeded() -> (ResultService, Arc<MemoryDatabase>, i64) {
        let db = Arc::new(MemoryDatabase::new());
        db.get_or_create_user("alice").await.unwrap();
        db.get_or_create_user("bob").await.unwrap();
        let stored = db
            .create_result(NewAnalysisResult {
                user_id: "alice".to_string(),
                filename: "deal.pdf".to_string(),
                preview_text: "preview".to_string(),
                summary_json: "{}".to_string(),
            })
            .await
            .unwrap();
        (ResultService::new(db.clone()), db, stored.id)
    }

    #[tokio::test]
    async fn rating_in_range_is_stored() {
        let (service, db, id) = seeded().await;
        assert_eq!(service.rate(id, "alice", 4.0).await.unwrap(), 4.0);
        let stored = db.get_result_for_user(id, "alice").await.unwrap();
        assert_eq!(stored.user_rating, Some(4.0));
        assert_eq!(stored.confidence_score, None);
    }

    #[tokio::test]
    async fn out_of_range_rating_leaves_value_unchanged() {
        let (service, db, id) = seeded().await;
        service.rate(id, "alice", 3.0).await.unwrap();

        for bad in [0.0, 0.99, 5.01, 6.0, f64::NAN] {
            let err = service.rate(id, "alice", bad).await.unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidInput(_)), "{bad}");
        }
        let stored = db.get_result_for_user(id, "alice").await.unwrap();
        assert_eq!(stored.user_rating, Some(3.0));
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_rejected() {
        let (service, db, id) = seeded().await;
        let err = service.set_confidence(id, "alice", 1.5).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
        assert_eq!(
            db.get_result_for_user(id, "alice").await.unwrap().confidence_score,
            None
        );

        assert_eq!(service.set_confidence(id, "alice", 0.0).await.unwrap(), 0.0);
        assert_eq!(service.set_confidence(id, "alice", 1.0).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn other_users_see_not_found() {
        let (service, _db, id) = seeded().await;

        assert!(service.list("bob").await.unwrap().is_empty());
        assert!(matches!(
            service.rate(id, "bob", 5.0).await,
            Err(AnalysisError::NotFound(_))
        ));
        assert!(matches!(
            service.set_confidence(id, "bob", 0.5).await,
            Err(AnalysisError::NotFound(_))
        ));
        assert!(matches!(
            service.delete(id, "bob").await,
            Err(AnalysisError::NotFound(_))
        ));
        assert_eq!(service.list("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn not_found_wins_over_invalid_range() {
        let (service, _db, _id) = seeded().await;
        assert!(matches!(
            service.rate(9999, "alice", 42.0).await,
            Err(AnalysisError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn second_delete_is_not_found() {
        let (service, _db, id) = seeded().await;
        service.delete(id, "alice").await.unwrap();
        assert!(matches!(
            service.delete(id, "alice").await,
            Err(AnalysisError::NotFound(_))
        ));
    }
}
