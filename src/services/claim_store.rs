// Claim Store
// Keyed in-memory store of finished analyses.
// Records live for the life of the process; nothing caps or evicts them.

use crate::models::{AnalysisRecord, CombinedAnalysis, ConfidenceReport, RecordFilter};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct ClaimStore {
    records: RwLock<HashMap<Uuid, AnalysisRecord>>,
}

impl ClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a finished analysis under a fresh id and return the stored record
    pub async fn save(
        &self,
        claim: &str,
        analysis: CombinedAnalysis,
        confidence: ConfidenceReport,
    ) -> AnalysisRecord {
        let record = AnalysisRecord {
            id: Uuid::new_v4(),
            claim: claim.to_string(),
            analysis,
            confidence,
            created_at: Utc::now(),
        };

        self.records.write().await.insert(record.id, record.clone());
        info!(
            "[STORE] saved {} (score={:.2}, verified={})",
            record.id, record.confidence.score, record.confidence.verified
        );
        record
    }

    pub async fn find_by_id(&self, id: &Uuid) -> Option<AnalysisRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Records matching `filter`, oldest first
    pub async fn find(&self, filter: &RecordFilter) -> Vec<AnalysisRecord> {
        let mut matched: Vec<AnalysisRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.created_at);
        debug!("[STORE] filter matched {} record(s)", matched.len());
        matched
    }

    pub async fn find_all(&self) -> Vec<AnalysisRecord> {
        self.find(&RecordFilter::default()).await
    }

    pub async fn delete(&self, id: &Uuid) -> bool {
        self.records.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceLevel, ConfidenceWeights};
    use crate::services::analysis::confidence::aggregate;
    use chrono::Duration;

    fn report(score: f64, verified: bool) -> ConfidenceReport {
        ConfidenceReport {
            score,
            verified,
            explanation: String::new(),
            level: ConfidenceLevel::from_score(score),
            factors: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_save_and_find_by_id() {
        let store = ClaimStore::new();
        let analysis = CombinedAnalysis::assemble(Vec::new());
        let confidence = aggregate(&analysis, &ConfidenceWeights::default());

        let saved = store.save("Water boils at 100C", analysis, confidence).await;
        let found = store.find_by_id(&saved.id).await.unwrap();
        assert_eq!(found.claim, "Water boils at 100C");
        assert_eq!(found.confidence.score, 0.0);
        assert!(store.find_by_id(&Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_filter_by_verified_and_level() {
        let store = ClaimStore::new();
        let analysis = CombinedAnalysis::assemble(Vec::new());
        store.save("a", analysis.clone(), report(0.95, true)).await;
        store.save("b", analysis.clone(), report(0.75, true)).await;
        store.save("c", analysis, report(0.2, false)).await;

        let verified = store
            .find(&RecordFilter {
                verified: Some(true),
                ..RecordFilter::default()
            })
            .await;
        assert_eq!(verified.len(), 2);

        let very_high = store
            .find(&RecordFilter {
                confidence_level: Some(ConfidenceLevel::VeryHigh),
                ..RecordFilter::default()
            })
            .await;
        assert_eq!(very_high.len(), 1);
        assert_eq!(very_high[0].claim, "a");

        assert_eq!(store.find_all().await.len(), 3);
    }

    #[tokio::test]
    async fn test_filter_by_date_range() {
        let store = ClaimStore::new();
        let saved = store
            .save("x", CombinedAnalysis::assemble(Vec::new()), report(0.5, false))
            .await;

        let after = RecordFilter {
            start_date: Some(saved.created_at + Duration::seconds(1)),
            ..RecordFilter::default()
        };
        assert!(store.find(&after).await.is_empty());

        let around = RecordFilter {
            start_date: Some(saved.created_at - Duration::seconds(1)),
            end_date: Some(saved.created_at + Duration::seconds(1)),
            ..RecordFilter::default()
        };
        assert_eq!(store.find(&around).await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = ClaimStore::new();
        let saved = store
            .save("x", CombinedAnalysis::assemble(Vec::new()), report(0.5, false))
            .await;
        assert!(store.delete(&saved.id).await);
        assert!(!store.delete(&saved.id).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_records_are_kept_until_deleted() {
        let store = ClaimStore::new();
        let mut ids = Vec::new();
        for i in 0..50 {
            let saved = store
                .save(&format!("claim {i}"), CombinedAnalysis::assemble(Vec::new()), report(0.5, false))
                .await;
            ids.push(saved.id);
        }
        assert_eq!(store.len().await, 50);
        assert!(store.find_by_id(&ids[0]).await.is_some());

        assert!(store.delete(&ids[0]).await);
        assert_eq!(store.len().await, 49);
        assert!(store.find_by_id(&ids[49]).await.is_some());
    }
}
