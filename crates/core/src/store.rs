//! 탐지 규칙 스토어 trait — 영속성 레이어 확장 포인트
//!
//! 실제 데이터베이스 구현은 이 crate 밖에 있습니다. 파이프라인은
//! [`DetectionStore`]의 upsert/delete-by-source 계약만 의존합니다.
//!
//! 재인제스트는 전체 교체(full-replace) 방식입니다: 저장소 단위로
//! `delete_all` 후 새 레코드 집합을 upsert합니다.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::NormalizedDetection;

/// 정규화된 탐지 규칙 영속성 trait
///
/// 배치 upsert가 통째로 실패하면 호출자(인제스트 오케스트레이터)가
/// 레코드 단위 upsert로 폴백해 불량 레코드 하나가 배치 전체를
/// 버리지 않도록 합니다.
pub trait DetectionStore: Send + Sync {
    /// 해당 출처의 모든 레코드를 삭제하고 삭제 건수를 반환합니다.
    fn delete_all(&self, source: &str) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// 단일 레코드를 upsert합니다. `id`가 같으면 덮어씁니다.
    fn upsert(
        &self,
        record: &NormalizedDetection,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 레코드 배치를 upsert하고 저장 건수를 반환합니다.
    ///
    /// 배치 커밋 자체가 실패하면 에러를 반환합니다. 부분 성공은 없습니다.
    fn upsert_batch(
        &self,
        records: &[NormalizedDetection],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// 저장소의 규칙 수 메타데이터를 갱신합니다.
    fn update_rule_count(
        &self,
        source: &str,
        count: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 해당 출처의 현재 레코드 수를 반환합니다.
    fn count(&self, source: &str) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// 인메모리 스토어 — 테스트 및 참조 구현
///
/// `id`를 키로 하는 단일 맵을 사용합니다.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, NormalizedDetection>>,
    rule_counts: RwLock<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 해당 출처의 레코드를 복제해 반환합니다 (테스트 검증용).
    pub async fn records_for(&self, source: &str) -> Vec<NormalizedDetection> {
        let records = self.records.read().await;
        let mut out: Vec<NormalizedDetection> = records
            .values()
            .filter(|r| r.source == source)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.source_file.cmp(&b.source_file));
        out
    }

    /// 기록된 규칙 수 메타데이터를 반환합니다.
    pub async fn rule_count_for(&self, source: &str) -> Option<u64> {
        self.rule_counts.read().await.get(source).copied()
    }
}

impl DetectionStore for MemoryStore {
    async fn delete_all(&self, source: &str) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.source != source);
        Ok((before - records.len()) as u64)
    }

    async fn upsert(&self, record: &NormalizedDetection) -> Result<(), StoreError> {
        if record.id.is_empty() {
            return Err(StoreError::Rejected {
                id: record.source_file.clone(),
                reason: "empty id".to_owned(),
            });
        }
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn upsert_batch(&self, records: &[NormalizedDetection]) -> Result<u64, StoreError> {
        let mut stored = 0u64;
        for record in records {
            self.upsert(record).await?;
            stored += 1;
        }
        Ok(stored)
    }

    async fn update_rule_count(&self, source: &str, count: u64) -> Result<(), StoreError> {
        self.rule_counts
            .write()
            .await
            .insert(source.to_owned(), count);
        Ok(())
    }

    async fn count(&self, source: &str) -> Result<u64, StoreError> {
        let records = self.records.read().await;
        Ok(records.values().filter(|r| r.source == source).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QueryLanguage, RuleSeverity, RuleStatus};
    use chrono::Utc;

    fn sample(source: &str, file: &str) -> NormalizedDetection {
        let now = Utc::now();
        NormalizedDetection {
            id: format!("{source}:{file}"),
            source: source.to_owned(),
            source_file: file.to_owned(),
            source_repo_url: "https://example.invalid/repo.git".to_owned(),
            source_rule_url: None,
            rule_id: None,
            title: "Sample".to_owned(),
            description: None,
            author: None,
            status: RuleStatus::Unknown,
            severity: RuleSeverity::Unknown,
            log_sources: vec![],
            data_sources: vec![],
            platform: String::new(),
            event_category: String::new(),
            data_source_normalized: String::new(),
            mitre_tactics: vec![],
            mitre_techniques: vec![],
            detection_logic: "query".to_owned(),
            language: QueryLanguage::Unknown,
            tags: vec![],
            references: vec![],
            false_positives: vec![],
            raw_content: String::new(),
            rule_created_date: None,
            rule_modified_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn upsert_and_count() {
        let store = MemoryStore::new();
        store.upsert(&sample("sigma", "a.yml")).await.unwrap();
        store.upsert(&sample("sigma", "b.yml")).await.unwrap();
        store.upsert(&sample("elastic", "c.toml")).await.unwrap();
        assert_eq!(store.count("sigma").await.unwrap(), 2);
        assert_eq!(store.count("elastic").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_same_id_overwrites() {
        let store = MemoryStore::new();
        let mut record = sample("sigma", "a.yml");
        store.upsert(&record).await.unwrap();
        record.title = "Updated".to_owned();
        store.upsert(&record).await.unwrap();
        assert_eq!(store.count("sigma").await.unwrap(), 1);
        assert_eq!(store.records_for("sigma").await[0].title, "Updated");
    }

    #[tokio::test]
    async fn delete_all_removes_only_one_source() {
        let store = MemoryStore::new();
        store.upsert(&sample("sigma", "a.yml")).await.unwrap();
        store.upsert(&sample("elastic", "b.toml")).await.unwrap();
        let deleted = store.delete_all("sigma").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count("sigma").await.unwrap(), 0);
        assert_eq!(store.count("elastic").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_batch_stores_all() {
        let store = MemoryStore::new();
        let batch = vec![sample("sigma", "a.yml"), sample("sigma", "b.yml")];
        let stored = store.upsert_batch(&batch).await.unwrap();
        assert_eq!(stored, 2);
    }

    #[tokio::test]
    async fn empty_id_rejected() {
        let store = MemoryStore::new();
        let mut record = sample("sigma", "a.yml");
        record.id = String::new();
        let result = store.upsert(&record).await;
        assert!(matches!(result, Err(StoreError::Rejected { .. })));
    }

    #[tokio::test]
    async fn rule_count_metadata() {
        let store = MemoryStore::new();
        store.update_rule_count("sigma", 42).await.unwrap();
        assert_eq!(store.rule_count_for("sigma").await, Some(42));
        assert_eq!(store.rule_count_for("elastic").await, None);
    }
}
