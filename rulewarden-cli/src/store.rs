//! JSON 파일 스토어 — CLI용 경량 영속성 구현
//!
//! 출처별로 `{data_dir}/detections/{source}.json` 파일 하나에 레코드
//! 배열을 보관합니다. 운영 배포는 관계형 스토어를 붙이는 것을 전제로
//! 하며, 이 구현은 단일 호스트 CLI 사용과 테스트를 위한 것입니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use rulewarden_core::error::StoreError;
use rulewarden_core::store::DetectionStore;
use rulewarden_core::types::NormalizedDetection;

/// JSON 파일 기반 탐지 규칙 스토어
pub struct JsonFileStore {
    base_dir: PathBuf,
    /// 파일 읽기-수정-쓰기 직렬화 잠금
    write_gate: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: data_dir.as_ref().join("detections"),
            write_gate: Mutex::new(()),
        }
    }

    fn source_file(&self, source: &str) -> PathBuf {
        self.base_dir.join(format!("{source}.json"))
    }

    fn count_file(&self) -> PathBuf {
        self.base_dir.join("rule_counts.json")
    }

    async fn load(&self, source: &str) -> Result<Vec<NormalizedDetection>, StoreError> {
        let path = self.source_file(source);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Backend(e.to_string())),
        };
        serde_json::from_str(&content).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn save(
        &self,
        source: &str,
        records: &[NormalizedDetection],
    ) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let json = serde_json::to_string(records).map_err(|e| StoreError::Backend(e.to_string()))?;
        tokio::fs::write(self.source_file(source), json)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

}

impl DetectionStore for JsonFileStore {
    async fn delete_all(&self, source: &str) -> Result<u64, StoreError> {
        let _gate = self.write_gate.lock().await;
        let existing = self.load(source).await?;
        let count = existing.len() as u64;
        match tokio::fs::remove_file(self.source_file(source)).await {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }

    async fn upsert(&self, record: &NormalizedDetection) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        let mut records = self.load(&record.source).await?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        self.save(&record.source, &records).await
    }

    async fn upsert_batch(&self, batch: &[NormalizedDetection]) -> Result<u64, StoreError> {
        let Some(first) = batch.first() else {
            return Ok(0);
        };
        let _gate = self.write_gate.lock().await;

        let mut records = self.load(&first.source).await?;
        for record in batch {
            if record.source != first.source {
                return Err(StoreError::Backend(
                    "mixed sources in one batch".to_owned(),
                ));
            }
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
        }
        self.save(&first.source, &records).await?;
        Ok(batch.len() as u64)
    }

    async fn update_rule_count(&self, source: &str, count: u64) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        let path = self.count_file();
        let mut counts: BTreeMap<String, u64> = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        };
        counts.insert(source.to_owned(), count);

        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let json =
            serde_json::to_string_pretty(&counts).map_err(|e| StoreError::Backend(e.to_string()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn count(&self, source: &str) -> Result<u64, StoreError> {
        Ok(self.load(source).await?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rulewarden_core::types::{QueryLanguage, RuleSeverity, RuleStatus};

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
    async fn roundtrip_upsert_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.upsert(&sample("sigma", "a.yml")).await.unwrap();
        store.upsert(&sample("sigma", "b.yml")).await.unwrap();
        assert_eq!(store.count("sigma").await.unwrap(), 2);

        // 같은 ID upsert는 덮어쓴다
        store.upsert(&sample("sigma", "a.yml")).await.unwrap();
        assert_eq!(store.count("sigma").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_all_removes_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store
            .upsert_batch(&[sample("sigma", "a.yml"), sample("sigma", "b.yml")])
            .await
            .unwrap();
        let deleted = store.delete_all("sigma").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count("sigma").await.unwrap(), 0);
        assert_eq!(store.delete_all("sigma").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn batch_rejects_mixed_sources() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let result = store
            .upsert_batch(&[sample("sigma", "a.yml"), sample("elastic", "b.toml")])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rule_counts_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.update_rule_count("sigma", 7).await.unwrap();
        store.update_rule_count("elastic", 3).await.unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("detections/rule_counts.json")).unwrap();
        let counts: BTreeMap<String, u64> = serde_json::from_str(&content).unwrap();
        assert_eq!(counts["sigma"], 7);
        assert_eq!(counts["elastic"], 3);
    }
}
