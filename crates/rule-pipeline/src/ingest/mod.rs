//! 인제스트 오케스트레이터 — 탐색 → 파싱 → 정규화 → 저장
//!
//! 저장소 하나의 실행 흐름:
//!
//! ```text
//! delete_all(source) -> enumerate -> [can_parse 필터] -> read
//!     -> parse -> normalize -> 배치 버퍼 -> upsert_batch
//!                                  (배치 실패 시 레코드 단위 폴백)
//! -> update_rule_count -> IngestionStats
//! ```
//!
//! 재인제스트는 전체 교체(full-replace)입니다. 불량 파일 하나가 실행을
//! 중단시키는 일은 없으며, 모든 실패는 파일 단위로 통계에 기록됩니다.

pub mod stats;

use std::time::Instant;

use rulewarden_core::config::{RepositoryConfig, RulewardenConfig};
use rulewarden_core::metrics as metric_names;
use rulewarden_core::store::DetectionStore;
use rulewarden_core::types::NormalizedDetection;

use crate::discovery::RuleDiscovery;
use crate::error::RulePipelineError;
use crate::normalizer::NormalizerRegistry;
use crate::parser::{ParseOutcome, ParserRegistry};

pub use stats::{ErrorSeverity, ErrorStage, IngestionError, IngestionReport, IngestionStats};

/// 인제스트 오케스트레이터
///
/// 탐색 제공자와 스토어는 주입되며, 파서/노멀라이저 레지스트리는
/// 설정의 저장소 목록으로 구성됩니다.
pub struct IngestionService<D, S> {
    config: RulewardenConfig,
    discovery: D,
    store: S,
    parsers: ParserRegistry,
    normalizers: NormalizerRegistry,
}

impl<D, S> IngestionService<D, S>
where
    D: RuleDiscovery,
    S: DetectionStore,
{
    pub fn new(config: RulewardenConfig, discovery: D, store: S) -> Self {
        let normalizers = NormalizerRegistry::from_config(&config);
        Self {
            config,
            discovery,
            store,
            parsers: ParserRegistry::with_defaults(),
            normalizers,
        }
    }

    /// 스토어 참조를 반환합니다 (조회/검증용).
    pub fn store(&self) -> &S {
        &self.store
    }

    /// 저장소 하나를 인제스트합니다.
    ///
    /// 재호출해도 안전합니다 — 기존 레코드를 모두 지우고 새로 채웁니다.
    pub async fn ingest(&self, repo_name: &str) -> Result<IngestionStats, RulePipelineError> {
        let Some(repo) = self.config.repository(repo_name) else {
            return Err(RulePipelineError::UnknownRepository(repo_name.to_owned()));
        };
        let Some(vendor) = repo.vendor() else {
            return Err(RulePipelineError::UnknownRepository(repo_name.to_owned()));
        };
        let (Some(parser), Some(normalizer)) =
            (self.parsers.get(vendor), self.normalizers.get(vendor))
        else {
            return Err(RulePipelineError::UnknownRepository(repo_name.to_owned()));
        };

        let mut stats = IngestionStats::begin();
        let wall_clock = Instant::now();
        tracing::info!(repository = %repo_name, "starting ingestion");

        // 전체 교체: 기존 레코드 선삭제
        let deleted = self.store.delete_all(vendor.as_str()).await?;
        if deleted > 0 {
            tracing::debug!(repository = %repo_name, deleted, "cleared previous records");
        }

        let batch_size = self.config.ingest.batch_size;
        let mut buffer: Vec<NormalizedDetection> = Vec::with_capacity(batch_size);

        for relative_path in self.discovery.enumerate(repo).await? {
            stats.discovered += 1;

            if !parser.can_parse(&relative_path) {
                stats.skipped_by_filter += 1;
                continue;
            }

            let Some(content) = self.discovery.read(repo, &relative_path).await else {
                stats.add_error(
                    &relative_path,
                    ErrorStage::Read,
                    ErrorSeverity::Error,
                    "failed to read file content",
                    None,
                );
                continue;
            };

            let parsed = match parser.parse(&relative_path, &content) {
                Ok(parsed) => {
                    stats.parsed += 1;
                    parsed
                }
                Err(ParseOutcome::Skipped { reason }) => {
                    stats.add_error(
                        &relative_path,
                        ErrorStage::Parse,
                        ErrorSeverity::Warning,
                        reason,
                        None,
                    );
                    continue;
                }
                Err(ParseOutcome::Failed { message }) => {
                    stats.add_error(
                        &relative_path,
                        ErrorStage::Parse,
                        ErrorSeverity::Error,
                        message,
                        None,
                    );
                    continue;
                }
            };

            match normalizer.normalize(&parsed) {
                Ok(record) => {
                    stats.normalized += 1;
                    buffer.push(record);
                    if buffer.len() >= batch_size {
                        self.flush(&mut buffer, &mut stats).await;
                    }
                }
                Err(e) => {
                    stats.add_error(
                        &relative_path,
                        ErrorStage::Normalize,
                        ErrorSeverity::Error,
                        e.to_string(),
                        None,
                    );
                }
            }
        }

        // 잔여 버퍼 플러시
        if !buffer.is_empty() {
            self.flush(&mut buffer, &mut stats).await;
        }

        self.store
            .update_rule_count(vendor.as_str(), stats.stored)
            .await?;

        stats.finish();
        self.record_metrics(repo_name, &stats, wall_clock);

        tracing::info!(
            repository = %repo_name,
            discovered = stats.discovered,
            skipped = stats.skipped_by_filter,
            parsed = stats.parsed,
            normalized = stats.normalized,
            stored = stats.stored,
            errors = stats.error_count(),
            warnings = stats.warning_count(),
            success_rate = format!("{:.1}%", stats.success_rate()),
            "ingestion complete"
        );

        Ok(stats)
    }

    /// 설정된 모든 저장소를 순차 인제스트합니다.
    pub async fn ingest_all(&self) -> Vec<(String, Result<IngestionStats, RulePipelineError>)> {
        let mut results = Vec::new();
        for repo in self.repositories() {
            let name = repo.name.clone();
            let result = self.ingest(&name).await;
            if let Err(e) = &result {
                tracing::error!(repository = %name, error = %e, "ingestion failed");
            }
            results.push((name, result));
        }
        results
    }

    /// 설정된 저장소 목록
    pub fn repositories(&self) -> &[RepositoryConfig] {
        &self.config.repositories
    }

    /// 버퍼를 스토어에 커밋합니다.
    ///
    /// 배치 커밋이 실패하면 레코드 단위로 다시 시도해, 불량 레코드
    /// 하나가 배치 전체를 버리지 않도록 합니다.
    async fn flush(&self, buffer: &mut Vec<NormalizedDetection>, stats: &mut IngestionStats) {
        if buffer.is_empty() {
            return;
        }

        match self.store.upsert_batch(buffer).await {
            Ok(stored) => {
                stats.stored += stored;
            }
            Err(batch_error) => {
                tracing::warn!(
                    error = %batch_error,
                    batch_len = buffer.len(),
                    "batch commit failed, retrying records individually"
                );
                for record in buffer.iter() {
                    match self.store.upsert(record).await {
                        Ok(()) => stats.stored += 1,
                        Err(e) => {
                            stats.add_error(
                                &record.source_file,
                                ErrorStage::Store,
                                ErrorSeverity::Error,
                                e.to_string(),
                                Some(batch_error.to_string()),
                            );
                        }
                    }
                }
            }
        }

        buffer.clear();
    }

    fn record_metrics(&self, repo_name: &str, stats: &IngestionStats, wall_clock: Instant) {
        let repository = repo_name.to_owned();
        metrics::counter!(
            metric_names::INGEST_FILES_DISCOVERED_TOTAL,
            metric_names::LABEL_REPOSITORY => repository.clone()
        )
        .increment(stats.discovered);
        metrics::counter!(
            metric_names::INGEST_RULES_PARSED_TOTAL,
            metric_names::LABEL_REPOSITORY => repository.clone()
        )
        .increment(stats.parsed);
        metrics::counter!(
            metric_names::INGEST_RULES_STORED_TOTAL,
            metric_names::LABEL_REPOSITORY => repository.clone()
        )
        .increment(stats.stored);
        for (stage, errors) in stats.errors_by_stage() {
            metrics::counter!(
                metric_names::INGEST_ERRORS_TOTAL,
                metric_names::LABEL_REPOSITORY => repository.clone(),
                metric_names::LABEL_STAGE => stage
            )
            .increment(errors.len() as u64);
        }
        metrics::histogram!(metric_names::INGEST_RUN_DURATION_SECONDS)
            .record(wall_clock.elapsed().as_secs_f64());
    }
}
