//! 인제스트 에러 추적 및 실행 통계
//!
//! 모든 실패는 파일 단위로 기록되며 실행을 중단시키지 않습니다.
//! 통계만으로 전체 실패(stored == 0)와 부분 성공(error_count > 0 &&
//! stored > 0)을 구분할 수 있어야 합니다.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 에러가 발생한 파이프라인 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStage {
    /// 파일 내용을 읽을 수 없음
    Read,
    /// 벤더 문법 파싱 실패 또는 거부
    Parse,
    /// 정규화 중 예기치 않은 실패
    Normalize,
    /// 스토어가 레코드를 거부
    Store,
}

impl ErrorStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Parse => "parse",
            Self::Normalize => "normalize",
            Self::Store => "store",
        }
    }
}

/// 에러 심각도
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// 규칙이 건너뛰어졌지만 예상된 상황 (필수 필드 누락 등)
    Warning,
    /// 규칙 처리 실패
    Error,
}

/// 인제스트 중 발생한 단일 에러
#[derive(Debug, Clone, Serialize)]
pub struct IngestionError {
    /// 문제가 된 파일 경로
    pub file_path: String,
    /// 발생 단계
    pub stage: ErrorStage,
    /// 심각도
    pub severity: ErrorSeverity,
    /// 운영자용 메시지
    pub message: String,
    /// 기술적 상세 (있을 경우)
    pub details: Option<String>,
    /// 기록 시각
    pub timestamp: DateTime<Utc>,
}

/// 인제스트 실행 통계
///
/// 카운터와 에러 목록(첫 발생 순서 유지)을 담습니다.
#[derive(Debug, Clone, Default)]
pub struct IngestionStats {
    /// 탐색된 후보 파일 수
    pub discovered: u64,
    /// can_parse 필터로 건너뛴 파일 수
    pub skipped_by_filter: u64,
    /// 파싱 성공 수
    pub parsed: u64,
    /// 정규화 성공 수
    pub normalized: u64,
    /// 저장 성공 수
    pub stored: u64,
    /// 에러 목록 (첫 발생 순서)
    pub errors: Vec<IngestionError>,
    /// 실행 시작 시각
    pub started_at: Option<DateTime<Utc>>,
    /// 실행 종료 시각
    pub finished_at: Option<DateTime<Utc>>,
}

impl IngestionStats {
    /// 시작 시각이 찍힌 빈 통계를 만듭니다.
    pub fn begin() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// 종료 시각을 기록합니다.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// 에러를 추가합니다.
    pub fn add_error(
        &mut self,
        file_path: impl Into<String>,
        stage: ErrorStage,
        severity: ErrorSeverity,
        message: impl Into<String>,
        details: Option<String>,
    ) {
        self.errors.push(IngestionError {
            file_path: file_path.into(),
            stage,
            severity,
            message: message.into(),
            details,
            timestamp: Utc::now(),
        });
    }

    /// ERROR 심각도 에러 수
    pub fn error_count(&self) -> u64 {
        self.errors
            .iter()
            .filter(|e| e.severity == ErrorSeverity::Error)
            .count() as u64
    }

    /// WARNING 심각도 에러 수
    pub fn warning_count(&self) -> u64 {
        self.errors
            .iter()
            .filter(|e| e.severity == ErrorSeverity::Warning)
            .count() as u64
    }

    /// 저장 성공률 (%) — 탐색 0건이면 0
    pub fn success_rate(&self) -> f64 {
        if self.discovered == 0 {
            return 0.0;
        }
        (self.stored as f64 / self.discovered as f64) * 100.0
    }

    /// 실행 소요 시간 (초) — 완료되지 않았으면 None
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => {
                Some((end - start).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }

    /// 단계별 에러 그룹
    pub fn errors_by_stage(&self) -> BTreeMap<&'static str, Vec<&IngestionError>> {
        let mut by_stage: BTreeMap<&'static str, Vec<&IngestionError>> = BTreeMap::new();
        for error in &self.errors {
            by_stage.entry(error.stage.as_str()).or_default().push(error);
        }
        by_stage
    }

    /// 운영자 보고용 전체 리포트
    pub fn report(&self, sample_limit: usize) -> IngestionReport {
        let errors_by_stage = self
            .errors_by_stage()
            .into_iter()
            .map(|(stage, errors)| {
                (
                    stage.to_owned(),
                    errors.into_iter().cloned().collect::<Vec<_>>(),
                )
            })
            .collect();

        IngestionReport {
            discovered: self.discovered,
            skipped_by_filter: self.skipped_by_filter,
            parsed: self.parsed,
            normalized: self.normalized,
            stored: self.stored,
            error_count: self.error_count(),
            warning_count: self.warning_count(),
            success_rate: (self.success_rate() * 100.0).round() / 100.0,
            duration_seconds: self.duration_seconds(),
            errors_by_stage,
            sample_errors: self.errors.iter().take(sample_limit).cloned().collect(),
        }
    }
}

/// 직렬화 가능한 통계 리포트
///
/// 스케줄러/API/CLI가 그대로 JSON으로 내보낼 수 있는 평면 구조입니다.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub discovered: u64,
    pub skipped_by_filter: u64,
    pub parsed: u64,
    pub normalized: u64,
    pub stored: u64,
    pub error_count: u64,
    pub warning_count: u64,
    /// 성공률 (%, 소수 둘째 자리 반올림)
    pub success_rate: f64,
    pub duration_seconds: Option<f64>,
    pub errors_by_stage: BTreeMap<String, Vec<IngestionError>>,
    /// 처음 N개 에러 샘플
    pub sample_errors: Vec<IngestionError>,
}
