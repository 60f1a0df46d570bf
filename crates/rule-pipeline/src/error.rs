//! 규칙 파이프라인 에러 타입
//!
//! [`RulePipelineError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<RulePipelineError> for RulewardenError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use rulewarden_core::error::{CatalogError, PipelineError, RulewardenError, StoreError};

/// 규칙 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum RulePipelineError {
    /// 등록되지 않은 저장소 이름
    #[error("unknown repository: {0}")]
    UnknownRepository(String),

    /// 규칙 파일 탐색 실패 (저장소 디렉토리 자체를 읽을 수 없음)
    #[error("discovery error: {repository}: {reason}")]
    Discovery {
        /// 저장소 이름
        repository: String,
        /// 실패 사유
        reason: String,
    },

    /// 정규화 실패 (구조화 로직 렌더링 실패 등 예기치 않은 형태)
    #[error("normalize error: {file_path}: {reason}")]
    Normalize {
        /// 문제가 된 파일 경로
        file_path: String,
        /// 실패 사유
        reason: String,
    },

    /// MITRE ATT&CK 카탈로그 에러
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// 스토어 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RulePipelineError> for RulewardenError {
    fn from(err: RulePipelineError) -> Self {
        match err {
            RulePipelineError::UnknownRepository(name) => {
                RulewardenError::Pipeline(PipelineError::UnknownRepository(name))
            }
            RulePipelineError::Catalog(e) => RulewardenError::Catalog(e),
            RulePipelineError::Store(e) => RulewardenError::Store(e),
            RulePipelineError::Io(e) => RulewardenError::Io(e),
            other => RulewardenError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
