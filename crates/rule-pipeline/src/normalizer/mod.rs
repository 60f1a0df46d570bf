//! 규칙 정규화 모듈 — 중간 표현을 표준 스키마로 변환
//!
//! 각 노멀라이저는 [`RuleNormalizer`] trait을 구현하며, 공통 헬퍼
//! ([`helpers`])로 식별자 생성 / 어휘 접기 / 날짜 파싱 / 데이터 소스
//! 매핑을 공유하고, 탐지 로직 렌더링과 쿼리 언어 판별만 벤더별로
//! 다르게 처리합니다.

pub mod elastic;
pub mod elastic_hunting;
pub mod elastic_protections;
pub mod helpers;
pub mod lolrmm;
pub mod sentinel;
pub mod sigma;
pub mod splunk;
pub mod sublime;

use std::collections::HashMap;

use rulewarden_core::config::{RepositoryConfig, RulewardenConfig};
use rulewarden_core::types::{NormalizedDetection, ParsedRule, Vendor};

use crate::error::RulePipelineError;

pub use elastic::ElasticNormalizer;
pub use elastic_hunting::ElasticHuntingNormalizer;
pub use elastic_protections::ElasticProtectionsNormalizer;
pub use lolrmm::LolrmmNormalizer;
pub use sentinel::SentinelNormalizer;
pub use sigma::SigmaNormalizer;
pub use splunk::SplunkNormalizer;
pub use sublime::SublimeNormalizer;

/// 노멀라이저가 참조하는 저장소 컨텍스트
///
/// 직접 링크 URL 생성에 필요한 저장소 URL과 브랜치를 담습니다.
#[derive(Debug, Clone)]
pub struct RepositoryContext {
    pub vendor: Vendor,
    pub repo_url: String,
    pub branch: String,
}

impl RepositoryContext {
    /// 저장소 설정에서 컨텍스트를 만듭니다.
    ///
    /// 알 수 없는 벤더 이름이면 `None`입니다.
    pub fn from_config(repo: &RepositoryConfig) -> Option<Self> {
        Some(Self {
            vendor: repo.vendor()?,
            repo_url: repo.url.clone(),
            branch: repo.branch_or_default().to_owned(),
        })
    }
}

/// 규칙 노멀라이저 trait
pub trait RuleNormalizer: Send + Sync {
    /// 이 노멀라이저가 담당하는 벤더
    fn vendor(&self) -> Vendor;

    /// 중간 표현을 표준 스키마로 변환합니다.
    ///
    /// 누락되거나 이상한 데이터는 내부에서 관대하게 처리하며,
    /// 정말 예기치 않은 형태(렌더링 불가 등)에만 에러를 반환합니다.
    fn normalize(&self, parsed: &ParsedRule) -> Result<NormalizedDetection, RulePipelineError>;
}

/// 노멀라이저 레지스트리 — 벤더 이름으로 노멀라이저를 찾습니다.
pub struct NormalizerRegistry {
    normalizers: HashMap<Vendor, Box<dyn RuleNormalizer>>,
}

impl NormalizerRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self {
            normalizers: HashMap::new(),
        }
    }

    /// 설정의 저장소 목록으로 레지스트리를 구성합니다.
    ///
    /// 설정에 없는 벤더는 등록되지 않습니다.
    pub fn from_config(config: &RulewardenConfig) -> Self {
        let mut registry = Self::new();
        for repo in &config.repositories {
            let Some(ctx) = RepositoryContext::from_config(repo) else {
                continue;
            };
            registry.register(make_normalizer(ctx));
        }
        registry
    }

    /// 노멀라이저를 등록합니다. 같은 벤더가 이미 있으면 교체됩니다.
    pub fn register(&mut self, normalizer: Box<dyn RuleNormalizer>) {
        self.normalizers.insert(normalizer.vendor(), normalizer);
    }

    /// 벤더로 노멀라이저를 찾습니다.
    pub fn get(&self, vendor: Vendor) -> Option<&dyn RuleNormalizer> {
        self.normalizers.get(&vendor).map(|n| n.as_ref())
    }
}

impl Default for NormalizerRegistry {
    fn default() -> Self {
        Self::from_config(&RulewardenConfig::default())
    }
}

/// 벤더에 맞는 노멀라이저 인스턴스를 생성합니다.
fn make_normalizer(ctx: RepositoryContext) -> Box<dyn RuleNormalizer> {
    match ctx.vendor {
        Vendor::Sigma => Box::new(SigmaNormalizer::new(ctx)),
        Vendor::Elastic => Box::new(ElasticNormalizer::new(ctx)),
        Vendor::Splunk => Box::new(SplunkNormalizer::new(ctx)),
        Vendor::Sentinel => Box::new(SentinelNormalizer::new(ctx)),
        Vendor::Sublime => Box::new(SublimeNormalizer::new(ctx)),
        Vendor::ElasticProtections => Box::new(ElasticProtectionsNormalizer::new(ctx)),
        Vendor::ElasticHunting => Box::new(ElasticHuntingNormalizer::new(ctx)),
        Vendor::Lolrmm => Box::new(LolrmmNormalizer::new(ctx)),
    }
}
