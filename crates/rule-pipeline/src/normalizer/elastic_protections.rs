//! Elastic protections-artifacts 노멀라이저
//!
//! 행위 규칙은 EQL을 사용하며, 엔드포인트 OS 코퍼스에서 이벤트
//! 카테고리가 탐지되지 않으면 process로 기본 설정합니다 (행위 규칙의
//! 대다수가 프로세스 이벤트 기반).

use rulewarden_core::types::{
    DetectionLogic, NormalizedDetection, ParsedRule, QueryLanguage, Vendor,
};

use crate::error::RulePipelineError;
use crate::taxonomy::{classify, TaxonomyHints};

use super::helpers::{base_record, normalize_data_sources};
use super::{RepositoryContext, RuleNormalizer};

/// 이벤트 카테고리 기본값을 적용할 엔드포인트 OS 제품군
const ENDPOINT_PRODUCTS: &[&str] = &["windows", "linux", "macos", "cross_platform"];

/// Elastic protections-artifacts 노멀라이저
pub struct ElasticProtectionsNormalizer {
    ctx: RepositoryContext,
}

impl ElasticProtectionsNormalizer {
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }
}

impl RuleNormalizer for ElasticProtectionsNormalizer {
    fn vendor(&self) -> Vendor {
        Vendor::ElasticProtections
    }

    fn normalize(&self, parsed: &ParsedRule) -> Result<NormalizedDetection, RulePipelineError> {
        let mut record = base_record(parsed, &self.ctx);

        record.rule_id = parsed.extra_str("id").map(|s| s.to_owned());

        let log_sources = parsed.log_source.flatten();
        let triple = classify(&TaxonomyHints {
            log_sources: &log_sources,
            product: parsed.log_source.product.as_deref(),
            category: parsed.log_source.category.as_deref(),
            ..Default::default()
        });

        let product = parsed
            .log_source
            .product
            .as_deref()
            .unwrap_or("")
            .to_lowercase();

        record.data_sources = normalize_data_sources(&extract_data_sources(parsed, &product));
        record.log_sources = log_sources;
        record.platform = triple.platform;
        record.event_category = if triple.event_category.is_empty()
            && ENDPOINT_PRODUCTS.contains(&product.as_str())
        {
            "process".to_owned()
        } else {
            triple.event_category
        };
        record.data_source_normalized = if triple.data_source.is_empty() {
            "defender".to_owned()
        } else {
            triple.data_source
        };

        record.detection_logic = match &parsed.detection_logic {
            DetectionLogic::Query(query) if !query.trim().is_empty() => query.clone(),
            _ => "No detection logic available".to_owned(),
        };
        record.language = QueryLanguage::Eql;

        record.references = Vec::new();
        record.rule_created_date = None;
        record.rule_modified_date = None;

        Ok(record)
    }
}

/// OS 제품군과 카테고리를 데이터 소스 토큰으로 모읍니다.
fn extract_data_sources(parsed: &ParsedRule, product: &str) -> Vec<String> {
    let mut raw = Vec::new();

    match product {
        "windows" => {
            raw.push("windows_event".to_owned());
            raw.push("endpoint".to_owned());
        }
        "linux" => {
            raw.push("linux".to_owned());
            raw.push("endpoint".to_owned());
        }
        "macos" => {
            raw.push("macos".to_owned());
            raw.push("endpoint".to_owned());
        }
        _ => raw.push("endpoint".to_owned()),
    }

    if let Some(category) = &parsed.log_source.category {
        raw.push(category.to_lowercase());
    }
    raw.push("behavior_event".to_owned());

    raw
}
