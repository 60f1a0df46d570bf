//! LOLRMM 노멀라이저 (Sigma 방언)
//!
//! Sigma와 같은 YAML 렌더링을 쓰되, RMM 도구 탐지라는 맥락을
//! 데이터 소스에 반영합니다.

use rulewarden_core::types::{
    DetectionLogic, NormalizedDetection, ParsedRule, QueryLanguage, Vendor,
};

use crate::error::RulePipelineError;
use crate::taxonomy::{classify, TaxonomyHints};

use super::helpers::{base_record, json_string_list, normalize_data_sources, parse_date};
use super::{RepositoryContext, RuleNormalizer};

/// LOLRMM 노멀라이저
pub struct LolrmmNormalizer {
    ctx: RepositoryContext,
}

impl LolrmmNormalizer {
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }
}

impl RuleNormalizer for LolrmmNormalizer {
    fn vendor(&self) -> Vendor {
        Vendor::Lolrmm
    }

    fn normalize(&self, parsed: &ParsedRule) -> Result<NormalizedDetection, RulePipelineError> {
        let mut record = base_record(parsed, &self.ctx);

        record.rule_id = parsed.extra_str("id").map(|s| s.to_owned());

        let log_sources = parsed.log_source.flatten();
        let triple = classify(&TaxonomyHints {
            log_sources: &log_sources,
            product: parsed.log_source.product.as_deref(),
            category: parsed.log_source.category.as_deref(),
            service: parsed.log_source.service.as_deref(),
            ..Default::default()
        });

        record.data_sources = normalize_data_sources(&extract_data_sources(parsed));
        record.log_sources = log_sources;
        record.platform = triple.platform;
        record.event_category = triple.event_category;
        record.data_source_normalized = triple.data_source;

        record.detection_logic = match &parsed.detection_logic {
            DetectionLogic::Structured(value) => {
                serde_yaml::to_string(value).map_err(|e| RulePipelineError::Normalize {
                    file_path: parsed.file_path.clone(),
                    reason: format!("failed to render detection block: {e}"),
                })?
            }
            DetectionLogic::Query(query) => query.clone(),
            DetectionLogic::MachineLearning { job_id } => {
                format!("Machine Learning Job: {job_id}")
            }
        };
        record.language = QueryLanguage::Sigma;

        record.references = json_string_list(parsed.extra.get("references"));
        record.rule_created_date = parsed.extra_str("date").and_then(parse_date);
        record.rule_modified_date = parsed.extra_str("modified").and_then(parse_date);

        Ok(record)
    }
}

/// logsource에서 데이터 소스 토큰을 모으고 RMM 맥락을 보탭니다.
fn extract_data_sources(parsed: &ParsedRule) -> Vec<String> {
    let mut raw = Vec::new();
    let log_source = &parsed.log_source;

    if let Some(service) = &log_source.service {
        raw.push(service.to_lowercase());
    }
    if let Some(category) = &log_source.category {
        raw.push(category.to_lowercase());
    }
    if log_source.service.is_none() {
        match log_source.product.as_deref().map(str::to_lowercase).as_deref() {
            Some("windows") => raw.push("windows_event".to_owned()),
            Some("linux") => raw.push("linux".to_owned()),
            Some("macos") => raw.push("macos".to_owned()),
            _ => {}
        }
    }
    raw.push("rmm_tool".to_owned());

    raw
}
