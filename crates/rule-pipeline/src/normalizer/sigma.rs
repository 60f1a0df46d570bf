//! Sigma 규칙 노멀라이저
//!
//! 탐지 블록을 원본 규칙과 같은 YAML 형태로 렌더링하고,
//! logsource의 product/category/service를 분류기에 넘깁니다.

use rulewarden_core::types::{
    DetectionLogic, NormalizedDetection, ParsedRule, QueryLanguage, Vendor,
};

use crate::error::RulePipelineError;
use crate::taxonomy::{classify, TaxonomyHints};

use super::helpers::{
    base_record, json_string_list, normalize_data_sources, parse_date,
};
use super::{RepositoryContext, RuleNormalizer};

/// Sigma 규칙 노멀라이저
pub struct SigmaNormalizer {
    ctx: RepositoryContext,
}

impl SigmaNormalizer {
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }
}

impl RuleNormalizer for SigmaNormalizer {
    fn vendor(&self) -> Vendor {
        Vendor::Sigma
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

        record.detection_logic = render_detection_logic(parsed)?;
        record.language = QueryLanguage::Sigma;

        record.references = json_string_list(parsed.extra.get("references"));
        record.rule_created_date = parsed.extra_str("date").and_then(parse_date);
        record.rule_modified_date = parsed.extra_str("modified").and_then(parse_date);

        Ok(record)
    }
}

/// logsource에서 원문 데이터 소스 토큰을 뽑습니다.
///
/// service가 1순위, category가 2순위이며, service가 없을 때만
/// product 기본값(windows_event 등)을 보탭니다.
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

    raw
}

/// 탐지 블록을 YAML로 렌더링합니다.
fn render_detection_logic(parsed: &ParsedRule) -> Result<String, RulePipelineError> {
    match &parsed.detection_logic {
        DetectionLogic::Structured(value) => {
            serde_yaml::to_string(value).map_err(|e| RulePipelineError::Normalize {
                file_path: parsed.file_path.clone(),
                reason: format!("failed to render detection block: {e}"),
            })
        }
        DetectionLogic::Query(query) => Ok(query.clone()),
        DetectionLogic::MachineLearning { job_id } => {
            Ok(format!("Machine Learning Job: {job_id}"))
        }
    }
}
