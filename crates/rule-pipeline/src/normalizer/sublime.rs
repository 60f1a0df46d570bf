//! Sublime Security 노멀라이저
//!
//! 이메일 도메인 규칙이므로 분류가 실패하면 플랫폼을 email 계열로
//! 기본 설정합니다. 탐지 로직은 MQL 쿼리 원문입니다.

use rulewarden_core::types::{
    DetectionLogic, NormalizedDetection, ParsedRule, QueryLanguage, Vendor,
};

use crate::error::RulePipelineError;
use crate::taxonomy::{classify, TaxonomyHints};

use super::helpers::{base_record, json_string_list, normalize_data_sources};
use super::{RepositoryContext, RuleNormalizer};

/// Sublime Security 노멀라이저
pub struct SublimeNormalizer {
    ctx: RepositoryContext,
}

impl SublimeNormalizer {
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }
}

impl RuleNormalizer for SublimeNormalizer {
    fn vendor(&self) -> Vendor {
        Vendor::Sublime
    }

    fn normalize(&self, parsed: &ParsedRule) -> Result<NormalizedDetection, RulePipelineError> {
        let mut record = base_record(parsed, &self.ctx);

        record.rule_id = parsed.extra_str("id").map(|s| s.to_owned());

        let log_sources = parsed.log_source.flatten();
        // 이메일 맥락을 보태 분류기에 전달
        let mut email_context = log_sources.clone();
        email_context.push("email".to_owned());
        email_context.push("email_security".to_owned());

        let triple = classify(&TaxonomyHints {
            log_sources: &email_context,
            ..Default::default()
        });

        record.data_sources = normalize_data_sources(&extract_data_sources(parsed));
        record.log_sources = log_sources;
        record.platform = if triple.platform.is_empty() {
            "email".to_owned()
        } else {
            triple.platform
        };
        record.event_category = if triple.event_category.is_empty() {
            "email".to_owned()
        } else {
            triple.event_category
        };
        record.data_source_normalized = if triple.data_source.is_empty() {
            "exchange".to_owned()
        } else {
            triple.data_source
        };

        record.detection_logic = match &parsed.detection_logic {
            DetectionLogic::Query(query) if !query.trim().is_empty() => query.clone(),
            _ => "No detection logic available".to_owned(),
        };
        record.language = QueryLanguage::Mql;

        record.references = json_string_list(parsed.extra.get("references"));
        record.rule_created_date = None;
        record.rule_modified_date = None;

        Ok(record)
    }
}

/// 탐지 방법과 공격 유형을 데이터 소스 토큰으로 모읍니다.
fn extract_data_sources(parsed: &ParsedRule) -> Vec<String> {
    let mut raw = vec!["email".to_owned()];

    for key in ["detection_methods", "attack_types"] {
        if let Some(values) = parsed.extra.get(key).and_then(|v| v.as_array()) {
            for value in values.iter().filter_map(|v| v.as_str()) {
                raw.push(value.to_owned());
            }
        }
    }

    raw
}
