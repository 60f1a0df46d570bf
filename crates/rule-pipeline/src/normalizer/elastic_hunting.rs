//! Elastic hunting 쿼리 노멀라이저
//!
//! 언어 목록의 첫 항목으로 쿼리 언어를 판별합니다 (기본 ES|QL).
//! 이벤트 카테고리가 탐지되지 않으면 hunting으로 표기합니다.

use rulewarden_core::types::{
    DetectionLogic, NormalizedDetection, ParsedRule, QueryLanguage, Vendor,
};

use crate::error::RulePipelineError;
use crate::taxonomy::{classify, TaxonomyHints};

use super::helpers::{base_record, normalize_data_sources};
use super::{RepositoryContext, RuleNormalizer};

/// Elastic hunting 쿼리 노멀라이저
pub struct ElasticHuntingNormalizer {
    ctx: RepositoryContext,
}

impl ElasticHuntingNormalizer {
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }
}

impl RuleNormalizer for ElasticHuntingNormalizer {
    fn vendor(&self) -> Vendor {
        Vendor::ElasticHunting
    }

    fn normalize(&self, parsed: &ParsedRule) -> Result<NormalizedDetection, RulePipelineError> {
        let mut record = base_record(parsed, &self.ctx);

        record.rule_id = parsed.extra_str("uuid").map(|s| s.to_owned());

        let log_sources = parsed.log_source.flatten();
        let triple = classify(&TaxonomyHints {
            log_sources: &log_sources,
            product: parsed.log_source.product.as_deref(),
            category: parsed.log_source.category.as_deref(),
            ..Default::default()
        });

        record.data_sources = normalize_data_sources(&extract_data_sources(parsed));
        record.log_sources = log_sources;
        record.platform = if triple.platform.is_empty() {
            // cross_platform/llm처럼 분류 테이블 밖의 product는 그대로 노출
            parsed
                .log_source
                .product
                .as_deref()
                .unwrap_or("")
                .to_lowercase()
        } else {
            triple.platform
        };
        record.event_category = if triple.event_category.is_empty() {
            "hunting".to_owned()
        } else {
            triple.event_category
        };
        record.data_source_normalized = if triple.data_source.is_empty() {
            data_source_from_integration(parsed)
        } else {
            triple.data_source
        };

        record.detection_logic = match &parsed.detection_logic {
            DetectionLogic::Query(query) if !query.trim().is_empty() => query.clone(),
            _ => "No detection logic available".to_owned(),
        };
        record.language = determine_language(parsed);

        record.references = Vec::new();
        record.rule_created_date = None;
        record.rule_modified_date = None;

        Ok(record)
    }
}

/// product와 integration에서 데이터 소스 토큰을 모읍니다.
fn extract_data_sources(parsed: &ParsedRule) -> Vec<String> {
    let mut raw = Vec::new();
    let product = parsed
        .log_source
        .product
        .as_deref()
        .unwrap_or("")
        .to_lowercase();

    match product.as_str() {
        "windows" => raw.extend(["windows_event".to_owned(), "endpoint".to_owned()]),
        "linux" => raw.extend(["linux".to_owned(), "endpoint".to_owned()]),
        "macos" => raw.extend(["macos".to_owned(), "endpoint".to_owned()]),
        "aws" => raw.extend(["aws".to_owned(), "cloud".to_owned()]),
        "azure" => raw.extend(["azure".to_owned(), "cloud".to_owned()]),
        "okta" => raw.extend(["okta".to_owned(), "identity".to_owned()]),
        "llm" => raw.extend(["llm".to_owned(), "application".to_owned()]),
        _ => raw.push("endpoint".to_owned()),
    }

    if let Some(integrations) = parsed.extra.get("integration").and_then(|v| v.as_array()) {
        for integration in integrations.iter().filter_map(|v| v.as_str()) {
            raw.push(integration.to_lowercase());
        }
    }
    raw.push("hunting_query".to_owned());

    raw
}

/// integration 필드에서 표준 데이터 소스를 추정합니다.
fn data_source_from_integration(parsed: &ParsedRule) -> String {
    const INTEGRATION_MAP: &[(&str, &str)] = &[
        ("okta", "okta"),
        ("aws", "cloudtrail"),
        ("azure", "azure"),
        ("windows", "windows_event"),
        ("linux", "linux"),
        ("macos", "macos"),
        ("endpoint", "endpoint"),
    ];

    if let Some(integrations) = parsed.extra.get("integration").and_then(|v| v.as_array()) {
        for integration in integrations.iter().filter_map(|v| v.as_str()) {
            let lower = integration.to_lowercase();
            for (needle, data_source) in INTEGRATION_MAP {
                if lower.contains(needle) {
                    return (*data_source).to_owned();
                }
            }
        }
    }

    "endpoint".to_owned()
}

/// 언어 목록의 첫 항목으로 쿼리 언어를 판별합니다.
fn determine_language(parsed: &ParsedRule) -> QueryLanguage {
    let first = parsed
        .extra
        .get("language")
        .and_then(|v| v.as_array())
        .and_then(|items| items.first())
        .and_then(|v| v.as_str())
        .unwrap_or("ES|QL");

    match first.to_lowercase().as_str() {
        "es|ql" | "esql" => QueryLanguage::Esql,
        "eql" => QueryLanguage::Eql,
        "kql" | "kuery" => QueryLanguage::Kql,
        "lucene" => QueryLanguage::Lucene,
        "sql" => QueryLanguage::Esql,
        _ => QueryLanguage::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ElasticHuntingParser, RuleParser};
    use rulewarden_core::types::{RuleSeverity, RuleStatus};

    fn ctx() -> RepositoryContext {
        RepositoryContext {
            vendor: Vendor::ElasticHunting,
            repo_url: "https://github.com/elastic/detection-rules.git".to_owned(),
            branch: "main".to_owned(),
        }
    }

    const SAMPLE: &str = r#"
[hunt]
author = "Elastic"
description = "Hunts for anomalous Okta sign-in bursts."
integration = ["okta"]
uuid = "aaaa1111-bbbb-2222-cccc-3333dddd4444"
name = "Okta Sign-In Burst"
language = ["ES|QL"]
license = "Elastic License v2"
mitre = ["T1078.004"]
query = ["from logs-okta* | stats c = count() by okta.actor.alternate_id"]
"#;

    fn normalized() -> NormalizedDetection {
        let parsed = ElasticHuntingParser
            .parse("hunting/okta/queries/burst.toml", SAMPLE)
            .unwrap();
        ElasticHuntingNormalizer::new(ctx()).normalize(&parsed).unwrap()
    }

    #[test]
    fn full_rule_normalizes() {
        let record = normalized();
        assert_eq!(record.source, "elastic_hunting");
        assert_eq!(record.status, RuleStatus::Stable);
        assert_eq!(record.severity, RuleSeverity::Medium);
        assert_eq!(record.language, QueryLanguage::Esql);
        assert_eq!(record.platform, "okta");
        assert_eq!(record.mitre_techniques, vec!["T1078.004"]);
        assert_eq!(
            record.rule_id.as_deref(),
            Some("aaaa1111-bbbb-2222-cccc-3333dddd4444")
        );
    }

    #[test]
    fn event_category_defaults_to_hunting() {
        let record = normalized();
        assert_eq!(record.event_category, "hunting");
    }

    #[test]
    fn data_source_from_integration_fallback() {
        let record = normalized();
        assert_eq!(record.data_source_normalized, "okta");
    }

    #[test]
    fn out_of_table_product_is_exposed_verbatim() {
        let toml = r#"
[hunt]
name = "LLM Prompt Abuse"
query = ["from logs-llm* | take 10"]
"#;
        let parsed = ElasticHuntingParser
            .parse("hunting/llm/queries/prompt.toml", toml)
            .unwrap();
        let record = ElasticHuntingNormalizer::new(ctx()).normalize(&parsed).unwrap();
        assert_eq!(record.platform, "llm");
    }

    #[test]
    fn language_variants() {
        let mut parsed = ElasticHuntingParser
            .parse("hunting/okta/queries/burst.toml", SAMPLE)
            .unwrap();

        parsed.extra.insert("language".to_owned(), serde_json::json!(["EQL"]));
        assert_eq!(determine_language(&parsed), QueryLanguage::Eql);

        parsed.extra.insert("language".to_owned(), serde_json::json!(["KQL"]));
        assert_eq!(determine_language(&parsed), QueryLanguage::Kql);

        parsed.extra.remove("language");
        assert_eq!(determine_language(&parsed), QueryLanguage::Esql);
    }
}
