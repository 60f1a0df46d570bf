//! Microsoft Sentinel 노멀라이저
//!
//! KQL 쿼리를 그대로 표시용 로직으로 쓰고, 분류가 실패하면 커넥터
//! 정보로 플랫폼/데이터 소스를 보정합니다. Sentinel 규칙에는 참조와
//! 날짜 필드가 없습니다.

use rulewarden_core::types::{
    DetectionLogic, NormalizedDetection, ParsedRule, QueryLanguage, Vendor,
};

use crate::error::RulePipelineError;
use crate::taxonomy::{classify, TaxonomyHints};

use super::helpers::{base_record, normalize_data_sources};
use super::{RepositoryContext, RuleNormalizer};

/// Microsoft Sentinel 노멀라이저
pub struct SentinelNormalizer {
    ctx: RepositoryContext,
}

impl SentinelNormalizer {
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }
}

impl RuleNormalizer for SentinelNormalizer {
    fn vendor(&self) -> Vendor {
        Vendor::Sentinel
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

        let connector_ids = connector_ids(parsed);

        record.data_sources = normalize_data_sources(&extract_data_sources(parsed, &connector_ids));
        record.log_sources = log_sources;
        record.platform = if triple.platform.is_empty() {
            platform_from_connectors(&connector_ids)
        } else {
            triple.platform
        };
        record.event_category = if triple.event_category.is_empty() {
            "siem".to_owned()
        } else {
            triple.event_category
        };
        record.data_source_normalized = if triple.data_source.is_empty() {
            data_source_from_connectors(&connector_ids)
        } else {
            triple.data_source
        };

        record.detection_logic = match &parsed.detection_logic {
            DetectionLogic::Query(query) => query.clone(),
            other => format!("{other:?}"),
        };
        record.language = QueryLanguage::Kql;

        record.references = Vec::new();
        record.rule_created_date = None;
        record.rule_modified_date = None;

        Ok(record)
    }
}

/// extra에 저장된 커넥터 ID 목록 (소문자)
fn connector_ids(parsed: &ParsedRule) -> Vec<String> {
    parsed
        .extra
        .get("connectorIds")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

/// product / dataTypes / 커넥터 ID를 원문 데이터 소스 토큰으로 모읍니다.
fn extract_data_sources(parsed: &ParsedRule, connector_ids: &[String]) -> Vec<String> {
    let mut raw = Vec::new();

    if let Some(product) = &parsed.log_source.product {
        raw.push(product.clone());
    }
    for data_type in &parsed.log_source.data_types {
        raw.push(data_type.to_lowercase());
    }
    for connector in connector_ids {
        raw.push(connector.clone());
    }
    raw.push("sentinel".to_owned());

    raw
}

/// 커넥터 ID 문자열에서 플랫폼을 추정합니다.
fn platform_from_connectors(connector_ids: &[String]) -> String {
    let joined = connector_ids.join(" ");
    if joined.contains("aws") {
        "aws"
    } else if joined.contains("gcp") || joined.contains("google") {
        "gcp"
    } else if joined.contains("office") || joined.contains("o365") {
        "office365"
    } else if joined.contains("azuread") || joined.contains("entra") {
        "azure_ad"
    } else if joined.contains("windows") {
        "windows"
    } else if joined.contains("linux") {
        "linux"
    } else {
        "azure"
    }
    .to_owned()
}

/// 커넥터 ID에서 표준 데이터 소스를 추정합니다.
fn data_source_from_connectors(connector_ids: &[String]) -> String {
    const CONNECTOR_MAP: &[(&str, &str)] = &[
        ("aws", "cloudtrail"),
        ("azuread", "azure_ad"),
        ("office365", "office365"),
        ("defender", "defender"),
        ("securityevents", "windows_event"),
        ("syslog", "syslog"),
        ("windowsfirewall", "windows_firewall"),
        ("azureactivity", "azure_activity"),
    ];

    for connector in connector_ids {
        for (needle, data_source) in CONNECTOR_MAP {
            if connector.contains(needle) {
                return (*data_source).to_owned();
            }
        }
    }

    "sentinel".to_owned()
}
