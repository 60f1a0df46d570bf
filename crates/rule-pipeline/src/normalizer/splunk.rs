//! Splunk Security Content 노멀라이저
//!
//! SPL 검색문을 그대로 표시용 로직으로 쓰고, 검색문 내용에서
//! 데이터 소스 토큰을 추론합니다. 태그의 `story:`/`asset:` 접두어는
//! 저장 시 제거합니다.

use rulewarden_core::types::{
    DetectionLogic, NormalizedDetection, ParsedRule, QueryLanguage, Vendor,
};

use crate::error::RulePipelineError;
use crate::taxonomy::{classify, TaxonomyHints};

use super::helpers::{base_record, json_string_list, normalize_data_sources, parse_date};
use super::{RepositoryContext, RuleNormalizer};

/// Splunk Security Content 노멀라이저
pub struct SplunkNormalizer {
    ctx: RepositoryContext,
}

impl SplunkNormalizer {
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }
}

impl RuleNormalizer for SplunkNormalizer {
    fn vendor(&self) -> Vendor {
        Vendor::Splunk
    }

    fn normalize(&self, parsed: &ParsedRule) -> Result<NormalizedDetection, RulePipelineError> {
        let mut record = base_record(parsed, &self.ctx);

        record.rule_id = parsed.extra_str("id").map(|s| s.to_owned());

        let log_sources = extract_log_sources(parsed);
        let triple = classify(&TaxonomyHints {
            log_sources: &log_sources,
            product: parsed.log_source.product.as_deref(),
            ..Default::default()
        });

        record.data_sources = normalize_data_sources(&extract_data_sources(parsed));
        record.log_sources = log_sources;
        record.platform = triple.platform;
        record.event_category = triple.event_category;
        record.data_source_normalized = triple.data_source;

        record.detection_logic = match &parsed.detection_logic {
            DetectionLogic::Query(search) if !search.trim().is_empty() => search.clone(),
            _ => "No search query defined".to_owned(),
        };
        record.language = QueryLanguage::Spl;

        // story:/asset:/domain: 접두어는 값만 남긴다
        record.tags = parsed
            .tags
            .iter()
            .map(|tag| {
                let value = tag.split_once(':').map(|(_, v)| v).unwrap_or(tag);
                value.to_lowercase().replace(' ', "_")
            })
            .collect();

        record.references = json_string_list(parsed.extra.get("references"));
        record.rule_created_date = parsed.extra_str("date").and_then(parse_date);
        record.rule_modified_date = None;

        Ok(record)
    }
}

/// product와 data_source 목록에서 원문 로그 소스를 추출합니다.
fn extract_log_sources(parsed: &ParsedRule) -> Vec<String> {
    let mut sources = Vec::new();

    if let Some(product) = &parsed.log_source.product {
        sources.push(product.to_lowercase());
    }
    for data_source in &parsed.log_source.data_sources {
        let lower = data_source.to_lowercase();
        if !sources.contains(&lower) {
            sources.push(lower);
        }
    }

    sources
}

/// 명시적 data_source와 검색문 내용에서 데이터 소스 토큰을 추론합니다.
fn extract_data_sources(parsed: &ParsedRule) -> Vec<String> {
    let mut raw: Vec<String> = parsed.log_source.data_sources.clone();

    if let DetectionLogic::Query(search) = &parsed.detection_logic {
        let lower = search.to_lowercase();
        let mut push = |token: &str| {
            let token = token.to_owned();
            if !raw.contains(&token) {
                raw.push(token);
            }
        };

        if lower.contains("sysmon") {
            push("sysmon");
        }
        if lower.contains("wineventlog") {
            push("windows_event");
        }
        if lower.contains("security") && lower.contains("windows") {
            push("security_event");
        }
        if lower.contains("powershell") {
            push("powershell");
        }
        if lower.contains("registry") {
            push("registry");
        }
        if lower.contains("process") {
            push("process_creation");
        }
        if lower.contains("network") {
            push("network");
        }
        if lower.contains("dns") {
            push("dns");
        }
        if lower.contains("authentication") || lower.contains("logon") {
            push("authentication");
        }
        if lower.contains("cloudtrail") || lower.contains("aws") {
            push("aws");
        }
        if lower.contains("azure") {
            push("azure");
        }
        if lower.contains("gcp") || lower.contains("google") {
            push("gcp");
        }
    }

    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{RuleParser, SplunkParser};
    use rulewarden_core::types::RuleSeverity;

    fn ctx() -> RepositoryContext {
        RepositoryContext {
            vendor: Vendor::Splunk,
            repo_url: "https://github.com/splunk/security_content.git".to_owned(),
            branch: "develop".to_owned(),
        }
    }

    const SAMPLE: &str = r#"
name: Suspicious Process Creation via Office Document
id: aa000001-bbbb-cccc-dddd-eeeeffff0001
date: '2024-02-15'
author: Splunk Threat Research Team
status: production
type: TTP
description: Office application spawning a shell process.
data_source:
  - Sysmon EventID 1
search: '| tstats count from datamodel=Endpoint.Processes where Processes.parent_process_name=winword.exe Processes.process_name=cmd.exe'
known_false_positives: Macro-heavy business workflows.
references:
  - https://attack.mitre.org/techniques/T1566/001/
tags:
  analytic_story:
    - Spearphishing Attachments
  asset_type:
    - Endpoint
  security_domain: endpoint
  mitre_attack_id:
    - T1566.001
  impact: 70
  confidence: 80
"#;

    fn normalized() -> NormalizedDetection {
        let parsed = SplunkParser
            .parse("detections/endpoint/office_spawn.yml", SAMPLE)
            .unwrap();
        SplunkNormalizer::new(ctx()).normalize(&parsed).unwrap()
    }

    #[test]
    fn full_rule_normalizes() {
        let record = normalized();
        assert_eq!(record.source, "splunk");
        assert_eq!(record.language, QueryLanguage::Spl);
        // impact 70 / confidence 80 평균 75 → high
        assert_eq!(record.severity, RuleSeverity::High);
        assert_eq!(record.mitre_techniques, vec!["T1566.001"]);
        assert!(record.detection_logic.contains("winword.exe"));
        assert_eq!(record.platform, "windows");
    }

    #[test]
    fn tag_prefixes_are_stripped() {
        let record = normalized();
        assert!(record.tags.contains(&"spearphishing_attachments".to_owned()));
        assert!(record.tags.contains(&"endpoint".to_owned()));
        assert!(!record.tags.iter().any(|t| t.starts_with("story:")));
    }

    #[test]
    fn data_sources_inferred_from_search() {
        let record = normalized();
        assert!(record.data_sources.contains(&"Process Creation".to_owned()));
        assert!(record.data_sources.contains(&"Sysmon".to_owned()));
    }

    #[test]
    fn source_rule_url_uses_develop_branch() {
        let record = normalized();
        assert!(record
            .source_rule_url
            .as_deref()
            .unwrap()
            .contains("/blob/develop/"));
    }

    #[test]
    fn empty_search_gets_placeholder() {
        let mut parsed = SplunkParser
            .parse("detections/endpoint/x.yml", SAMPLE)
            .unwrap();
        parsed.detection_logic = DetectionLogic::Query("  ".to_owned());
        let record = SplunkNormalizer::new(ctx()).normalize(&parsed).unwrap();
        assert_eq!(record.detection_logic, "No search query defined");
    }

    #[test]
    fn created_date_parsed_no_modified() {
        let record = normalized();
        assert!(record.rule_created_date.is_some());
        assert!(record.rule_modified_date.is_none());
    }
}
