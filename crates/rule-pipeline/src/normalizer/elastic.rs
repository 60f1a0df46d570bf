//! Elastic detection-rules 노멀라이저
//!
//! 인덱스 패턴에서 로그/데이터 소스를 추출하고, 규칙 타입과 language
//! 필드 조합으로 쿼리 언어(kql/lucene/eql/esql/ml/threat_match)를
//! 판별합니다.

use rulewarden_core::types::{
    DetectionLogic, NormalizedDetection, ParsedRule, QueryLanguage, Vendor,
};

use crate::error::RulePipelineError;
use crate::taxonomy::{classify, TaxonomyHints};

use super::helpers::{base_record, json_string_list, normalize_data_sources, parse_date};
use super::{RepositoryContext, RuleNormalizer};

/// Elastic detection-rules 노멀라이저
pub struct ElasticNormalizer {
    ctx: RepositoryContext,
}

impl ElasticNormalizer {
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }
}

impl RuleNormalizer for ElasticNormalizer {
    fn vendor(&self) -> Vendor {
        Vendor::Elastic
    }

    fn normalize(&self, parsed: &ParsedRule) -> Result<NormalizedDetection, RulePipelineError> {
        let mut record = base_record(parsed, &self.ctx);

        record.rule_id = parsed.extra_str("rule_id").map(|s| s.to_owned());

        let log_sources = extract_log_sources(parsed);
        let triple = classify(&TaxonomyHints {
            log_sources: &log_sources,
            index_patterns: &parsed.log_source.indices,
            ..Default::default()
        });

        record.data_sources = normalize_data_sources(&extract_data_sources(parsed));
        record.log_sources = log_sources;
        record.platform = triple.platform;
        record.event_category = triple.event_category;
        record.data_source_normalized = triple.data_source;

        record.detection_logic = render_detection_logic(&parsed.detection_logic);
        record.language = determine_language(parsed);

        record.tags = parsed
            .tags
            .iter()
            .map(|t| t.to_lowercase().replace(' ', "_"))
            .collect();
        record.references = json_string_list(parsed.extra.get("references"));
        record.rule_created_date = parsed.extra_str("creation_date").and_then(parse_date);
        record.rule_modified_date = parsed.extra_str("updated_date").and_then(parse_date);

        Ok(record)
    }
}

/// 인덱스 패턴과 product 힌트에서 원문 로그 소스를 추출합니다.
fn extract_log_sources(parsed: &ParsedRule) -> Vec<String> {
    let mut sources = Vec::new();
    let mut push = |value: &str| {
        let value = value.to_owned();
        if !sources.contains(&value) {
            sources.push(value);
        }
    };

    if let Some(product) = &parsed.log_source.product {
        push(&product.to_lowercase());
    }

    for index in &parsed.log_source.indices {
        let lower = index.to_lowercase();
        if lower.contains("winlogbeat") {
            push("windows");
        } else if lower.contains("auditbeat") {
            push("auditbeat");
        } else if lower.contains("filebeat") {
            push("filebeat");
        } else if lower.contains("packetbeat") {
            push("network");
        } else if lower.contains("logs-endpoint") {
            push("endpoint");
        }
    }

    sources
}

/// 인덱스 패턴에서 구체적인 데이터 소스 토큰을 뽑습니다.
fn extract_data_sources(parsed: &ParsedRule) -> Vec<String> {
    const INDEX_HINTS: &[(&str, &str)] = &[
        ("sysmon", "sysmon"),
        ("security", "security_event"),
        ("powershell", "powershell"),
        ("endpoint", "endpoint"),
        ("winlogbeat", "windows_event"),
        ("auditbeat", "auditd"),
        ("filebeat", "file_monitoring"),
        ("packetbeat", "network"),
        ("cloudtrail", "aws"),
        ("aws", "aws"),
        ("azure", "azure"),
        ("gcp", "gcp"),
        ("o365", "o365"),
        ("office365", "o365"),
        ("okta", "okta"),
        ("github", "github"),
    ];

    let mut raw = Vec::new();
    for index in &parsed.log_source.indices {
        let lower = index.to_lowercase();
        for (needle, token) in INDEX_HINTS {
            if lower.contains(needle) && !raw.contains(&(*token).to_owned()) {
                raw.push((*token).to_owned());
            }
        }
    }

    if let Some(product) = &parsed.log_source.product {
        raw.push(product.clone());
    }

    raw
}

/// 탐지 로직을 표시용 문자열로 렌더링합니다.
fn render_detection_logic(logic: &DetectionLogic) -> String {
    match logic {
        DetectionLogic::Query(query) => query.clone(),
        DetectionLogic::MachineLearning { job_id } => {
            format!("Machine Learning Job: {job_id}")
        }
        DetectionLogic::Structured(value) => {
            serde_yaml::to_string(value).unwrap_or_default()
        }
    }
}

/// 규칙 타입과 language 필드에서 쿼리 언어를 판별합니다.
///
/// query/threshold/new_terms 타입은 language 필드로 KQL과 Lucene을
/// 구분하며, 미지정 시 KQL이 기본입니다.
fn determine_language(parsed: &ParsedRule) -> QueryLanguage {
    if matches!(parsed.detection_logic, DetectionLogic::MachineLearning { .. }) {
        return QueryLanguage::Ml;
    }

    let rule_type = parsed.extra_str("type").unwrap_or("").to_lowercase();
    match rule_type.as_str() {
        "eql" => QueryLanguage::Eql,
        "esql" => QueryLanguage::Esql,
        "machine_learning" => QueryLanguage::Ml,
        "threat_match" => QueryLanguage::ThreatMatch,
        "query" | "threshold" | "new_terms" => {
            match parsed.extra_str("language").unwrap_or("").to_lowercase().as_str() {
                "lucene" => QueryLanguage::Lucene,
                "eql" => QueryLanguage::Eql,
                "esql" => QueryLanguage::Esql,
                // kuery 또는 미지정은 KQL
                _ => QueryLanguage::Kql,
            }
        }
        _ => QueryLanguage::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ElasticParser, RuleParser};
    use rulewarden_core::types::{RuleSeverity, RuleStatus};

    fn ctx() -> RepositoryContext {
        RepositoryContext {
            vendor: Vendor::Elastic,
            repo_url: "https://github.com/elastic/detection-rules.git".to_owned(),
            branch: "main".to_owned(),
        }
    }

    const SAMPLE: &str = r#"
[metadata]
creation_date = "2021/01/04"
updated_date = "2024/09/12"
maturity = "production"

[rule]
author = ["Elastic"]
description = "Detects PsExec lateral movement."
index = ["winlogbeat-*", "logs-windows.sysmon_operational-*"]
language = "kuery"
name = "PsExec Network Connection"
risk_score = 21
rule_id = "55d551c6-333b-4665-ab7e-5d14a59715ce"
severity = "low"
tags = ["Domain: Endpoint", "OS: Windows"]
type = "query"
query = "process.name : PsExec.exe and event.type : start"
references = ["https://learn.microsoft.com/sysinternals"]

[[rule.threat]]
framework = "MITRE ATT&CK"

[[rule.threat.technique]]
id = "T1021"
name = "Remote Services"

[rule.threat.tactic]
id = "TA0008"
name = "Lateral Movement"
"#;

    fn normalized() -> NormalizedDetection {
        let parsed = ElasticParser.parse("rules/windows/psexec.toml", SAMPLE).unwrap();
        ElasticNormalizer::new(ctx()).normalize(&parsed).unwrap()
    }

    #[test]
    fn full_rule_normalizes() {
        let record = normalized();
        assert_eq!(record.source, "elastic");
        assert_eq!(record.status, RuleStatus::Stable);
        assert_eq!(record.severity, RuleSeverity::Low);
        assert_eq!(record.language, QueryLanguage::Kql);
        assert_eq!(record.platform, "windows");
        assert_eq!(record.mitre_tactics, vec!["TA0008"]);
        assert_eq!(record.mitre_techniques, vec!["T1021"]);
        assert!(record.detection_logic.contains("PsExec.exe"));
    }

    #[test]
    fn tags_are_lowercased_with_underscores() {
        let record = normalized();
        assert_eq!(record.tags, vec!["domain:_endpoint", "os:_windows"]);
    }

    #[test]
    fn data_sources_from_index_patterns() {
        let record = normalized();
        assert!(record.data_sources.contains(&"Windows Event Log".to_owned()));
        assert!(record.data_sources.contains(&"Sysmon".to_owned()));
    }

    #[test]
    fn dates_from_metadata() {
        let record = normalized();
        assert_eq!(
            record.rule_created_date.unwrap().format("%Y-%m-%d").to_string(),
            "2021-01-04"
        );
        assert_eq!(
            record.rule_modified_date.unwrap().format("%Y-%m-%d").to_string(),
            "2024-09-12"
        );
    }

    #[test]
    fn language_variants() {
        let mut parsed = ElasticParser.parse("rules/x.toml", SAMPLE).unwrap();

        parsed.extra.insert("type".to_owned(), serde_json::json!("eql"));
        assert_eq!(determine_language(&parsed), QueryLanguage::Eql);

        parsed.extra.insert("type".to_owned(), serde_json::json!("esql"));
        assert_eq!(determine_language(&parsed), QueryLanguage::Esql);

        parsed.extra.insert("type".to_owned(), serde_json::json!("threat_match"));
        assert_eq!(determine_language(&parsed), QueryLanguage::ThreatMatch);

        parsed.extra.insert("type".to_owned(), serde_json::json!("query"));
        parsed.extra.insert("language".to_owned(), serde_json::json!("lucene"));
        assert_eq!(determine_language(&parsed), QueryLanguage::Lucene);

        parsed.extra.insert("type".to_owned(), serde_json::json!("threshold"));
        parsed.extra.remove("language");
        assert_eq!(determine_language(&parsed), QueryLanguage::Kql);
    }

    #[test]
    fn ml_rule_language_and_placeholder() {
        let toml = r#"
[rule]
name = "Anomalous Login"
type = "machine_learning"
machine_learning_job_id = "auth_rare_user"
"#;
        let parsed = ElasticParser.parse("rules/ml/x.toml", toml).unwrap();
        let record = ElasticNormalizer::new(ctx()).normalize(&parsed).unwrap();
        assert_eq!(record.language, QueryLanguage::Ml);
        assert_eq!(record.detection_logic, "Machine Learning Job: auth_rare_user");
    }
}
