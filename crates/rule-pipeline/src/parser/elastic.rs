//! Elastic detection-rules 파서 (TOML)
//!
//! `[metadata]`와 `[rule]` 테이블로 구성됩니다. 탐지 로직은 규칙 타입에
//! 따라 다른 필드에 있으며, ML 규칙은 쿼리 대신 job ID만 가집니다.
//! MITRE 정보는 `[[rule.threat]]` 배열에 네이티브로 들어 있습니다.

use std::collections::BTreeMap;

use rulewarden_core::types::{DetectionLogic, LogSourceHint, MitreHint, ParsedRule, Vendor};

use super::{
    path_contains, path_excluded, path_has_extension, toml_str, toml_str_list, toml_to_json,
    ParseOutcome, RuleParser,
};

/// Elastic detection-rules 파서
pub struct ElasticParser;

impl RuleParser for ElasticParser {
    fn vendor(&self) -> Vendor {
        Vendor::Elastic
    }

    fn can_parse(&self, path: &str) -> bool {
        path_has_extension(path, &[".toml"])
            && path_contains(path, "rules")
            && !path_excluded(
                path,
                &["_deprecated", "deprecated", "tests", "test", "_building_block"],
            )
    }

    fn parse(&self, path: &str, content: &str) -> Result<ParsedRule, ParseOutcome> {
        let data: toml::Value = content
            .parse()
            .map_err(|e| ParseOutcome::skipped(format!("TOML parse error: {e}")))?;

        let metadata = data.get("metadata");
        let Some(rule) = data.get("rule") else {
            return Err(ParseOutcome::skipped("missing [rule] table"));
        };

        let Some(title) = toml_str(rule, "name") else {
            return Err(ParseOutcome::skipped("missing required field: rule.name"));
        };

        let rule_type = toml_str(rule, "type").unwrap_or_default();
        let detection_logic = extract_detection_logic(rule, &rule_type)
            .ok_or_else(|| ParseOutcome::skipped("no detection logic"))?;

        let mitre = extract_threat_mitre(rule.get("threat"));

        let indices = toml_str_list(rule.get("index"));
        let log_source = LogSourceHint {
            product: infer_product_from_indices(&indices),
            indices: indices.clone(),
            ..Default::default()
        };

        let maturity = metadata.and_then(|m| toml_str(m, "maturity"));
        let status = Some(map_maturity(maturity.as_deref()));

        let author_list = toml_str_list(rule.get("author"));
        let author = if author_list.is_empty() {
            None
        } else {
            Some(author_list.join(", "))
        };

        let mut extra = BTreeMap::new();
        if let Some(rule_id) = toml_str(rule, "rule_id") {
            extra.insert("rule_id".to_owned(), serde_json::Value::String(rule_id));
        }
        if let Some(risk_score) = rule.get("risk_score").and_then(|v| v.as_integer()) {
            extra.insert("risk_score".to_owned(), serde_json::Value::from(risk_score));
        }
        if !rule_type.is_empty() {
            extra.insert("type".to_owned(), serde_json::Value::String(rule_type.clone()));
        }
        if !indices.is_empty() {
            extra.insert(
                "index".to_owned(),
                serde_json::Value::Array(
                    indices.iter().cloned().map(serde_json::Value::String).collect(),
                ),
            );
        }
        if let Some(language) = toml_str(rule, "language") {
            extra.insert("language".to_owned(), serde_json::Value::String(language));
        }
        if let Some(references) = rule.get("references") {
            extra.insert("references".to_owned(), toml_to_json(references));
        }
        if let Some(metadata) = metadata {
            if let Some(created) = toml_str(metadata, "creation_date") {
                extra.insert("creation_date".to_owned(), serde_json::Value::String(created));
            }
            if let Some(updated) = toml_str(metadata, "updated_date") {
                extra.insert("updated_date".to_owned(), serde_json::Value::String(updated));
            }
        }

        Ok(ParsedRule {
            source: Vendor::Elastic,
            file_path: path.to_owned(),
            raw_content: content.to_owned(),
            title,
            detection_logic,
            description: toml_str(rule, "description"),
            author,
            status,
            severity: toml_str(rule, "severity"),
            log_source,
            tags: toml_str_list(rule.get("tags")),
            mitre,
            false_positives: toml_str_list(rule.get("false_positives")),
            extra,
        })
    }
}

/// 규칙 타입별로 탐지 로직을 추출합니다.
///
/// query/eql/esql/threshold/new_terms는 쿼리 문자열을, machine_learning은
/// job ID를 갖습니다. 알 수 없는 타입이라도 query 필드가 있으면 사용합니다.
fn extract_detection_logic(rule: &toml::Value, rule_type: &str) -> Option<DetectionLogic> {
    if rule_type == "machine_learning" {
        let job_id = toml_str(rule, "machine_learning_job_id")
            .or_else(|| {
                // job ID가 배열인 규칙도 있음
                toml_str_list(rule.get("machine_learning_job_id"))
                    .first()
                    .cloned()
            })
            .unwrap_or_else(|| "unknown".to_owned());
        return Some(DetectionLogic::MachineLearning { job_id });
    }

    toml_str(rule, "query")
        .filter(|q| !q.trim().is_empty())
        .map(DetectionLogic::Query)
}

/// `[[rule.threat]]` 배열에서 MITRE 전술/기법을 추출합니다.
///
/// 각 threat 항목은 tactic 테이블 하나와 technique 배열을 가지며,
/// technique 아래 subtechnique 배열이 중첩될 수 있습니다.
pub(crate) fn extract_threat_mitre(threat: Option<&toml::Value>) -> MitreHint {
    let mut hint = MitreHint::default();

    let Some(threat_list) = threat.and_then(|t| t.as_array()) else {
        return hint;
    };

    for item in threat_list {
        if let Some(tactic_id) = item.get("tactic").and_then(|t| toml_str(t, "id")) {
            hint.push_tactic(tactic_id);
        }

        let Some(techniques) = item.get("technique").and_then(|t| t.as_array()) else {
            continue;
        };

        for technique in techniques {
            if let Some(id) = toml_str(technique, "id") {
                hint.push_technique(id);
            }
            if let Some(subs) = technique.get("subtechnique").and_then(|s| s.as_array()) {
                for sub in subs {
                    if let Some(id) = toml_str(sub, "id") {
                        hint.push_technique(id);
                    }
                }
            }
        }
    }

    hint
}

/// 인덱스 패턴에서 플랫폼 제품을 추정합니다.
fn infer_product_from_indices(indices: &[String]) -> Option<String> {
    for index in indices {
        let lower = index.to_lowercase();
        if lower.contains("windows") || lower.contains("winlogbeat") {
            return Some("windows".to_owned());
        }
        if lower.contains("linux") || lower.contains("auditbeat") {
            return Some("linux".to_owned());
        }
        if lower.contains("cloud")
            || lower.contains("aws")
            || lower.contains("gcp")
            || lower.contains("azure")
        {
            return Some("cloud".to_owned());
        }
    }
    None
}

/// Elastic maturity를 표준 상태 어휘로 매핑합니다.
fn map_maturity(maturity: Option<&str>) -> String {
    match maturity.map(|m| m.to_lowercase()).as_deref() {
        Some("production") => "stable",
        Some("development") => "experimental",
        Some("deprecated") => "deprecated",
        _ => "unknown",
    }
    .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[metadata]
creation_date = "2020/02/18"
updated_date = "2024/05/21"
maturity = "production"

[rule]
author = ["Elastic"]
description = "Identifies suspicious command execution."
index = ["winlogbeat-*", "logs-endpoint.events.*"]
language = "kuery"
name = "Suspicious Command Execution"
risk_score = 47
rule_id = "5a14080b-93d9-4c24-b2a4-1a9f3b1db0c9"
severity = "medium"
tags = ["Domain: Endpoint", "OS: Windows"]
type = "query"
query = "process.name : cmd.exe and process.args : /c"
references = ["https://attack.mitre.org/techniques/T1059/"]
false_positives = ["Build servers"]

[[rule.threat]]
framework = "MITRE ATT&CK"

[[rule.threat.technique]]
id = "T1059"
name = "Command and Scripting Interpreter"

[[rule.threat.technique.subtechnique]]
id = "T1059.003"
name = "Windows Command Shell"

[rule.threat.tactic]
id = "TA0002"
name = "Execution"
"#;

    #[test]
    fn can_parse_rule_paths() {
        let parser = ElasticParser;
        assert!(parser.can_parse("rules/windows/execution_cmd.toml"));
        assert!(!parser.can_parse("rules/windows/execution_cmd.yml"));
        assert!(!parser.can_parse("rules/_deprecated/old.toml"));
        assert!(!parser.can_parse("rules_building_block/bb.toml"));
        assert!(!parser.can_parse("hunting/windows/x.toml"));
    }

    #[test]
    fn parse_full_rule() {
        let parser = ElasticParser;
        let rule = parser.parse("rules/windows/cmd.toml", SAMPLE).unwrap();
        assert_eq!(rule.title, "Suspicious Command Execution");
        assert_eq!(rule.status.as_deref(), Some("stable"));
        assert_eq!(rule.severity.as_deref(), Some("medium"));
        assert_eq!(rule.author.as_deref(), Some("Elastic"));
        assert_eq!(rule.log_source.product.as_deref(), Some("windows"));
        assert_eq!(rule.log_source.indices.len(), 2);
        assert_eq!(rule.mitre.tactics, vec!["TA0002"]);
        assert_eq!(rule.mitre.techniques, vec!["T1059", "T1059.003"]);
        assert_eq!(rule.extra_str("language"), Some("kuery"));
        assert_eq!(rule.extra_str("creation_date"), Some("2020/02/18"));
        match &rule.detection_logic {
            DetectionLogic::Query(q) => assert!(q.contains("cmd.exe")),
            other => panic!("expected Query, got {other:?}"),
        }
    }

    #[test]
    fn missing_name_is_skipped() {
        let parser = ElasticParser;
        let toml = "[rule]\nquery = \"x\"\ntype = \"query\"\n";
        let result = parser.parse("rules/x.toml", toml);
        assert!(matches!(result, Err(ParseOutcome::Skipped { .. })));
    }

    #[test]
    fn missing_query_is_skipped() {
        let parser = ElasticParser;
        let toml = "[rule]\nname = \"No Query\"\ntype = \"query\"\n";
        let result = parser.parse("rules/x.toml", toml);
        match result {
            Err(ParseOutcome::Skipped { reason }) => {
                assert!(reason.contains("detection logic"));
            }
            other => panic!("expected Skipped, got {other:?}"),
        }
    }

    #[test]
    fn machine_learning_rule_has_job_id() {
        let parser = ElasticParser;
        let toml = r#"
[rule]
name = "Anomalous Process"
type = "machine_learning"
machine_learning_job_id = "v3_windows_anomalous_process"
anomaly_threshold = 50
"#;
        let rule = parser.parse("rules/ml/anomalous.toml", toml).unwrap();
        match &rule.detection_logic {
            DetectionLogic::MachineLearning { job_id } => {
                assert_eq!(job_id, "v3_windows_anomalous_process");
            }
            other => panic!("expected MachineLearning, got {other:?}"),
        }
    }

    #[test]
    fn malformed_toml_is_skipped() {
        let parser = ElasticParser;
        let result = parser.parse("rules/x.toml", "[rule\nname=");
        assert!(matches!(result, Err(ParseOutcome::Skipped { .. })));
    }

    #[test]
    fn maturity_mapping() {
        assert_eq!(map_maturity(Some("production")), "stable");
        assert_eq!(map_maturity(Some("Development")), "experimental");
        assert_eq!(map_maturity(Some("deprecated")), "deprecated");
        assert_eq!(map_maturity(Some("beta")), "unknown");
        assert_eq!(map_maturity(None), "unknown");
    }

    #[test]
    fn product_inference_from_indices() {
        assert_eq!(
            infer_product_from_indices(&["winlogbeat-*".to_owned()]).as_deref(),
            Some("windows")
        );
        assert_eq!(
            infer_product_from_indices(&["auditbeat-*".to_owned()]).as_deref(),
            Some("linux")
        );
        assert_eq!(
            infer_product_from_indices(&["filebeat-aws-*".to_owned()]).as_deref(),
            Some("cloud")
        );
        assert_eq!(infer_product_from_indices(&["logs-*".to_owned()]), None);
    }
}
