//! Elastic protections-artifacts 행위 규칙 파서 (TOML)
//!
//! 엔드포인트 행위(behavior) 규칙으로, 최상위 `[rule]` 테이블과
//! `[[threat]]` 배열을 가집니다. 심각도는 명시 필드 대신 대응 액션
//! (프로세스 종료/차단 여부)에서 유도합니다.

use std::collections::BTreeMap;

use rulewarden_core::types::{DetectionLogic, LogSourceHint, ParsedRule, Vendor};

use super::elastic::extract_threat_mitre;
use super::{
    path_contains, path_excluded, path_has_extension, toml_str, toml_str_list, toml_to_json,
    ParseOutcome, RuleParser,
};

/// Elastic protections-artifacts 행위 규칙 파서
pub struct ElasticProtectionsParser;

impl RuleParser for ElasticProtectionsParser {
    fn vendor(&self) -> Vendor {
        Vendor::ElasticProtections
    }

    fn can_parse(&self, path: &str) -> bool {
        path_has_extension(path, &[".toml"])
            && path_contains(path, "behavior")
            && !path_excluded(path, &["deprecated", "tests", "test"])
    }

    fn parse(&self, path: &str, content: &str) -> Result<ParsedRule, ParseOutcome> {
        let data: toml::Value = content
            .parse()
            .map_err(|e| ParseOutcome::skipped(format!("TOML parse error: {e}")))?;

        let Some(rule) = data.get("rule") else {
            return Err(ParseOutcome::skipped("missing [rule] table"));
        };

        let Some(title) = toml_str(rule, "name") else {
            return Err(ParseOutcome::skipped("missing required field: rule.name"));
        };

        // 행위 규칙은 쿼리가 비어 있을 수 있음
        let query = toml_str(rule, "query").unwrap_or_default();

        let mitre = extract_threat_mitre(data.get("threat"));

        let os_list = toml_str_list(rule.get("os_list"));
        let log_source = determine_log_source(path, &os_list);

        let severity = derive_severity(data.get("actions"));

        let mut tags = vec!["behavior_rule".to_owned(), "endpoint_protection".to_owned()];
        for os_name in &os_list {
            tags.push(os_name.to_lowercase());
        }

        let mut extra = BTreeMap::new();
        if let Some(id) = toml_str(rule, "id") {
            extra.insert("id".to_owned(), serde_json::Value::String(id));
        }
        if let Some(version) = toml_str(rule, "version") {
            extra.insert("version".to_owned(), serde_json::Value::String(version));
        }
        if let Some(license) = toml_str(rule, "license") {
            extra.insert("license".to_owned(), serde_json::Value::String(license));
        }
        if let Some(min_version) = toml_str(rule, "min_endpoint_version") {
            extra.insert(
                "min_endpoint_version".to_owned(),
                serde_json::Value::String(min_version),
            );
        }
        if let Some(actions) = data.get("actions") {
            extra.insert("actions".to_owned(), toml_to_json(actions));
        }

        Ok(ParsedRule {
            source: Vendor::ElasticProtections,
            file_path: path.to_owned(),
            raw_content: content.to_owned(),
            title,
            detection_logic: DetectionLogic::Query(query),
            description: toml_str(rule, "description"),
            // 전체 코퍼스가 Elastic 단일 작성
            author: Some("Elastic".to_owned()),
            status: Some("stable".to_owned()),
            severity: Some(severity),
            log_source,
            tags,
            mitre,
            false_positives: Vec::new(),
            extra,
        })
    }
}

/// 파일 경로와 os_list에서 대상 플랫폼을 결정합니다.
fn determine_log_source(path: &str, os_list: &[String]) -> LogSourceHint {
    let path_lower = path.to_lowercase();
    let os_lower: Vec<String> = os_list.iter().map(|o| o.to_lowercase()).collect();

    let product = if path_lower.contains("windows") || os_lower.iter().any(|o| o == "windows") {
        "windows"
    } else if path_lower.contains("linux") || os_lower.iter().any(|o| o == "linux") {
        "linux"
    } else if path_lower.contains("macos") || os_lower.iter().any(|o| o == "macos") {
        "macos"
    } else if path_lower.contains("cross-platform") {
        "cross_platform"
    } else {
        "endpoint"
    };

    LogSourceHint {
        product: Some(product.to_owned()),
        category: Some("behavior".to_owned()),
        ..Default::default()
    }
}

/// 대응 액션에서 심각도를 유도합니다.
///
/// 프로세스 종료/차단 액션이 있으면 high, 그 외에는 medium입니다.
fn derive_severity(actions: Option<&toml::Value>) -> String {
    let Some(actions) = actions.and_then(|a| a.as_array()) else {
        return "medium".to_owned();
    };

    for action in actions {
        if let Some(kind) = toml_str(action, "action") {
            if kind == "terminate_process" || kind == "block" {
                return "high".to_owned();
            }
        }
    }

    "medium".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[rule]
description = "Identifies attempts to dump credentials from LSASS."
id = "c2e5a7b1-9999-4444-8888-123456789abc"
license = "Elastic License v2"
name = "Credential Access via LSASS Memory Dump"
os_list = ["windows"]
version = "1.0.35"
query = '''
process where event.action == "start" and process.name : "procdump.exe"
'''
min_endpoint_version = "7.15.0"

[[actions]]
action = "kill_process"
field = "process.entity_id"

[[threat]]
framework = "MITRE ATT&CK"

[[threat.technique]]
id = "T1003"
name = "OS Credential Dumping"

[[threat.technique.subtechnique]]
id = "T1003.001"
name = "LSASS Memory"

[threat.tactic]
id = "TA0006"
name = "Credential Access"
"#;

    #[test]
    fn can_parse_rule_paths() {
        let parser = ElasticProtectionsParser;
        assert!(parser.can_parse("behavior/rules/windows/credential_access_lsass.toml"));
        assert!(!parser.can_parse("behavior/rules/tests/x.toml"));
        assert!(!parser.can_parse("yara/rules/win.toml"));
        assert!(!parser.can_parse("behavior/rules/windows/x.yml"));
    }

    #[test]
    fn parse_full_rule() {
        let parser = ElasticProtectionsParser;
        let rule = parser
            .parse("behavior/rules/windows/lsass.toml", SAMPLE)
            .unwrap();
        assert_eq!(rule.title, "Credential Access via LSASS Memory Dump");
        assert_eq!(rule.author.as_deref(), Some("Elastic"));
        assert_eq!(rule.status.as_deref(), Some("stable"));
        // kill_process는 terminate/block이 아니므로 medium
        assert_eq!(rule.severity.as_deref(), Some("medium"));
        assert_eq!(rule.log_source.product.as_deref(), Some("windows"));
        assert_eq!(rule.log_source.category.as_deref(), Some("behavior"));
        assert_eq!(rule.mitre.tactics, vec!["TA0006"]);
        assert_eq!(rule.mitre.techniques, vec!["T1003", "T1003.001"]);
        assert!(rule.tags.contains(&"behavior_rule".to_owned()));
        assert!(rule.tags.contains(&"windows".to_owned()));
    }

    #[test]
    fn terminate_action_raises_severity() {
        let toml = r#"
[rule]
name = "Blocked Behavior"
query = "process where true"

[[actions]]
action = "terminate_process"
"#;
        let parser = ElasticProtectionsParser;
        let rule = parser.parse("behavior/rules/x.toml", toml).unwrap();
        assert_eq!(rule.severity.as_deref(), Some("high"));
    }

    #[test]
    fn empty_query_is_accepted() {
        let parser = ElasticProtectionsParser;
        let rule = parser
            .parse("behavior/rules/x.toml", "[rule]\nname = \"No Query\"\n")
            .unwrap();
        assert_eq!(rule.detection_logic, DetectionLogic::Query(String::new()));
    }

    #[test]
    fn missing_rule_table_is_skipped() {
        let parser = ElasticProtectionsParser;
        let result = parser.parse("behavior/rules/x.toml", "[metadata]\nfoo = 1\n");
        assert!(matches!(result, Err(ParseOutcome::Skipped { .. })));
    }

    #[test]
    fn cross_platform_from_path() {
        let hint = determine_log_source("behavior/rules/cross-platform/x.toml", &[]);
        assert_eq!(hint.product.as_deref(), Some("cross_platform"));
    }
}
