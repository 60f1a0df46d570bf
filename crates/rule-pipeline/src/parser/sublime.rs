//! Sublime Security 규칙 파서 (YAML)
//!
//! 이메일 보안 규칙으로, 탐지 로직은 `source` 필드의 MQL 쿼리입니다.
//! `tactics_and_techniques` 필드에 기법 ID와 전술 이름이 섞여 들어옵니다.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use rulewarden_core::types::{DetectionLogic, LogSourceHint, MitreHint, ParsedRule, Vendor};

use super::mitre_tags;
use super::{
    first_yaml_document, path_contains, path_excluded, path_has_extension, yaml_str,
    yaml_str_list, yaml_to_json, ParseOutcome, RuleParser,
};

/// 기법 ID 패턴 (T#### 또는 T####.###)
fn technique_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^t\d{4}(\.\d{3})?$").expect("valid technique pattern"))
}

/// Sublime Security 탐지 규칙 파서
pub struct SublimeParser;

impl RuleParser for SublimeParser {
    fn vendor(&self) -> Vendor {
        Vendor::Sublime
    }

    fn can_parse(&self, path: &str) -> bool {
        path_has_extension(path, &[".yml", ".yaml"])
            && path_contains(path, "detection-rules")
            && !path_excluded(path, &["tests", "test"])
    }

    fn parse(&self, path: &str, content: &str) -> Result<ParsedRule, ParseOutcome> {
        let data = first_yaml_document(content)?;

        if !data.is_mapping() {
            return Err(ParseOutcome::skipped("document is not a mapping"));
        }

        let Some(title) = yaml_str(&data, "name") else {
            return Err(ParseOutcome::skipped("missing required field: name"));
        };

        let Some(source_logic) = yaml_str(&data, "source").filter(|s| !s.trim().is_empty())
        else {
            return Err(ParseOutcome::skipped("missing required field: source"));
        };

        let mitre = extract_mitre(&data);

        // authors 목록의 첫 항목이 작성자 (문자열 또는 {name: ...} 매핑)
        let author = data
            .get("authors")
            .and_then(|a| a.as_sequence())
            .and_then(|seq| seq.first())
            .and_then(|first| {
                first
                    .as_str()
                    .map(|s| s.to_owned())
                    .or_else(|| yaml_str(first, "name"))
            });

        let mut extra = BTreeMap::new();
        if let Some(id) = yaml_str(&data, "id") {
            extra.insert("id".to_owned(), serde_json::Value::String(id));
        }
        if let Some(rule_type) = yaml_str(&data, "type") {
            extra.insert("type".to_owned(), serde_json::Value::String(rule_type));
        }
        if let Some(references) = data.get("references") {
            extra.insert("references".to_owned(), yaml_to_json(references));
        }
        for key in ["attack_types", "detection_methods"] {
            let values = yaml_str_list(data.get(key));
            if !values.is_empty() {
                extra.insert(
                    key.to_owned(),
                    serde_json::Value::Array(
                        values.into_iter().map(serde_json::Value::String).collect(),
                    ),
                );
            }
        }

        Ok(ParsedRule {
            source: Vendor::Sublime,
            file_path: path.to_owned(),
            raw_content: content.to_owned(),
            title,
            detection_logic: DetectionLogic::Query(source_logic),
            description: yaml_str(&data, "description"),
            author,
            // Sublime에는 상태 필드가 없음 — 게시된 규칙은 안정으로 간주
            status: Some("stable".to_owned()),
            severity: yaml_str(&data, "severity"),
            log_source: LogSourceHint {
                product: Some("email".to_owned()),
                category: Some("email_security".to_owned()),
                ..Default::default()
            },
            tags: yaml_str_list(data.get("tags")),
            mitre,
            false_positives: yaml_str_list(data.get("false_positives")),
            extra,
        })
    }
}

/// `tactics_and_techniques`에서 기법 ID와 전술 이름을 분리 추출합니다.
fn extract_mitre(data: &serde_yaml::Value) -> MitreHint {
    let mut hint = MitreHint::default();

    for item in yaml_str_list(data.get("tactics_and_techniques")) {
        let lower = item.trim().to_lowercase();
        if technique_id_pattern().is_match(&lower) {
            hint.push_technique(lower.to_uppercase());
        } else if let Some(id) = mitre_tags::tactic_id_for_name(&lower) {
            hint.push_tactic(id);
        }
    }

    hint
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: "Credential phishing: fake login page link"
description: Detects messages linking to credential harvesting pages.
type: rule
severity: high
authors:
  - name: Sublime Security
source: |
  type.inbound
  and any(body.links, .href_url.domain.domain in $free_file_hosts)
tactics_and_techniques:
  - "initial access"
  - "T1566.002"
attack_types:
  - "Credential Phishing"
detection_methods:
  - "URL analysis"
tags:
  - phishing
id: a1b2c3d4-0000-1111-2222-333344445555
"#;

    #[test]
    fn can_parse_rule_paths() {
        let parser = SublimeParser;
        assert!(parser.can_parse("detection-rules/phishing_link.yml"));
        assert!(!parser.can_parse("detection-rules/tests/t.yml"));
        assert!(!parser.can_parse("insights/phishing.yml"));
    }

    #[test]
    fn parse_full_rule() {
        let parser = SublimeParser;
        let rule = parser.parse("detection-rules/phish.yml", SAMPLE).unwrap();
        assert_eq!(rule.title, "Credential phishing: fake login page link");
        assert_eq!(rule.author.as_deref(), Some("Sublime Security"));
        assert_eq!(rule.status.as_deref(), Some("stable"));
        assert_eq!(rule.severity.as_deref(), Some("high"));
        assert_eq!(rule.mitre.tactics, vec!["TA0001"]);
        assert_eq!(rule.mitre.techniques, vec!["T1566.002"]);
        assert_eq!(rule.log_source.product.as_deref(), Some("email"));
        assert_eq!(rule.tags, vec!["phishing"]);
    }

    #[test]
    fn author_as_plain_string() {
        let parser = SublimeParser;
        let yaml = "name: X\nsource: type.inbound\nauthors:\n  - Jane Doe\n";
        let rule = parser.parse("detection-rules/x.yml", yaml).unwrap();
        assert_eq!(rule.author.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn missing_source_is_skipped() {
        let parser = SublimeParser;
        let result = parser.parse("detection-rules/x.yml", "name: No Source\n");
        match result {
            Err(ParseOutcome::Skipped { reason }) => assert!(reason.contains("source")),
            other => panic!("expected Skipped, got {other:?}"),
        }
    }

    #[test]
    fn technique_pattern_rejects_malformed_ids() {
        let yaml = "tactics_and_techniques:\n  - T999\n  - T12345\n  - T1566.02\n  - T1566\n";
        let data: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        let hint = extract_mitre(&data);
        assert_eq!(hint.techniques, vec!["T1566"]);
    }

    #[test]
    fn underscore_tactic_name_accepted() {
        let yaml = "tactics_and_techniques:\n  - initial_access\n";
        let data: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(extract_mitre(&data).tactics, vec!["TA0001"]);
    }
}
