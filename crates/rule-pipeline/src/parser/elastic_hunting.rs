//! Elastic hunting 쿼리 파서 (TOML)
//!
//! 탐지 규칙과 달리 `[hunt]` 테이블을 사용하며, 쿼리가 목록으로 들어옵니다.
//! MITRE는 기법 ID 평면 목록만 제공합니다 (전술은 정규화 단계에서
//! 리졸버가 유추할 수 있도록 비워 둡니다).

use std::collections::BTreeMap;

use rulewarden_core::types::{DetectionLogic, LogSourceHint, MitreHint, ParsedRule, Vendor};

use super::{
    path_contains, path_excluded, path_has_extension, toml_str, toml_str_list, toml_to_json,
    ParseOutcome, RuleParser,
};

/// 쿼리 목록을 하나의 표시용 블록으로 합칠 때 쓰는 구분자
const QUERY_SEPARATOR: &str = "\n\n---\n\n";

/// Elastic hunting 쿼리 파서
pub struct ElasticHuntingParser;

impl RuleParser for ElasticHuntingParser {
    fn vendor(&self) -> Vendor {
        Vendor::ElasticHunting
    }

    fn can_parse(&self, path: &str) -> bool {
        path_has_extension(path, &[".toml"])
            && path_contains(path, "hunting")
            && !path_excluded(path, &["deprecated", "tests", "test", ".git"])
    }

    fn parse(&self, path: &str, content: &str) -> Result<ParsedRule, ParseOutcome> {
        let data: toml::Value = content
            .parse()
            .map_err(|e| ParseOutcome::skipped(format!("TOML parse error: {e}")))?;

        let Some(hunt) = data.get("hunt") else {
            return Err(ParseOutcome::skipped("missing [hunt] table"));
        };

        let Some(title) = toml_str(hunt, "name") else {
            return Err(ParseOutcome::skipped("missing required field: hunt.name"));
        };

        let queries = toml_str_list(hunt.get("query"));
        let query = queries.join(QUERY_SEPARATOR);

        let mut mitre = MitreHint::default();
        for technique in toml_str_list(hunt.get("mitre")) {
            if technique.starts_with('T') {
                mitre.push_technique(technique);
            }
        }

        let integration = toml_str_list(hunt.get("integration"));
        let log_source = determine_log_source(path, &integration);

        let mut tags = vec!["hunting_query".to_owned(), "threat_hunting".to_owned()];
        for integ in &integration {
            tags.push(integ.to_lowercase());
        }

        // 설명에 노트를 덧붙임
        let notes = toml_str_list(hunt.get("notes"));
        let mut description = toml_str(hunt, "description").unwrap_or_default();
        if !notes.is_empty() {
            description.push_str("\n\nNotes:\n");
            for note in &notes {
                description.push_str(&format!("- {note}\n"));
            }
        }
        let description = if description.is_empty() {
            None
        } else {
            Some(description)
        };

        let languages = toml_str_list(hunt.get("language"));

        let mut extra = BTreeMap::new();
        if let Some(uuid) = toml_str(hunt, "uuid") {
            extra.insert("uuid".to_owned(), serde_json::Value::String(uuid));
        }
        if let Some(license) = toml_str(hunt, "license") {
            extra.insert("license".to_owned(), serde_json::Value::String(license));
        }
        if !integration.is_empty() {
            extra.insert(
                "integration".to_owned(),
                serde_json::Value::Array(
                    integration.iter().cloned().map(serde_json::Value::String).collect(),
                ),
            );
        }
        if !languages.is_empty() {
            extra.insert(
                "language".to_owned(),
                serde_json::Value::Array(
                    languages.into_iter().map(serde_json::Value::String).collect(),
                ),
            );
        }
        if let Some(notes_value) = hunt.get("notes") {
            extra.insert("notes".to_owned(), toml_to_json(notes_value));
        }

        Ok(ParsedRule {
            source: Vendor::ElasticHunting,
            file_path: path.to_owned(),
            raw_content: content.to_owned(),
            title,
            detection_logic: DetectionLogic::Query(query),
            description,
            author: Some(toml_str(hunt, "author").unwrap_or_else(|| "Elastic".to_owned())),
            // 메인 브랜치의 헌팅 쿼리는 안정, 사전 탐색 성격이므로 medium
            status: Some("stable".to_owned()),
            severity: Some("medium".to_owned()),
            log_source,
            tags,
            mitre,
            false_positives: Vec::new(),
            extra,
        })
    }
}

/// 파일 경로 세그먼트와 integration 필드에서 플랫폼을 결정합니다.
fn determine_log_source(path: &str, integration: &[String]) -> LogSourceHint {
    let path_lower = path.to_lowercase();

    let mut product = "endpoint";
    for candidate in [
        "windows",
        "linux",
        "macos",
        "aws",
        "azure",
        "okta",
        "llm",
        "cross-platform",
    ] {
        if path_lower.contains(&format!("/{candidate}/"))
            || path_lower.starts_with(&format!("{candidate}/"))
        {
            product = if candidate == "cross-platform" {
                "cross_platform"
            } else {
                candidate
            };
            break;
        }
    }

    let integ_lower: Vec<String> = integration.iter().map(|i| i.to_lowercase()).collect();
    if integ_lower.iter().any(|i| i.contains("okta")) {
        product = "okta";
    } else if integ_lower.iter().any(|i| i.contains("aws")) {
        product = "aws";
    } else if integ_lower.iter().any(|i| i.contains("azure")) {
        product = "azure";
    }

    LogSourceHint {
        product: Some(product.to_owned()),
        category: Some("hunting".to_owned()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[hunt]
author = "Elastic"
description = "Hunts for rare Okta session anomalies."
integration = ["okta"]
uuid = "d5a86a3b-1234-5678-9abc-def012345678"
name = "Rare Okta Session Anomalies"
language = ["ES|QL"]
license = "Elastic License v2"
notes = ["Review the user agent distribution.", "Pivot on session id."]
mitre = ["T1078.004"]
query = [
    "from logs-okta* | stats c = count() by okta.actor.id",
    "from logs-okta* | where okta.outcome.result == \"FAILURE\"",
]
"#;

    #[test]
    fn can_parse_rule_paths() {
        let parser = ElasticHuntingParser;
        assert!(parser.can_parse("hunting/okta/queries/rare_sessions.toml"));
        assert!(!parser.can_parse("hunting/okta/queries/rare_sessions.yml"));
        assert!(!parser.can_parse("rules/windows/x.toml"));
        assert!(!parser.can_parse("hunting/deprecated/x.toml"));
    }

    #[test]
    fn parse_full_rule() {
        let parser = ElasticHuntingParser;
        let rule = parser
            .parse("hunting/okta/queries/rare_sessions.toml", SAMPLE)
            .unwrap();
        assert_eq!(rule.title, "Rare Okta Session Anomalies");
        assert_eq!(rule.author.as_deref(), Some("Elastic"));
        assert_eq!(rule.status.as_deref(), Some("stable"));
        assert_eq!(rule.severity.as_deref(), Some("medium"));
        assert_eq!(rule.mitre.techniques, vec!["T1078.004"]);
        assert!(rule.mitre.tactics.is_empty());
        assert_eq!(rule.log_source.product.as_deref(), Some("okta"));
        assert!(rule.tags.contains(&"hunting_query".to_owned()));
        assert!(rule.tags.contains(&"okta".to_owned()));
        match &rule.detection_logic {
            DetectionLogic::Query(q) => {
                assert!(q.contains("---"));
                assert!(q.contains("FAILURE"));
            }
            other => panic!("expected Query, got {other:?}"),
        }
        let description = rule.description.unwrap();
        assert!(description.contains("Notes:"));
        assert!(description.contains("session id"));
    }

    #[test]
    fn missing_hunt_table_is_skipped() {
        let parser = ElasticHuntingParser;
        let result = parser.parse("hunting/x.toml", "[rule]\nname = \"x\"\n");
        assert!(matches!(result, Err(ParseOutcome::Skipped { .. })));
    }

    #[test]
    fn missing_name_is_skipped() {
        let parser = ElasticHuntingParser;
        let result = parser.parse("hunting/x.toml", "[hunt]\nquery = [\"q\"]\n");
        assert!(matches!(result, Err(ParseOutcome::Skipped { .. })));
    }

    #[test]
    fn platform_from_path_segment() {
        let hint = determine_log_source("hunting/windows/queries/x.toml", &[]);
        assert_eq!(hint.product.as_deref(), Some("windows"));

        let hint = determine_log_source("hunting/cross-platform/queries/x.toml", &[]);
        assert_eq!(hint.product.as_deref(), Some("cross_platform"));
    }

    #[test]
    fn integration_overrides_path() {
        let hint =
            determine_log_source("hunting/windows/queries/x.toml", &["aws_cloudtrail".to_owned()]);
        assert_eq!(hint.product.as_deref(), Some("aws"));
    }
}
