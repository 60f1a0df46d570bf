//! SigmaHQ 규칙 파서 (YAML)
//!
//! Sigma 규칙은 멀티 도큐먼트 YAML일 수 있으며 첫 번째 도큐먼트만 사용합니다.
//! `title`과 `detection`이 없는 파일은 규칙이 아니므로 건너뜁니다.
//! MITRE 정보는 `attack.*` 태그 규약으로만 전달되므로 태그에서 디코딩하고,
//! 디코딩된 MITRE 태그는 일반 태그 목록에서 제거합니다.

use std::collections::BTreeMap;

use rulewarden_core::types::{DetectionLogic, LogSourceHint, ParsedRule, Vendor};

use super::mitre_tags;
use super::{
    first_yaml_document, path_contains, path_excluded, path_has_extension, yaml_str,
    yaml_str_list, yaml_to_json, ParseOutcome, RuleParser,
};

/// SigmaHQ 탐지 규칙 파서
pub struct SigmaParser;

impl RuleParser for SigmaParser {
    fn vendor(&self) -> Vendor {
        Vendor::Sigma
    }

    fn can_parse(&self, path: &str) -> bool {
        path_has_extension(path, &[".yml", ".yaml"])
            && path_contains(path, "rules")
            && !path_excluded(path, &["tests", "deprecated", "test"])
    }

    fn parse(&self, path: &str, content: &str) -> Result<ParsedRule, ParseOutcome> {
        let rule = first_yaml_document(content)?;

        if !rule.is_mapping() {
            return Err(ParseOutcome::skipped("document is not a mapping"));
        }

        let Some(title) = yaml_str(&rule, "title") else {
            return Err(ParseOutcome::skipped("missing required field: title"));
        };

        let Some(detection) = rule.get("detection").filter(|d| !d.is_null()) else {
            return Err(ParseOutcome::skipped("missing required field: detection"));
        };

        let logsource = rule.get("logsource");
        let log_source = LogSourceHint {
            product: logsource.and_then(|ls| yaml_str(ls, "product")),
            category: logsource.and_then(|ls| yaml_str(ls, "category")),
            service: logsource.and_then(|ls| yaml_str(ls, "service")),
            ..Default::default()
        };

        let tags = yaml_str_list(rule.get("tags"));
        let mitre = mitre_tags::extract_from_sigma_tags(&tags);
        let plain_tags: Vec<String> = tags
            .into_iter()
            .filter(|t| !mitre_tags::is_mitre_tag(t))
            .collect();

        let mut extra = BTreeMap::new();
        if let Some(id) = yaml_str(&rule, "id") {
            extra.insert("id".to_owned(), serde_json::Value::String(id));
        }
        if let Some(references) = rule.get("references") {
            extra.insert("references".to_owned(), yaml_to_json(references));
        }
        if let Some(date) = yaml_str(&rule, "date") {
            extra.insert("date".to_owned(), serde_json::Value::String(date));
        }
        if let Some(modified) = yaml_str(&rule, "modified") {
            extra.insert("modified".to_owned(), serde_json::Value::String(modified));
        }

        Ok(ParsedRule {
            source: Vendor::Sigma,
            file_path: path.to_owned(),
            raw_content: content.to_owned(),
            title,
            detection_logic: DetectionLogic::Structured(detection.clone()),
            description: yaml_str(&rule, "description"),
            author: yaml_str(&rule, "author"),
            status: yaml_str(&rule, "status"),
            severity: yaml_str(&rule, "level"),
            log_source,
            tags: plain_tags,
            mitre,
            false_positives: yaml_str_list(rule.get("falsepositives")),
            extra,
        })
    }
}
