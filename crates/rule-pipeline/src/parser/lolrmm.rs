//! LOLRMM 규칙 파서 (Sigma 호환 YAML)
//!
//! LOLRMM 규칙은 인용되지 않은 와일드카드(`*.domain.com`)와 환경변수
//! (`%programdata%`)를 자주 포함해 엄격한 YAML 기준으로는 깨진 파일이
//! 많습니다. 구조화 파싱 전에 줄 단위 복구 패스로 해당 스칼라 값을
//! 인용 처리합니다. 블록 스칼라와 이미 인용된 값은 건드리지 않습니다.

use std::collections::BTreeMap;

use rulewarden_core::types::{DetectionLogic, LogSourceHint, ParsedRule, Vendor};

use super::mitre_tags;
use super::{
    first_yaml_document, path_contains, path_excluded, path_has_extension, yaml_str,
    yaml_str_list, yaml_to_json, ParseOutcome, RuleParser,
};

/// LOLRMM 탐지 규칙 파서
pub struct LolrmmParser;

impl RuleParser for LolrmmParser {
    fn vendor(&self) -> Vendor {
        Vendor::Lolrmm
    }

    fn can_parse(&self, path: &str) -> bool {
        path_has_extension(path, &[".yml", ".yaml"])
            && path_contains(path, "detections")
            && path_contains(path, "sigma")
            && !path_excluded(path, &["tests", "test"])
    }

    fn parse(&self, path: &str, content: &str) -> Result<ParsedRule, ParseOutcome> {
        let repaired = preprocess_yaml(content);
        let rule = first_yaml_document(&repaired)?;

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
        let mut plain_tags: Vec<String> = tags
            .into_iter()
            .filter(|t| !mitre_tags::is_mitre_tag(t))
            .collect();
        if !plain_tags.iter().any(|t| t.eq_ignore_ascii_case("lolrmm")) {
            plain_tags.push("lolrmm".to_owned());
        }

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
            source: Vendor::Lolrmm,
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

/// 깨진 YAML 복구 패스
///
/// `*`로 시작하거나 `%`를 포함하는 스칼라 값을 줄 단위로 큰따옴표 인용합니다.
/// 들여쓰기는 그대로 유지하고, 역슬래시는 이스케이프합니다.
/// 주석, 블록 스칼라(`|`, `>`), 이미 인용된 값은 건드리지 않습니다.
fn preprocess_yaml(content: &str) -> String {
    let mut result = Vec::with_capacity(content.lines().count());

    for line in content.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            result.push(line.to_owned());
            continue;
        }

        // key: value 형태 (매핑인 리스트 항목 "- key: value" 포함)
        if let Some(colon_idx) = line.find(':') {
            if !stripped.ends_with(':') {
                let (key_part, value_part) = line.split_at(colon_idx + 1);
                let value_stripped = value_part.trim();

                let already_safe = value_stripped.starts_with('"')
                    || value_stripped.starts_with('\'')
                    || value_stripped.starts_with('|')
                    || value_stripped.starts_with('>');

                if !already_safe && needs_quoting(value_stripped) {
                    let leading = value_part.len() - value_part.trim_start().len();
                    let escaped = value_stripped.replace('\\', "\\\\");
                    result.push(format!(
                        "{key_part}{}\"{escaped}\"",
                        " ".repeat(leading)
                    ));
                    continue;
                }
            }
        }

        // 리스트 항목: - value
        if let Some(item) = stripped.strip_prefix("- ") {
            let item = item.trim();
            let already_safe = item.starts_with('"') || item.starts_with('\'');
            if !already_safe && needs_quoting(item) {
                let indent = line.len() - line.trim_start().len();
                let escaped = item.replace('\\', "\\\\");
                result.push(format!("{}- \"{escaped}\"", " ".repeat(indent)));
                continue;
            }
        }

        result.push(line.to_owned());
    }

    result.join("\n")
}

/// `*` 시작(YAML 앨리어스로 오인) 또는 `%` 포함(환경변수) 값 여부
fn needs_quoting(value: &str) -> bool {
    !value.is_empty() && (value.starts_with('*') || value.contains('%'))
}
