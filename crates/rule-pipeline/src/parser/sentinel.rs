//! Microsoft Sentinel Analytics Rules 파서 (YAML)
//!
//! `Solutions/*/Analytic Rules/` 아래의 예약(Scheduled)/NRT 규칙만 처리합니다.
//! MITRE 정보는 `tactics`(CamelCase 이름)와 `relevantTechniques` 필드에
//! 네이티브로 들어 있습니다.

use std::collections::BTreeMap;

use rulewarden_core::types::{DetectionLogic, LogSourceHint, MitreHint, ParsedRule, Vendor};

use super::mitre_tags;
use super::{
    first_yaml_document, path_contains, path_excluded, path_has_extension, yaml_str,
    yaml_str_list, yaml_to_json, ParseOutcome, RuleParser,
};

/// Microsoft Sentinel Analytics 규칙 파서
pub struct SentinelParser;

impl RuleParser for SentinelParser {
    fn vendor(&self) -> Vendor {
        Vendor::Sentinel
    }

    fn can_parse(&self, path: &str) -> bool {
        path_has_extension(path, &[".yml", ".yaml"])
            && path_contains(path, "solutions")
            && path_contains(path, "analytic")
            && !path_excluded(path, &["tests", "deprecated", "test", ".git", "sample"])
    }

    fn parse(&self, path: &str, content: &str) -> Result<ParsedRule, ParseOutcome> {
        let data = first_yaml_document(content)?;

        if !data.is_mapping() {
            return Err(ParseOutcome::skipped("document is not a mapping"));
        }

        let Some(title) = yaml_str(&data, "name") else {
            return Err(ParseOutcome::skipped("missing required field: name"));
        };

        let Some(query) = yaml_str(&data, "query").filter(|q| !q.trim().is_empty()) else {
            return Err(ParseOutcome::skipped("missing required field: query"));
        };

        // Scheduled/NRT만 탐지 규칙, 그 외 kind는 헌팅 쿼리 등
        let kind = yaml_str(&data, "kind").unwrap_or_default();
        if !kind.is_empty() && !["scheduled", "nrt"].contains(&kind.to_lowercase().as_str()) {
            return Err(ParseOutcome::skipped(format!(
                "not a scheduled rule (kind={kind})"
            )));
        }

        let mitre = extract_mitre(&data);
        let (log_source, connector_ids) = extract_log_source(&data);

        let description = yaml_str(&data, "description").map(|d| d.trim().to_owned());

        let mut extra = BTreeMap::new();
        if let Some(id) = yaml_str(&data, "id") {
            extra.insert("id".to_owned(), serde_json::Value::String(id));
        }
        if !kind.is_empty() {
            extra.insert("kind".to_owned(), serde_json::Value::String(kind));
        }
        for key in [
            "version",
            "queryFrequency",
            "queryPeriod",
            "triggerOperator",
        ] {
            if let Some(value) = data.get(key) {
                extra.insert(key.to_owned(), yaml_to_json(value));
            }
        }
        if let Some(threshold) = data.get("triggerThreshold") {
            extra.insert("triggerThreshold".to_owned(), yaml_to_json(threshold));
        }
        if let Some(connectors) = data.get("requiredDataConnectors") {
            extra.insert("requiredDataConnectors".to_owned(), yaml_to_json(connectors));
        }
        if !connector_ids.is_empty() {
            extra.insert(
                "connectorIds".to_owned(),
                serde_json::Value::Array(
                    connector_ids.into_iter().map(serde_json::Value::String).collect(),
                ),
            );
        }
        if let Some(entities) = data.get("entityMappings") {
            extra.insert("entityMappings".to_owned(), yaml_to_json(entities));
        }

        Ok(ParsedRule {
            source: Vendor::Sentinel,
            file_path: path.to_owned(),
            raw_content: content.to_owned(),
            title,
            detection_logic: DetectionLogic::Query(query),
            description,
            author: Some("Microsoft".to_owned()),
            status: yaml_str(&data, "status"),
            severity: yaml_str(&data, "severity"),
            log_source,
            tags: yaml_str_list(data.get("tags")),
            mitre,
            false_positives: Vec::new(),
            extra,
        })
    }
}

/// `tactics`와 `relevantTechniques`에서 MITRE 정보를 추출합니다.
///
/// 전술 이름은 CamelCase(`DefenseEvasion`) 또는 공백 구분 형식이며,
/// 기법 ID는 대문자로 정규화하고 `T` 접두어를 강제합니다.
fn extract_mitre(data: &serde_yaml::Value) -> MitreHint {
    let mut hint = MitreHint::default();

    for tactic in yaml_str_list(data.get("tactics")) {
        if let Some(id) = mitre_tags::tactic_id_for_squashed_name(&tactic) {
            hint.push_tactic(id);
        }
    }

    for technique in yaml_str_list(data.get("relevantTechniques")) {
        let mut id = technique.trim().to_uppercase();
        if !id.starts_with('T') {
            id = format!("T{id}");
        }
        hint.push_technique(id);
    }

    hint
}

/// `requiredDataConnectors`에서 로그 소스와 커넥터 ID 목록을 추출합니다.
fn extract_log_source(data: &serde_yaml::Value) -> (LogSourceHint, Vec<String>) {
    let mut hint = LogSourceHint {
        product: Some("azure".to_owned()),
        category: Some("sentinel".to_owned()),
        ..Default::default()
    };

    let Some(connectors) = data.get("requiredDataConnectors").and_then(|c| c.as_sequence())
    else {
        return (hint, Vec::new());
    };

    let mut connector_ids = Vec::new();
    for connector in connectors {
        if let Some(id) = yaml_str(connector, "connectorId") {
            connector_ids.push(id);
        }
        for data_type in yaml_str_list(connector.get("dataTypes")) {
            if !hint.data_types.contains(&data_type) {
                hint.data_types.push(data_type);
            }
        }
    }

    let joined = connector_ids.join(" ").to_lowercase();
    if joined.contains("aws") {
        hint.product = Some("aws".to_owned());
    } else if joined.contains("gcp") || joined.contains("google") {
        hint.product = Some("gcp".to_owned());
    } else if joined.contains("office") || joined.contains("o365") {
        hint.product = Some("office365".to_owned());
    } else if joined.contains("azuread") || joined.contains("entra") {
        hint.product = Some("azure_ad".to_owned());
    } else if joined.contains("defender") {
        hint.product = Some("defender".to_owned());
    }

    (hint, connector_ids)
}
