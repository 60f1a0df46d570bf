//! Splunk Security Content 파서 (YAML)
//!
//! `detections/` 아래의 YAML 파일을 처리합니다. 심각도는 명시 필드가 아니라
//! RBA 리스크 점수 또는 impact/confidence 쌍에서 유도합니다.
//! 전술이 명시되지 않은 경우 기법 ID에서 최선-노력으로 추론합니다.

use std::collections::BTreeMap;

use rulewarden_core::types::{DetectionLogic, LogSourceHint, MitreHint, ParsedRule, Vendor};

use super::mitre_tags;
use super::{
    first_yaml_document, path_contains, path_excluded, path_has_extension, yaml_str,
    yaml_str_list, yaml_to_json, ParseOutcome, RuleParser,
};

/// 심각도 유도 임계값: 80 이상 critical, 60 이상 high, 40 이상 medium
fn severity_for_score(score: i64) -> &'static str {
    if score >= 80 {
        "critical"
    } else if score >= 60 {
        "high"
    } else if score >= 40 {
        "medium"
    } else {
        "low"
    }
}

/// 부모 기법 → 대표 전술 추론 테이블
///
/// 전술이 명시되지 않은 규칙을 위한 최선-노력 매핑입니다.
/// 서브 기법은 부모 기법 ID로 조회합니다.
const TECHNIQUE_TO_TACTIC: &[(&str, &str)] = &[
    // Execution
    ("T1059", "TA0002"),
    ("T1106", "TA0002"),
    ("T1053", "TA0002"),
    ("T1569", "TA0002"),
    ("T1204", "TA0002"),
    // Persistence
    ("T1547", "TA0003"),
    ("T1037", "TA0003"),
    ("T1098", "TA0003"),
    ("T1136", "TA0003"),
    ("T1543", "TA0003"),
    // Privilege Escalation
    ("T1548", "TA0004"),
    ("T1134", "TA0004"),
    // Defense Evasion
    ("T1140", "TA0005"),
    ("T1070", "TA0005"),
    ("T1036", "TA0005"),
    ("T1027", "TA0005"),
    ("T1562", "TA0005"),
    // Credential Access
    ("T1003", "TA0006"),
    ("T1555", "TA0006"),
    ("T1110", "TA0006"),
    ("T1558", "TA0006"),
    // Discovery
    ("T1087", "TA0007"),
    ("T1083", "TA0007"),
    ("T1057", "TA0007"),
    ("T1012", "TA0007"),
    ("T1018", "TA0007"),
    // Lateral Movement
    ("T1021", "TA0008"),
    ("T1570", "TA0008"),
    // Collection
    ("T1560", "TA0009"),
    ("T1005", "TA0009"),
    ("T1074", "TA0009"),
    // Command and Control
    ("T1071", "TA0011"),
    ("T1105", "TA0011"),
    ("T1572", "TA0011"),
    // Exfiltration
    ("T1041", "TA0010"),
    ("T1048", "TA0010"),
    // Impact
    ("T1486", "TA0040"),
    ("T1489", "TA0040"),
    ("T1490", "TA0040"),
];

/// 킬체인 단계 → 전술 ID 매핑 (Lockheed Martin 단계 + ATT&CK 이름 혼용)
const KILL_CHAIN_TO_TACTIC: &[(&str, &str)] = &[
    ("weaponization", "TA0042"),
    ("delivery", "TA0001"),
    ("exploitation", "TA0002"),
    ("installation", "TA0003"),
    ("actions on objectives", "TA0040"),
];

/// Splunk Security Content 탐지 규칙 파서
pub struct SplunkParser;

impl RuleParser for SplunkParser {
    fn vendor(&self) -> Vendor {
        Vendor::Splunk
    }

    fn can_parse(&self, path: &str) -> bool {
        path_has_extension(path, &[".yml", ".yaml"])
            && path_contains(path, "detections")
            && !path_excluded(path, &["deprecated", "tests", "test"])
    }

    fn parse(&self, path: &str, content: &str) -> Result<ParsedRule, ParseOutcome> {
        let data = first_yaml_document(content)?;

        if !data.is_mapping() {
            return Err(ParseOutcome::skipped("document is not a mapping"));
        }

        let Some(title) = yaml_str(&data, "name") else {
            return Err(ParseOutcome::skipped("missing required field: name"));
        };

        let Some(search) = yaml_str(&data, "search").filter(|s| !s.trim().is_empty()) else {
            return Err(ParseOutcome::skipped("missing required field: search"));
        };

        let empty = serde_yaml::Value::Null;
        let tags_map = data.get("tags").unwrap_or(&empty);
        let rba = data.get("rba").unwrap_or(&empty);

        let mitre = extract_mitre(tags_map);
        let severity = derive_severity(tags_map, rba);
        let log_source = determine_log_source(&data, tags_map);
        let tags = extract_tags(tags_map);

        let author = yaml_str(&data, "author").or_else(|| {
            let authors = yaml_str_list(data.get("author"));
            if authors.is_empty() {
                None
            } else {
                Some(authors.join(", "))
            }
        });

        let mut extra = BTreeMap::new();
        if let Some(id) = yaml_str(&data, "id") {
            extra.insert("id".to_owned(), serde_json::Value::String(id));
        }
        if let Some(rule_type) = yaml_str(&data, "type") {
            extra.insert("type".to_owned(), serde_json::Value::String(rule_type));
        }
        if let Some(data_source) = data.get("data_source") {
            extra.insert("data_source".to_owned(), yaml_to_json(data_source));
        }
        if let Some(references) = data.get("references") {
            extra.insert("references".to_owned(), yaml_to_json(references));
        }
        if let Some(date) = yaml_str(&data, "date") {
            extra.insert("date".to_owned(), serde_json::Value::String(date));
        }
        if let Some(how_to) = yaml_str(&data, "how_to_implement") {
            extra.insert("how_to_implement".to_owned(), serde_json::Value::String(how_to));
        }
        let cves = yaml_str_list(tags_map.get("cve"));
        if !cves.is_empty() {
            extra.insert(
                "cve".to_owned(),
                serde_json::Value::Array(cves.into_iter().map(serde_json::Value::String).collect()),
            );
        }

        Ok(ParsedRule {
            source: Vendor::Splunk,
            file_path: path.to_owned(),
            raw_content: content.to_owned(),
            title,
            detection_logic: DetectionLogic::Query(search),
            description: yaml_str(&data, "description"),
            author,
            status: yaml_str(&data, "status"),
            severity: Some(severity),
            log_source,
            tags,
            mitre,
            false_positives: yaml_str_list(data.get("known_false_positives")),
            extra,
        })
    }
}

/// `tags.mitre_attack_id`와 킬체인 단계에서 MITRE 정보를 추출합니다.
fn extract_mitre(tags: &serde_yaml::Value) -> MitreHint {
    let mut hint = MitreHint::default();

    for mitre_id in yaml_str_list(tags.get("mitre_attack_id")) {
        let upper = mitre_id.trim().to_uppercase();
        if upper.starts_with("TA") {
            hint.push_tactic(upper);
        } else if upper.starts_with('T') {
            hint.push_technique(upper);
        }
    }

    for phase in yaml_str_list(tags.get("kill_chain_phases")) {
        let lower = phase.to_lowercase();
        let tactic_id = KILL_CHAIN_TO_TACTIC
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, id)| *id)
            .or_else(|| mitre_tags::tactic_id_for_name(&lower));
        if let Some(id) = tactic_id {
            hint.push_tactic(id);
        }
    }

    // 전술이 비어 있으면 기법에서 최선-노력으로 보강
    let inferred: Vec<&str> = hint
        .techniques
        .iter()
        .filter_map(|tech| {
            let parent = tech.split('.').next().unwrap_or(tech);
            TECHNIQUE_TO_TACTIC
                .iter()
                .find(|(t, _)| *t == parent)
                .map(|(_, tactic)| *tactic)
        })
        .collect();
    for tactic in inferred {
        hint.push_tactic(tactic);
    }

    hint
}

/// RBA 리스크 점수 또는 impact/confidence 쌍에서 심각도를 유도합니다.
fn derive_severity(tags: &serde_yaml::Value, rba: &serde_yaml::Value) -> String {
    // 1순위: rba.risk_objects 최대 점수
    if let Some(objects) = rba.get("risk_objects").and_then(|v| v.as_sequence()) {
        let max_score = objects
            .iter()
            .filter_map(|o| o.get("score").and_then(|s| s.as_i64()))
            .max()
            .unwrap_or(0);
        if max_score > 0 {
            return severity_for_score(max_score).to_owned();
        }
    }

    // 2순위: impact/confidence 평균
    let impact = tags.get("impact").and_then(|v| v.as_i64());
    let confidence = tags.get("confidence").and_then(|v| v.as_i64());
    if let (Some(impact), Some(confidence)) = (impact, confidence) {
        return severity_for_score((impact + confidence) / 2).to_owned();
    }

    // 3순위: 명시적 risk_severity 태그
    if let Some(risk_severity) = tags.get("risk_severity").and_then(|v| v.as_str()) {
        return risk_severity.to_lowercase();
    }

    "unknown".to_owned()
}

/// analytic_story / asset_type / security_domain을 접두어가 붙은 태그로 변환합니다.
fn extract_tags(tags: &serde_yaml::Value) -> Vec<String> {
    let mut out = Vec::new();
    for story in yaml_str_list(tags.get("analytic_story")) {
        out.push(format!("story:{story}"));
    }
    for asset in yaml_str_list(tags.get("asset_type")) {
        out.push(format!("asset:{asset}"));
    }
    for domain in yaml_str_list(tags.get("security_domain")) {
        out.push(format!("domain:{domain}"));
    }
    out
}

/// data_source 목록과 asset_type에서 로그 소스를 결정합니다.
fn determine_log_source(data: &serde_yaml::Value, tags: &serde_yaml::Value) -> LogSourceHint {
    let mut hint = LogSourceHint {
        data_sources: yaml_str_list(data.get("data_source")),
        ..Default::default()
    };

    for asset in yaml_str_list(tags.get("asset_type")) {
        let lower = asset.to_lowercase();
        if lower.contains("endpoint") || lower.contains("windows") {
            hint.product = Some("windows".to_owned());
            break;
        } else if lower.contains("network") {
            hint.product = Some("network".to_owned());
            break;
        } else if lower.contains("cloud") || lower.contains("aws") {
            hint.product = Some("cloud".to_owned());
            break;
        }
    }

    hint
}
