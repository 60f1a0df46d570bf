//! 규칙 파싱 모듈 — 벤더 방언별 파서 및 레지스트리
//!
//! 각 파서는 [`RuleParser`] trait을 구현하며 [`ParserRegistry`]에
//! 벤더 키로 등록됩니다. 파서는 예상 가능한 불량 입력(제목 누락, 깨진
//! 문법)에 대해 절대 panic하지 않고 [`ParseOutcome::Skipped`]를 반환합니다.
//!
//! # 지원 방언
//! - YAML: sigma, splunk, sentinel, sublime, lolrmm
//! - TOML: elastic, elastic_protections, elastic_hunting

pub mod elastic;
pub mod elastic_hunting;
pub mod elastic_protections;
pub mod lolrmm;
pub mod mitre_tags;
pub mod sentinel;
pub mod sigma;
pub mod splunk;
pub mod sublime;

use std::collections::HashMap;

use rulewarden_core::types::{ParsedRule, Vendor};

pub use elastic::ElasticParser;
pub use elastic_hunting::ElasticHuntingParser;
pub use elastic_protections::ElasticProtectionsParser;
pub use lolrmm::LolrmmParser;
pub use sentinel::SentinelParser;
pub use sigma::SigmaParser;
pub use splunk::SplunkParser;
pub use sublime::SublimeParser;

/// 파싱 거부/실패 결과
///
/// 오케스트레이터는 `Skipped`를 WARNING으로, `Failed`를 ERROR로 기록합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// 예상된 거부 — 필수 필드 누락, 문법 오류, 규칙이 아닌 파일
    Skipped {
        /// 거부 사유 (운영자용 메시지)
        reason: String,
    },
    /// 예기치 않은 내부 실패
    Failed {
        /// 실패 사유
        message: String,
    },
}

impl ParseOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// 탐지 규칙 파서 trait
///
/// 새로운 벤더 방언을 지원하려면 이 trait을 구현하고
/// [`ParserRegistry`]에 등록합니다.
pub trait RuleParser: Send + Sync {
    /// 이 파서가 담당하는 벤더
    fn vendor(&self) -> Vendor;

    /// 경로 패턴만으로 이 파서가 처리할 파일인지 빠르게 판별합니다.
    ///
    /// 파일 내용을 읽기 전에 호출되는 순수 술어이며,
    /// 확장자 / 포함 디렉토리 / 제외 디렉토리 규칙만 봅니다.
    fn can_parse(&self, path: &str) -> bool;

    /// 파일 내용을 중간 표현으로 파싱합니다.
    ///
    /// 제목이 없거나 탐지 본문이 없는 파일은 규칙이 아니므로
    /// `Skipped`를 반환합니다. 절대 panic하지 않습니다.
    fn parse(&self, path: &str, content: &str) -> Result<ParsedRule, ParseOutcome>;
}

/// 파서 레지스트리 — 벤더 이름으로 파서를 찾습니다.
pub struct ParserRegistry {
    parsers: HashMap<Vendor, Box<dyn RuleParser>>,
}

impl ParserRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// 8개 벤더 파서가 모두 등록된 레지스트리를 생성합니다.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SigmaParser));
        registry.register(Box::new(ElasticParser));
        registry.register(Box::new(SplunkParser));
        registry.register(Box::new(SentinelParser));
        registry.register(Box::new(SublimeParser));
        registry.register(Box::new(ElasticProtectionsParser));
        registry.register(Box::new(ElasticHuntingParser));
        registry.register(Box::new(LolrmmParser));
        registry
    }

    /// 파서를 등록합니다. 같은 벤더가 이미 있으면 교체됩니다.
    pub fn register(&mut self, parser: Box<dyn RuleParser>) {
        self.parsers.insert(parser.vendor(), parser);
    }

    /// 벤더로 파서를 찾습니다.
    pub fn get(&self, vendor: Vendor) -> Option<&dyn RuleParser> {
        self.parsers.get(&vendor).map(|p| p.as_ref())
    }

    /// 등록된 벤더 목록을 반환합니다.
    pub fn vendors(&self) -> Vec<Vendor> {
        self.parsers.keys().copied().collect()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// --- 경로 술어 헬퍼 ---

/// 경로가 주어진 확장자 중 하나로 끝나는지 확인합니다 (소문자 비교).
pub(crate) fn path_has_extension(path: &str, extensions: &[&str]) -> bool {
    let lower = path.to_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext))
}

/// 경로에 토큰이 포함되는지 확인합니다 (소문자 비교).
pub(crate) fn path_contains(path: &str, token: &str) -> bool {
    path.to_lowercase().contains(token)
}

/// 경로에 제외 토큰이 하나라도 포함되는지 확인합니다.
pub(crate) fn path_excluded(path: &str, excluded: &[&str]) -> bool {
    let lower = path.to_lowercase();
    excluded.iter().any(|ex| lower.contains(ex))
}

// --- YAML 접근 헬퍼 ---

/// YAML 값에서 문자열 필드를 꺼냅니다.
pub(crate) fn yaml_str(value: &serde_yaml::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_owned())
}

/// YAML 값을 문자열 목록으로 정규화합니다.
///
/// 문자열 하나는 단일 원소 목록으로, 시퀀스는 문자열 원소만 모아서 반환합니다.
pub(crate) fn yaml_str_list(value: Option<&serde_yaml::Value>) -> Vec<String> {
    match value {
        Some(serde_yaml::Value::String(s)) => {
            if s.trim().is_empty() {
                Vec::new()
            } else {
                vec![s.clone()]
            }
        }
        Some(serde_yaml::Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_owned())
            .collect(),
        _ => Vec::new(),
    }
}

/// 멀티 도큐먼트 YAML에서 첫 번째 도큐먼트를 파싱합니다.
pub(crate) fn first_yaml_document(content: &str) -> Result<serde_yaml::Value, ParseOutcome> {
    use serde::Deserialize;

    let mut documents = serde_yaml::Deserializer::from_str(content);
    match documents.next() {
        Some(document) => serde_yaml::Value::deserialize(document)
            .map_err(|e| ParseOutcome::skipped(format!("YAML parse error: {e}"))),
        None => Err(ParseOutcome::skipped("empty YAML document")),
    }
}

/// YAML 값을 extra 가방용 JSON 값으로 변환합니다.
///
/// 문자열이 아닌 매핑 키는 문자열로 강제합니다.
pub(crate) fn yaml_to_json(value: &serde_yaml::Value) -> serde_json::Value {
    match value {
        serde_yaml::Value::Null => serde_json::Value::Null,
        serde_yaml::Value::Bool(b) => serde_json::Value::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            } else {
                serde_json::Value::Null
            }
        }
        serde_yaml::Value::String(s) => serde_json::Value::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => {
            serde_json::Value::Array(seq.iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let key = match k.as_str() {
                    Some(s) => s.to_owned(),
                    None => serde_yaml::to_string(k)
                        .map(|s| s.trim().to_owned())
                        .unwrap_or_default(),
                };
                out.insert(key, yaml_to_json(v));
            }
            serde_json::Value::Object(out)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

// --- TOML 접근 헬퍼 ---

/// TOML 값에서 문자열 필드를 꺼냅니다.
pub(crate) fn toml_str(value: &toml::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_owned())
}

/// TOML 값을 문자열 목록으로 정규화합니다.
pub(crate) fn toml_str_list(value: Option<&toml::Value>) -> Vec<String> {
    match value {
        Some(toml::Value::String(s)) => {
            if s.trim().is_empty() {
                Vec::new()
            } else {
                vec![s.clone()]
            }
        }
        Some(toml::Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_owned())
            .collect(),
        _ => Vec::new(),
    }
}

/// TOML 값을 extra 가방용 JSON 값으로 변환합니다.
pub(crate) fn toml_to_json(value: &toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s.clone()),
        toml::Value::Integer(i) => serde_json::Value::from(*i),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        toml::Value::Boolean(b) => serde_json::Value::Bool(*b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let mut out = serde_json::Map::new();
            for (k, v) in table {
                out.insert(k.clone(), toml_to_json(v));
            }
            serde_json::Value::Object(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_all_vendors() {
        let registry = ParserRegistry::with_defaults();
        for vendor in Vendor::ALL {
            assert!(registry.get(vendor).is_some(), "missing parser for {vendor}");
        }
    }

    #[test]
    fn empty_registry_returns_none() {
        let registry = ParserRegistry::new();
        assert!(registry.get(Vendor::Sigma).is_none());
    }

    #[test]
    fn path_extension_check_is_case_insensitive() {
        assert!(path_has_extension("rules/Test.YML", &[".yml", ".yaml"]));
        assert!(!path_has_extension("rules/test.toml", &[".yml", ".yaml"]));
    }

    #[test]
    fn path_exclusion_matches_anywhere() {
        assert!(path_excluded("rules/deprecated/old.yml", &["deprecated", "tests"]));
        assert!(path_excluded("rules/Tests/x.yml", &["tests"]));
        assert!(!path_excluded("rules/windows/proc.yml", &["deprecated", "tests"]));
    }

    #[test]
    fn yaml_str_list_accepts_scalar_and_sequence() {
        let scalar: serde_yaml::Value = serde_yaml::from_str("just one").unwrap();
        assert_eq!(yaml_str_list(Some(&scalar)), vec!["just one"]);

        let seq: serde_yaml::Value = serde_yaml::from_str("[a, b, c]").unwrap();
        assert_eq!(yaml_str_list(Some(&seq)), vec!["a", "b", "c"]);

        assert!(yaml_str_list(None).is_empty());
    }

    #[test]
    fn first_yaml_document_takes_first() {
        let content = "title: first\n---\ntitle: second\n";
        let doc = first_yaml_document(content).unwrap();
        assert_eq!(yaml_str(&doc, "title").as_deref(), Some("first"));
    }

    #[test]
    fn first_yaml_document_rejects_garbage() {
        let result = first_yaml_document("not: [valid: yaml: {{{");
        assert!(matches!(result, Err(ParseOutcome::Skipped { .. })));
    }

    #[test]
    fn yaml_to_json_preserves_shape() {
        let value: serde_yaml::Value =
            serde_yaml::from_str("a: 1\nb: [x, y]\nc:\n  d: true").unwrap();
        let json = yaml_to_json(&value);
        assert_eq!(json["a"], 1);
        assert_eq!(json["b"][1], "y");
        assert_eq!(json["c"]["d"], true);
    }

    #[test]
    fn toml_str_list_accepts_scalar_and_array() {
        let value: toml::Value = "x = 'one'\ny = ['a', 'b']".parse().unwrap();
        assert_eq!(toml_str_list(value.get("x")), vec!["one"]);
        assert_eq!(toml_str_list(value.get("y")), vec!["a", "b"]);
    }
}
