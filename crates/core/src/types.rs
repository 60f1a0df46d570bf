//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 파서가 생성하는 중간 표현([`ParsedRule`])과 정규화 결과([`NormalizedDetection`]),
//! 그리고 모든 모듈이 공유하는 열거형(벤더, 상태, 심각도, 쿼리 언어)을 정의합니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// 지원하는 탐지 규칙 벤더
///
/// 각 벤더는 파서/노멀라이저 한 쌍과 1:1로 대응합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// SigmaHQ 커뮤니티 규칙 (YAML)
    Sigma,
    /// Elastic detection-rules (TOML)
    Elastic,
    /// Splunk Security Content (YAML)
    Splunk,
    /// Microsoft Sentinel Analytics Rules (YAML)
    Sentinel,
    /// Sublime Security 이메일 규칙 (YAML)
    Sublime,
    /// Elastic protections-artifacts 행위 규칙 (TOML)
    ElasticProtections,
    /// Elastic hunting 쿼리 (TOML)
    ElasticHunting,
    /// LOLRMM Sigma 호환 규칙 (YAML)
    Lolrmm,
}

impl Vendor {
    /// 전체 벤더 목록 (레지스트리 순회용)
    pub const ALL: [Vendor; 8] = [
        Vendor::Sigma,
        Vendor::Elastic,
        Vendor::Splunk,
        Vendor::Sentinel,
        Vendor::Sublime,
        Vendor::ElasticProtections,
        Vendor::ElasticHunting,
        Vendor::Lolrmm,
    ];

    /// 저장소/레지스트리 키로 사용하는 벤더 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sigma => "sigma",
            Self::Elastic => "elastic",
            Self::Splunk => "splunk",
            Self::Sentinel => "sentinel",
            Self::Sublime => "sublime",
            Self::ElasticProtections => "elastic_protections",
            Self::ElasticHunting => "elastic_hunting",
            Self::Lolrmm => "lolrmm",
        }
    }

    /// 이름에서 벤더를 찾습니다. 대소문자를 구분하지 않습니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "sigma" => Some(Self::Sigma),
            "elastic" => Some(Self::Elastic),
            "splunk" => Some(Self::Splunk),
            "sentinel" => Some(Self::Sentinel),
            "sublime" => Some(Self::Sublime),
            "elastic_protections" => Some(Self::ElasticProtections),
            "elastic_hunting" => Some(Self::ElasticHunting),
            "lolrmm" => Some(Self::Lolrmm),
            _ => None,
        }
    }

    /// 원본 저장소의 기본 브랜치
    ///
    /// 규칙 파일로 가는 직접 링크 URL 생성에 사용됩니다.
    pub fn default_branch(&self) -> &'static str {
        match self {
            Self::Sigma | Self::Sentinel => "master",
            Self::Splunk => "develop",
            _ => "main",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 정규화된 규칙 상태
///
/// 벤더별 어휘(production, released, obsolete 등)는
/// [`RuleStatus::from_raw`]가 이 네 값으로 접습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    /// 안정 (production/released 포함)
    Stable,
    /// 실험적 (test/development 포함)
    Experimental,
    /// 폐기됨 (obsolete/retired 포함)
    Deprecated,
    /// 매핑 불가 또는 미지정
    #[default]
    Unknown,
}

impl RuleStatus {
    /// 벤더 원문 상태 문자열을 표준 상태로 접습니다.
    ///
    /// 어떤 입력도 에러 없이 네 값 중 하나로 귀결됩니다 (폐쇄성).
    pub fn from_raw(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Unknown;
        };
        match raw.trim().to_lowercase().as_str() {
            "stable" | "production" | "released" => Self::Stable,
            "experimental" | "test" | "testing" | "development" | "dev" => Self::Experimental,
            "deprecated" | "obsolete" | "retired" => Self::Deprecated,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Experimental => "experimental",
            Self::Deprecated => "deprecated",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 정규화된 심각도
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    /// 매핑 불가 또는 미지정
    #[default]
    Unknown,
    /// 낮음 (informational/info 포함)
    Low,
    /// 중간 (moderate 포함)
    Medium,
    /// 높음
    High,
    /// 치명적 (severe 포함)
    Critical,
}

impl RuleSeverity {
    /// 벤더 원문 심각도 문자열을 표준 심각도로 접습니다.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Unknown;
        };
        match raw.trim().to_lowercase().as_str() {
            "informational" | "info" | "low" => Self::Low,
            "medium" | "moderate" => Self::Medium,
            "high" => Self::High,
            "critical" | "severe" => Self::Critical,
            _ => Self::Unknown,
        }
    }

    /// 0~100 점수를 심각도로 변환합니다 (Splunk RBA 등 수치 기반 벤더용).
    ///
    /// 임계값: 80 이상 critical, 60 이상 high, 40 이상 medium, 그 외 low.
    pub fn from_score(score: i64) -> Self {
        if score >= 80 {
            Self::Critical
        } else if score >= 60 {
            Self::High
        } else if score >= 40 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 탐지 로직 쿼리 언어
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryLanguage {
    Sigma,
    Eql,
    Esql,
    Kql,
    Lucene,
    Spl,
    Mql,
    Ml,
    ThreatMatch,
    #[default]
    Unknown,
}

impl QueryLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sigma => "sigma",
            Self::Eql => "eql",
            Self::Esql => "esql",
            Self::Kql => "kql",
            Self::Lucene => "lucene",
            Self::Spl => "spl",
            Self::Mql => "mql",
            Self::Ml => "ml",
            Self::ThreatMatch => "threat_match",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for QueryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 벤더별 탐지 로직 페이로드
///
/// 파서가 추출한 원본 형태를 유지하며, 노멀라이저가 표시용 문자열로 렌더링합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionLogic {
    /// 단일 쿼리 문자열 (EQL, KQL, SPL, MQL 등)
    Query(String),
    /// 구조화된 탐지 블록 (Sigma detection 매핑)
    Structured(serde_yaml::Value),
    /// ML 기반 규칙 (쿼리 없음, job ID만 존재)
    MachineLearning { job_id: String },
}

/// 로그 소스 힌트
///
/// 벤더마다 다른 방식으로 표현되는 로그 소스 정보를 한 구조로 모읍니다.
/// 비어 있는 필드는 해당 벤더가 그 표현을 쓰지 않는다는 뜻입니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogSourceHint {
    /// Sigma 스타일 product (windows, linux 등)
    pub product: Option<String>,
    /// Sigma 스타일 category (process_creation 등)
    pub category: Option<String>,
    /// Sigma 스타일 service (sysmon 등)
    pub service: Option<String>,
    /// Elastic 인덱스 패턴 (winlogbeat-* 등)
    pub indices: Vec<String>,
    /// Splunk data_source 목록
    pub data_sources: Vec<String>,
    /// Sentinel 커넥터 dataTypes
    pub data_types: Vec<String>,
}

impl LogSourceHint {
    /// product/category/service를 소문자 목록으로 평탄화합니다.
    ///
    /// 중복은 첫 등장 순서를 유지하며 제거됩니다.
    pub fn flatten(&self) -> Vec<String> {
        let mut out = Vec::new();
        for field in [&self.product, &self.category, &self.service] {
            if let Some(value) = field {
                let lower = value.to_lowercase();
                if !lower.is_empty() && !out.contains(&lower) {
                    out.push(lower);
                }
            }
        }
        out
    }
}

/// MITRE ATT&CK 힌트
///
/// 벤더가 MITRE 정보를 네이티브 필드로 제공하면 파서 단계에서 채워지고,
/// 태그로만 제공하면 (Sigma 계열) 태그 디코딩 결과가 들어갑니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MitreHint {
    /// 전술 ID 목록 (TA0001 형식, 첫 등장 순서)
    pub tactics: Vec<String>,
    /// 기법 ID 목록 (T1059 / T1059.001 형식, 첫 등장 순서)
    pub techniques: Vec<String>,
}

impl MitreHint {
    /// 전술 ID를 추가합니다. 이미 있으면 무시합니다.
    pub fn push_tactic(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.tactics.contains(&id) {
            self.tactics.push(id);
        }
    }

    /// 기법 ID를 추가합니다. 이미 있으면 무시합니다.
    pub fn push_technique(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.techniques.contains(&id) {
            self.techniques.push(id);
        }
    }
}

/// 파싱된 탐지 규칙 — 정규화 이전의 중간 표현
///
/// 한 파일의 처리 과정 안에서만 존재하며 저장되지 않습니다.
/// `title`이 없는 파일은 규칙이 아니므로 파서가 생성을 거부합니다.
#[derive(Debug, Clone)]
pub struct ParsedRule {
    /// 출처 벤더
    pub source: Vendor,
    /// 저장소 루트 기준 상대 경로
    pub file_path: String,
    /// 원본 파일 내용 (감사/내보내기용으로 그대로 보존)
    pub raw_content: String,
    /// 규칙 제목 (필수)
    pub title: String,
    /// 벤더별 탐지 로직
    pub detection_logic: DetectionLogic,
    /// 설명
    pub description: Option<String>,
    /// 작성자
    pub author: Option<String>,
    /// 벤더 원문 상태 (아직 정규화 전)
    pub status: Option<String>,
    /// 벤더 원문 심각도 (아직 정규화 전)
    pub severity: Option<String>,
    /// 로그 소스 힌트
    pub log_source: LogSourceHint,
    /// 분류 태그 (MITRE 태그 제외)
    pub tags: Vec<String>,
    /// MITRE ATT&CK 힌트
    pub mitre: MitreHint,
    /// 오탐 주의사항 목록
    pub false_positives: Vec<String>,
    /// 벤더별 잔여 필드 (열린 가방)
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ParsedRule {
    /// extra 가방에서 문자열 값을 꺼냅니다.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }
}

/// 정규화된 탐지 규칙 — 저장소에 기록되는 표준 스키마
///
/// 모든 벤더의 규칙이 이 형태로 수렴합니다.
/// `id`는 `(source, file_path)`의 SHA-256에서 유도되므로
/// 같은 파일을 재인제스트해도 항상 같은 값입니다 (멱등 upsert 키).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDetection {
    /// 내용 유도 식별자 (UUID 모양 문자열)
    pub id: String,
    /// 출처 벤더 이름
    pub source: String,
    /// 저장소 루트 기준 파일 경로
    pub source_file: String,
    /// 저장소 기본 URL
    pub source_repo_url: String,
    /// 원본 저장소의 규칙 파일 직접 링크
    pub source_rule_url: Option<String>,
    /// 벤더 네이티브 규칙 ID
    pub rule_id: Option<String>,
    /// 제목
    pub title: String,
    /// 설명
    pub description: Option<String>,
    /// 작성자
    pub author: Option<String>,
    /// 상태
    pub status: RuleStatus,
    /// 심각도
    pub severity: RuleSeverity,
    /// 벤더 원문 로그 소스 목록 (투명성 유지)
    pub log_sources: Vec<String>,
    /// 벤더 원문 데이터 소스 목록
    pub data_sources: Vec<String>,
    /// 표준화된 플랫폼 (미탐지 시 빈 문자열)
    pub platform: String,
    /// 표준화된 이벤트 카테고리 (미탐지 시 빈 문자열)
    pub event_category: String,
    /// 표준화된 데이터 소스 (미탐지 시 빈 문자열)
    pub data_source_normalized: String,
    /// MITRE 전술 ID 목록
    pub mitre_tactics: Vec<String>,
    /// MITRE 기법 ID 목록
    pub mitre_techniques: Vec<String>,
    /// 표시용 탐지 로직 (항상 문자열, 로직 부재 시 설명 문구)
    pub detection_logic: String,
    /// 쿼리 언어
    pub language: QueryLanguage,
    /// 태그
    pub tags: Vec<String>,
    /// 참고 링크
    pub references: Vec<String>,
    /// 오탐 주의사항
    pub false_positives: Vec<String>,
    /// 원본 파일 내용
    pub raw_content: String,
    /// 벤더가 주장하는 생성 일자
    pub rule_created_date: Option<NaiveDateTime>,
    /// 벤더가 주장하는 수정 일자
    pub rule_modified_date: Option<NaiveDateTime>,
    /// 파이프라인 기록 시각
    pub created_at: DateTime<Utc>,
    /// 파이프라인 갱신 시각
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for NormalizedDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {} ({})",
            self.source, self.severity, self.title, self.id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_roundtrip_through_name() {
        for vendor in Vendor::ALL {
            assert_eq!(Vendor::from_name(vendor.as_str()), Some(vendor));
        }
    }

    #[test]
    fn vendor_from_name_case_insensitive() {
        assert_eq!(Vendor::from_name("SIGMA"), Some(Vendor::Sigma));
        assert_eq!(Vendor::from_name("Elastic_Protections"), Some(Vendor::ElasticProtections));
        assert_eq!(Vendor::from_name("nonexistent"), None);
    }

    #[test]
    fn vendor_default_branches() {
        assert_eq!(Vendor::Sigma.default_branch(), "master");
        assert_eq!(Vendor::Sentinel.default_branch(), "master");
        assert_eq!(Vendor::Splunk.default_branch(), "develop");
        assert_eq!(Vendor::Elastic.default_branch(), "main");
        assert_eq!(Vendor::Sublime.default_branch(), "main");
    }

    #[test]
    fn status_folding_covers_synonyms() {
        assert_eq!(RuleStatus::from_raw(Some("production")), RuleStatus::Stable);
        assert_eq!(RuleStatus::from_raw(Some("Released")), RuleStatus::Stable);
        assert_eq!(RuleStatus::from_raw(Some("dev")), RuleStatus::Experimental);
        assert_eq!(RuleStatus::from_raw(Some("testing")), RuleStatus::Experimental);
        assert_eq!(RuleStatus::from_raw(Some("RETIRED")), RuleStatus::Deprecated);
        assert_eq!(RuleStatus::from_raw(Some("whatever")), RuleStatus::Unknown);
        assert_eq!(RuleStatus::from_raw(Some("")), RuleStatus::Unknown);
        assert_eq!(RuleStatus::from_raw(None), RuleStatus::Unknown);
    }

    #[test]
    fn severity_folding_covers_synonyms() {
        assert_eq!(RuleSeverity::from_raw(Some("informational")), RuleSeverity::Low);
        assert_eq!(RuleSeverity::from_raw(Some("Info")), RuleSeverity::Low);
        assert_eq!(RuleSeverity::from_raw(Some("moderate")), RuleSeverity::Medium);
        assert_eq!(RuleSeverity::from_raw(Some("HIGH")), RuleSeverity::High);
        assert_eq!(RuleSeverity::from_raw(Some("severe")), RuleSeverity::Critical);
        assert_eq!(RuleSeverity::from_raw(Some("none")), RuleSeverity::Unknown);
        assert_eq!(RuleSeverity::from_raw(None), RuleSeverity::Unknown);
    }

    #[test]
    fn severity_from_score_thresholds() {
        assert_eq!(RuleSeverity::from_score(95), RuleSeverity::Critical);
        assert_eq!(RuleSeverity::from_score(80), RuleSeverity::Critical);
        assert_eq!(RuleSeverity::from_score(79), RuleSeverity::High);
        assert_eq!(RuleSeverity::from_score(60), RuleSeverity::High);
        assert_eq!(RuleSeverity::from_score(45), RuleSeverity::Medium);
        assert_eq!(RuleSeverity::from_score(40), RuleSeverity::Medium);
        assert_eq!(RuleSeverity::from_score(10), RuleSeverity::Low);
        assert_eq!(RuleSeverity::from_score(0), RuleSeverity::Low);
    }

    #[test]
    fn severity_ordering() {
        assert!(RuleSeverity::Low < RuleSeverity::Medium);
        assert!(RuleSeverity::Medium < RuleSeverity::High);
        assert!(RuleSeverity::High < RuleSeverity::Critical);
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&RuleSeverity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&RuleStatus::Experimental).unwrap();
        assert_eq!(json, "\"experimental\"");
    }

    #[test]
    fn query_language_threat_match_snake_case() {
        let json = serde_json::to_string(&QueryLanguage::ThreatMatch).unwrap();
        assert_eq!(json, "\"threat_match\"");
        assert_eq!(QueryLanguage::ThreatMatch.as_str(), "threat_match");
    }

    #[test]
    fn log_source_hint_flatten_dedupes_in_order() {
        let hint = LogSourceHint {
            product: Some("Windows".to_owned()),
            category: Some("process_creation".to_owned()),
            service: Some("windows".to_owned()),
            ..Default::default()
        };
        assert_eq!(hint.flatten(), vec!["windows", "process_creation"]);
    }

    #[test]
    fn log_source_hint_flatten_empty() {
        assert!(LogSourceHint::default().flatten().is_empty());
    }

    #[test]
    fn mitre_hint_dedupes() {
        let mut hint = MitreHint::default();
        hint.push_technique("T1059.001");
        hint.push_technique("T1059.001");
        hint.push_tactic("TA0002");
        hint.push_tactic("TA0002");
        assert_eq!(hint.techniques, vec!["T1059.001"]);
        assert_eq!(hint.tactics, vec!["TA0002"]);
    }

    #[test]
    fn normalized_detection_display() {
        let now = Utc::now();
        let detection = NormalizedDetection {
            id: "abc-def".to_owned(),
            source: "sigma".to_owned(),
            source_file: "rules/test.yml".to_owned(),
            source_repo_url: "https://github.com/SigmaHQ/sigma.git".to_owned(),
            source_rule_url: None,
            rule_id: None,
            title: "Suspicious PowerShell".to_owned(),
            description: None,
            author: None,
            status: RuleStatus::Stable,
            severity: RuleSeverity::High,
            log_sources: vec![],
            data_sources: vec![],
            platform: String::new(),
            event_category: String::new(),
            data_source_normalized: String::new(),
            mitre_tactics: vec![],
            mitre_techniques: vec![],
            detection_logic: "selection: ...".to_owned(),
            language: QueryLanguage::Sigma,
            tags: vec![],
            references: vec![],
            false_positives: vec![],
            raw_content: String::new(),
            rule_created_date: None,
            rule_modified_date: None,
            created_at: now,
            updated_at: now,
        };
        let display = detection.to_string();
        assert!(display.contains("sigma"));
        assert!(display.contains("high"));
        assert!(display.contains("Suspicious PowerShell"));
    }
}
