//! 노멀라이저 공통 헬퍼
//!
//! 모든 벤더 노멀라이저가 공유하는 자유 함수들입니다. 식별자 생성,
//! 날짜 파싱, 직접 링크 URL, 데이터 소스 구문 → 표준 카테고리 매핑을
//! 담당합니다. 상태/심각도 어휘 접기는 core의
//! [`RuleStatus::from_raw`](rulewarden_core::types::RuleStatus) /
//! [`RuleSeverity::from_raw`](rulewarden_core::types::RuleSeverity)를 씁니다.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};

use rulewarden_core::types::{
    NormalizedDetection, ParsedRule, QueryLanguage, RuleSeverity, RuleStatus,
};

use crate::taxonomy::title_case;

use super::RepositoryContext;

/// `(source, file_path)`에서 결정적 식별자를 생성합니다.
///
/// SHA-256 해시를 UUID 모양(8-4-4-4-12)으로 잘라 씁니다.
/// 같은 입력은 항상 같은 ID가 되므로 재인제스트가 멱등합니다.
pub fn generate_id(source: &str, file_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{source}:{file_path}").as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32],
    )
}

/// 허용하는 날짜/시각 문자열 형식
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y"];

/// 다양한 ISO/준-ISO 형식의 날짜 문자열을 파싱합니다.
///
/// 전부 실패하면 에러 대신 `None`을 반환합니다.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// 원본 저장소의 규칙 파일 직접 링크를 만듭니다.
///
/// 경로 구분자를 통일하고, 저장소 URL의 `.git` 접미사를 제거합니다.
pub fn build_source_rule_url(repo_url: &str, branch: &str, file_path: &str) -> String {
    let path = file_path.replace('\\', "/");
    let path = path.strip_prefix('/').unwrap_or(&path);
    let repo = repo_url.strip_suffix(".git").unwrap_or(repo_url);
    format!("{repo}/blob/{branch}/{path}")
}

/// extra 가방의 JSON 값을 문자열 목록으로 정규화합니다.
///
/// 단일 문자열, 문자열 배열, 부재를 모두 받아 항상 목록을 돌려줍니다.
pub fn json_string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_owned()]
            }
        }
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_owned())
            .collect(),
        _ => Vec::new(),
    }
}

/// 오탐 목록을 정리합니다 (공백 제거, 빈 항목 탈락).
pub fn clean_string_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_owned())
        .collect()
}

/// 벤더 데이터 소스 구문 → 표준 표시 이름
///
/// 정확 일치를 먼저, 부분 일치를 그 다음으로 시도하고,
/// 둘 다 실패하면 원문을 타이틀 케이스로 정리해 그대로 씁니다.
const DATA_SOURCE_MAPPING: &[(&str, &str)] = &[
    // Windows 이벤트 로그
    ("sysmon", "Sysmon"),
    ("security_event", "Windows Security"),
    ("security", "Windows Security"),
    ("wineventlog", "Windows Event Log"),
    ("windows_event", "Windows Event Log"),
    ("system_event", "Windows System"),
    ("powershell_script", "PowerShell Script Block"),
    ("powershell", "PowerShell"),
    ("wmi", "WMI"),
    ("registry", "Windows Registry"),
    ("file_monitoring", "File Monitoring"),
    ("process_creation", "Process Creation"),
    ("network_connection", "Network Connection"),
    ("dns_query", "DNS"),
    ("dns", "DNS"),
    ("image_load", "Image Load"),
    ("driver_load", "Driver Load"),
    ("pipe_created", "Named Pipe"),
    ("firewall_logs", "Firewall"),
    ("firewall", "Windows Firewall"),
    ("create_remote_thread", "Remote Thread"),
    ("process_access", "Process Access"),
    ("file_event", "File Monitoring"),
    ("create_stream_hash", "Alternate Data Stream"),
    // 엔드포인트/EDR
    ("endpoint", "Endpoint"),
    ("behavior_event", "Behavior Detection"),
    ("edr", "EDR"),
    // 네트워크
    ("netflow", "NetFlow"),
    ("network", "Network Traffic"),
    ("packet", "Packet Capture"),
    ("webproxy", "Web Proxy"),
    ("proxy", "Web Proxy"),
    ("ids", "IDS/IPS"),
    ("zeek", "Zeek"),
    // 클라우드
    ("cloudtrail", "AWS CloudTrail"),
    ("aws", "AWS CloudTrail"),
    ("azure", "Azure Activity"),
    ("gcp", "GCP Audit"),
    ("cloud", "Cloud"),
    ("o365", "Office 365"),
    ("m365", "Microsoft 365"),
    ("okta", "Okta"),
    ("github", "GitHub"),
    // Linux/macOS
    ("linux_syslog", "Linux Syslog"),
    ("auditd", "Linux Auditd"),
    ("linux", "Linux"),
    ("macos_logs", "macOS Logs"),
    ("macos", "macOS"),
    ("unix", "Unix/Linux"),
    // 이메일
    ("email", "Email"),
    ("smtp", "SMTP"),
    // 인증
    ("authentication", "Authentication"),
    ("active_directory", "Active Directory"),
    ("ldap", "LDAP"),
    // RMM
    ("rmm_tool", "RMM Tool"),
    // 웹/애플리케이션
    ("application", "Application"),
    ("webserver", "Web Server"),
    ("antivirus", "Antivirus"),
];

/// 원문 데이터 소스 목록을 표준 카테고리 표시 이름으로 매핑합니다.
///
/// 결과는 첫 등장 순서를 유지하며 중복이 없습니다.
pub fn normalize_data_sources(raw_sources: &[String]) -> Vec<String> {
    let mut normalized = Vec::new();

    for source in raw_sources {
        let lower = source.trim().to_lowercase();
        if lower.is_empty() {
            continue;
        }

        // 정확 일치 우선
        let mapped = DATA_SOURCE_MAPPING
            .iter()
            .find(|(pattern, _)| *pattern == lower)
            // 그 다음 부분 일치
            .or_else(|| {
                DATA_SOURCE_MAPPING
                    .iter()
                    .find(|(pattern, _)| lower.contains(pattern))
            })
            .map(|(_, mapped)| (*mapped).to_owned())
            // 매핑 실패 시 타이틀 케이스 원문
            .unwrap_or_else(|| title_case(source.trim()));

        if !normalized.contains(&mapped) {
            normalized.push(mapped);
        }
    }

    normalized
}

/// 공통 필드가 채워진 기본 레코드를 만듭니다.
///
/// 각 벤더 노멀라이저는 이 위에 로그/데이터 소스, 분류 3-튜플,
/// 탐지 로직, 언어, 참조, 날짜를 채웁니다.
pub fn base_record(parsed: &ParsedRule, ctx: &RepositoryContext) -> NormalizedDetection {
    let now = Utc::now();
    let source = parsed.source.as_str();

    NormalizedDetection {
        id: generate_id(source, &parsed.file_path),
        source: source.to_owned(),
        source_file: parsed.file_path.clone(),
        source_repo_url: ctx.repo_url.clone(),
        source_rule_url: Some(build_source_rule_url(
            &ctx.repo_url,
            &ctx.branch,
            &parsed.file_path,
        )),
        rule_id: None,
        title: parsed.title.clone(),
        description: parsed.description.clone(),
        author: parsed.author.clone(),
        status: RuleStatus::from_raw(parsed.status.as_deref()),
        severity: RuleSeverity::from_raw(parsed.severity.as_deref()),
        log_sources: Vec::new(),
        data_sources: Vec::new(),
        platform: String::new(),
        event_category: String::new(),
        data_source_normalized: String::new(),
        mitre_tactics: parsed.mitre.tactics.clone(),
        mitre_techniques: parsed.mitre.techniques.clone(),
        detection_logic: String::new(),
        language: QueryLanguage::Unknown,
        tags: parsed.tags.clone(),
        references: Vec::new(),
        false_positives: clean_string_list(&parsed.false_positives),
        raw_content: parsed.raw_content.clone(),
        rule_created_date: None,
        rule_modified_date: None,
        created_at: now,
        updated_at: now,
    }
}
