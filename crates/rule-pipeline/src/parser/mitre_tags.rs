//! MITRE ATT&CK 태그/이름 디코딩 헬퍼
//!
//! 벤더마다 전술 이름 표기가 다릅니다:
//! - Sigma 태그: `attack.initial-access` (하이픈, 가끔 언더스코어)
//! - Sentinel: `InitialAccess` / `Initial Access` (CamelCase / 공백)
//! - Sublime: `initial access` / `initial_access`
//!
//! 여기서는 정규형(하이픈) 테이블 하나를 두고, 각 파서가 자기 표기를
//! 정규형으로 바꾼 뒤 조회합니다.

use rulewarden_core::types::MitreHint;

/// 전술 이름(하이픈 정규형) → 전술 ID
const TACTIC_BY_NAME: &[(&str, &str)] = &[
    ("reconnaissance", "TA0043"),
    ("resource-development", "TA0042"),
    ("initial-access", "TA0001"),
    ("execution", "TA0002"),
    ("persistence", "TA0003"),
    ("privilege-escalation", "TA0004"),
    ("defense-evasion", "TA0005"),
    ("credential-access", "TA0006"),
    ("discovery", "TA0007"),
    ("lateral-movement", "TA0008"),
    ("collection", "TA0009"),
    ("command-and-control", "TA0011"),
    ("exfiltration", "TA0010"),
    ("impact", "TA0040"),
];

/// 전술 이름을 전술 ID로 변환합니다.
///
/// 하이픈/언더스코어/공백 표기를 모두 허용하며 대소문자를 무시합니다.
pub fn tactic_id_for_name(name: &str) -> Option<&'static str> {
    let normalized = name.trim().to_lowercase().replace(['_', ' '], "-");
    TACTIC_BY_NAME
        .iter()
        .find(|(tactic, _)| *tactic == normalized)
        .map(|(_, id)| *id)
}

/// 구분자 없는 표기(Sentinel CamelCase)를 전술 ID로 변환합니다.
///
/// 예: `DefenseEvasion`, `defense evasion`, `defense-evasion` 모두 TA0005.
pub fn tactic_id_for_squashed_name(name: &str) -> Option<&'static str> {
    let squashed = name
        .trim()
        .to_lowercase()
        .replace(['-', '_', ' '], "");
    TACTIC_BY_NAME
        .iter()
        .find(|(tactic, _)| tactic.replace('-', "") == squashed)
        .map(|(_, id)| *id)
}

/// 태그가 MITRE ATT&CK 참조인지 확인합니다.
///
/// 기법(`attack.t####`), 소프트웨어(`attack.s####`), 그룹(`attack.g####`),
/// 전술 이름(`attack.execution` 등)을 모두 MITRE 태그로 봅니다.
pub fn is_mitre_tag(tag: &str) -> bool {
    let lower = tag.to_lowercase();
    let Some(rest) = lower.strip_prefix("attack.") else {
        return false;
    };
    if rest.starts_with('t') || rest.starts_with('s') || rest.starts_with('g') {
        return true;
    }
    tactic_id_for_name(rest).is_some()
}

/// Sigma 스타일 태그에서 MITRE 전술/기법을 추출합니다.
///
/// - `attack.t1059` / `attack.t1059.001` → 기법 ID (대문자)
/// - `attack.execution` / `attack.initial-access` → 전술 ID
/// - `attack.s####` (소프트웨어), `attack.g####` (그룹) → 무시
///
/// 반환된 목록은 첫 등장 순서를 유지하며 중복이 없습니다.
pub fn extract_from_sigma_tags(tags: &[String]) -> MitreHint {
    let mut hint = MitreHint::default();

    for tag in tags {
        let lower = tag.to_lowercase();
        let Some(rest) = lower.strip_prefix("attack.") else {
            continue;
        };

        if rest.starts_with('t') && rest[1..].starts_with(|c: char| c.is_ascii_digit()) {
            hint.push_technique(rest.to_uppercase());
        } else if rest.starts_with('s') || rest.starts_with('g') {
            // 소프트웨어/그룹 참조는 규칙 분류에 쓰지 않음
            continue;
        } else if let Some(tactic_id) = tactic_id_for_name(rest) {
            hint.push_tactic(tactic_id);
        }
    }

    hint
}
