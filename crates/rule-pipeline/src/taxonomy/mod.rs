//! 로그 소스 분류기 — 이기종 힌트를 표준 분류 3종으로 변환
//!
//! 벤더마다 다르게 표현되는 로그 소스 정보(product/category/service,
//! 인덱스 패턴, 자유 텍스트)를 (플랫폼, 이벤트 카테고리, 데이터 소스)
//! 3-튜플로 표준화합니다. 각 차원은 미탐지 시 빈 문자열입니다.
//!
//! # 해석 순서 (차원별)
//! 1. 직접 힌트 — product/category/service가 알려진 별칭과 일치하면 즉시 확정
//! 2. 패턴 — 인덱스/쿼리 패턴 문자열에서 알려진 부분 문자열 스캔
//! 3. 키워드 점수 — 모든 힌트를 합친 소문자 검색 텍스트에서 키워드 출현 수를
//!    세어 최고 득점 후보 선택. 동점은 테이블 선언 순서가 이깁니다.
//!
//! 이 함수는 순수 함수이며 절대 panic하지 않습니다.

pub mod tables;

use tables::{DATA_SOURCES, EVENT_CATEGORIES, PLATFORMS};

/// 분류기 입력 힌트
#[derive(Debug, Clone, Copy, Default)]
pub struct TaxonomyHints<'a> {
    /// 평탄화된 원문 로그 소스 문자열 목록
    pub log_sources: &'a [String],
    /// Sigma 스타일 product
    pub product: Option<&'a str>,
    /// Sigma 스타일 category
    pub category: Option<&'a str>,
    /// Sigma 스타일 service
    pub service: Option<&'a str>,
    /// Elastic 스타일 인덱스 패턴
    pub index_patterns: &'a [String],
}

/// 표준 분류 3-튜플
///
/// 각 필드는 인식된 표준 값이거나 빈 문자열입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyTriple {
    pub platform: String,
    pub event_category: String,
    pub data_source: String,
}

/// 힌트를 표준 분류 3-튜플로 변환합니다.
pub fn classify(hints: &TaxonomyHints<'_>) -> TaxonomyTriple {
    let search_text = build_search_text(hints);

    TaxonomyTriple {
        platform: detect_platform(&search_text, hints),
        event_category: detect_event_category(&search_text, hints.category),
        data_source: detect_data_source(&search_text, hints.service, hints.index_patterns),
    }
}

/// 모든 힌트를 하나의 소문자 검색 텍스트로 합칩니다.
fn build_search_text(hints: &TaxonomyHints<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for source in hints.log_sources {
        parts.push(source);
    }
    if let Some(product) = hints.product {
        parts.push(product);
    }
    if let Some(category) = hints.category {
        parts.push(category);
    }
    if let Some(service) = hints.service {
        parts.push(service);
    }
    for pattern in hints.index_patterns {
        parts.push(pattern);
    }
    parts.join(" ").to_lowercase()
}

/// 힌트 문자열을 별칭 조회용으로 정규화합니다 (하이픈/공백 → 언더스코어).
fn normalize_hint(hint: &str) -> String {
    hint.trim().to_lowercase().replace(['-', ' '], "_")
}

fn detect_platform(search_text: &str, hints: &TaxonomyHints<'_>) -> String {
    // 1. product 힌트 (가장 신뢰도 높음)
    if let Some(product) = hints.product {
        let normalized = normalize_hint(product);
        for spec in PLATFORMS {
            if spec.id == normalized || spec.keywords.contains(&normalized.as_str()) {
                return spec.id.to_owned();
            }
        }
    }

    // 2. service가 알려진 데이터 소스면 그 플랫폼을 따름
    if let Some(service) = hints.service {
        let lower = service.trim().to_lowercase();
        if let Some(spec) = DATA_SOURCES.iter().find(|d| d.id == lower) {
            return spec.platform.to_owned();
        }
    }

    // 3. 인덱스 패턴 스캔
    for pattern in hints.index_patterns {
        let lower = pattern.to_lowercase();
        for spec in PLATFORMS {
            if spec.keywords.iter().any(|k| lower.contains(k)) {
                return spec.id.to_owned();
            }
        }
    }

    // 4. 키워드 점수
    best_by_keyword_score(search_text, PLATFORMS.iter().map(|s| (s.id, s.keywords)))
}

fn detect_event_category(search_text: &str, category: Option<&str>) -> String {
    // 1. category 힌트
    if let Some(category) = category {
        let normalized = normalize_hint(category);
        for spec in EVENT_CATEGORIES {
            if spec.id == normalized || spec.keywords.contains(&normalized.as_str()) {
                return spec.id.to_owned();
            }
        }
    }

    // 2. 키워드 점수
    best_by_keyword_score(
        search_text,
        EVENT_CATEGORIES.iter().map(|s| (s.id, s.keywords)),
    )
}

fn detect_data_source(
    search_text: &str,
    service: Option<&str>,
    index_patterns: &[String],
) -> String {
    // 1. service 직접 일치
    if let Some(service) = service {
        let lower = service.trim().to_lowercase();
        if DATA_SOURCES.iter().any(|d| d.id == lower) {
            return lower;
        }
    }

    // 2. 인덱스 패턴 포함
    for pattern in index_patterns {
        let lower = pattern.to_lowercase();
        if let Some(spec) = DATA_SOURCES.iter().find(|d| lower.contains(d.id)) {
            return spec.id.to_owned();
        }
    }

    // 3. 검색 텍스트 포함
    if let Some(spec) = DATA_SOURCES.iter().find(|d| search_text.contains(d.id)) {
        return spec.id.to_owned();
    }

    String::new()
}

/// 키워드 출현 수가 가장 높은 후보를 고릅니다.
///
/// 동점이면 먼저 나온 후보가 유지됩니다 (strict greater 비교).
fn best_by_keyword_score<'a>(
    search_text: &str,
    candidates: impl Iterator<Item = (&'a str, &'a [&'a str])>,
) -> String {
    let mut best: Option<(&str, usize)> = None;

    for (id, keywords) in candidates {
        let score = keywords
            .iter()
            .filter(|keyword| search_text.contains(*keyword))
            .count();
        if score > 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((id, score));
        }
    }

    best.map(|(id, _)| id.to_owned()).unwrap_or_default()
}

// --- 조회 헬퍼 ---

/// 플랫폼 표시 이름을 반환합니다. 모르는 값은 타이틀 케이스로 변환합니다.
pub fn platform_display_name(platform: &str) -> String {
    PLATFORMS
        .iter()
        .find(|p| p.id == platform)
        .map(|p| p.display_name.to_owned())
        .unwrap_or_else(|| {
            if platform.is_empty() {
                "Unknown".to_owned()
            } else {
                title_case(platform)
            }
        })
}

/// 플랫폼이 속한 그룹(endpoint, cloud, saas, ...)을 반환합니다.
pub fn platform_group(platform: &str) -> &'static str {
    PLATFORMS
        .iter()
        .find(|p| p.id == platform)
        .map(|p| p.group)
        .unwrap_or("")
}

/// 이벤트 카테고리 표시 이름을 반환합니다.
pub fn event_category_display_name(category: &str) -> String {
    EVENT_CATEGORIES
        .iter()
        .find(|c| c.id == category)
        .map(|c| c.display_name.to_owned())
        .unwrap_or_else(|| {
            if category.is_empty() {
                "Unknown".to_owned()
            } else {
                title_case(category)
            }
        })
}

/// 전체 플랫폼 ID 목록 (테이블 순서)
pub fn all_platforms() -> Vec<&'static str> {
    PLATFORMS.iter().map(|p| p.id).collect()
}

/// 전체 이벤트 카테고리 ID 목록 (테이블 순서)
pub fn all_event_categories() -> Vec<&'static str> {
    EVENT_CATEGORIES.iter().map(|c| c.id).collect()
}

/// 전체 데이터 소스 ID 목록 (테이블 순서)
pub fn all_data_sources() -> Vec<&'static str> {
    DATA_SOURCES.iter().map(|d| d.id).collect()
}

/// 언더스코어 구분 식별자를 타이틀 케이스로 변환합니다.
pub(crate) fn title_case(value: &str) -> String {
    value
        .split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints_with_product<'a>(product: &'a str) -> TaxonomyHints<'a> {
        TaxonomyHints {
            product: Some(product),
            ..Default::default()
        }
    }

    #[test]
    fn product_hint_resolves_directly() {
        let triple = classify(&hints_with_product("windows"));
        assert_eq!(triple.platform, "windows");
    }

    #[test]
    fn product_hint_normalizes_separators() {
        let triple = classify(&hints_with_product("Palo Alto"));
        assert_eq!(triple.platform, "palo_alto");
    }

    #[test]
    fn service_resolves_platform_and_data_source() {
        let hints = TaxonomyHints {
            service: Some("sysmon"),
            ..Default::default()
        };
        let triple = classify(&hints);
        assert_eq!(triple.platform, "windows");
        assert_eq!(triple.data_source, "sysmon");
    }

    #[test]
    fn category_hint_resolves_event_category() {
        let hints = TaxonomyHints {
            category: Some("process_creation"),
            ..Default::default()
        };
        let triple = classify(&hints);
        assert_eq!(triple.event_category, "process");
    }

    #[test]
    fn category_id_accepted_directly() {
        let hints = TaxonomyHints {
            category: Some("registry"),
            ..Default::default()
        };
        assert_eq!(classify(&hints).event_category, "registry");
    }

    #[test]
    fn index_patterns_resolve_platform() {
        let patterns = vec!["winlogbeat-*".to_owned()];
        let hints = TaxonomyHints {
            index_patterns: &patterns,
            ..Default::default()
        };
        let triple = classify(&hints);
        assert_eq!(triple.platform, "windows");
        assert_eq!(triple.data_source, "winlogbeat");
    }

    #[test]
    fn keyword_scoring_fallback() {
        let sources = vec!["cloudtrail audit".to_owned(), "iam change".to_owned()];
        let hints = TaxonomyHints {
            log_sources: &sources,
            ..Default::default()
        };
        let triple = classify(&hints);
        assert_eq!(triple.platform, "aws");
        assert_eq!(triple.data_source, "cloudtrail");
    }

    #[test]
    fn empty_hints_yield_empty_triple() {
        let triple = classify(&TaxonomyHints::default());
        assert_eq!(triple, TaxonomyTriple::default());
        assert_eq!(triple.platform, "");
        assert_eq!(triple.event_category, "");
        assert_eq!(triple.data_source, "");
    }

    #[test]
    fn tie_break_prefers_table_order() {
        // "kerberos"는 authentication 키워드, "api"는 api_activity 키워드 —
        // 각 1점이면 먼저 선언된 authentication이 이긴다.
        let sources = vec!["kerberos api".to_owned()];
        let hints = TaxonomyHints {
            log_sources: &sources,
            ..Default::default()
        };
        assert_eq!(classify(&hints).event_category, "authentication");
    }

    #[test]
    fn okta_service_text() {
        let sources = vec!["okta".to_owned(), "okta_system".to_owned()];
        let hints = TaxonomyHints {
            log_sources: &sources,
            ..Default::default()
        };
        assert_eq!(classify(&hints).platform, "okta");
    }

    #[test]
    fn display_name_helpers() {
        assert_eq!(platform_display_name("windows"), "Windows");
        assert_eq!(platform_display_name("gcp"), "Google Cloud");
        assert_eq!(platform_display_name(""), "Unknown");
        assert_eq!(platform_display_name("custom_thing"), "Custom Thing");
        assert_eq!(event_category_display_name("process"), "Process Activity");
        assert_eq!(event_category_display_name(""), "Unknown");
    }

    #[test]
    fn platform_group_lookup() {
        assert_eq!(platform_group("windows"), "endpoint");
        assert_eq!(platform_group("aws"), "cloud");
        assert_eq!(platform_group("zeek"), "network");
        assert_eq!(platform_group("unknown_platform"), "");
    }

    #[test]
    fn enumeration_helpers_nonempty() {
        assert!(all_platforms().contains(&"windows"));
        assert!(all_event_categories().contains(&"authentication"));
        assert!(all_data_sources().contains(&"cloudtrail"));
    }

    #[test]
    fn title_case_helper() {
        assert_eq!(title_case("rmm_tool"), "Rmm Tool");
        assert_eq!(title_case("already nice"), "Already Nice");
    }
}
