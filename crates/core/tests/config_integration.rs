//! rulewarden.toml 통합 설정 테스트
//!
//! - rulewarden.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use rulewarden_core::config::RulewardenConfig;
use rulewarden_core::error::{ConfigError, RulewardenError};
use rulewarden_core::types::Vendor;

use serial_test::serial;

// =============================================================================
// rulewarden.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../rulewarden.toml.example");
    let config = RulewardenConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.general.data_dir, "/var/lib/rulewarden");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../rulewarden.toml.example");
    let config = RulewardenConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_has_correct_mitre_defaults() {
    let content = include_str!("../../../rulewarden.toml.example");
    let config = RulewardenConfig::parse(content).expect("should parse");

    assert!(config.mitre.source_url.contains("enterprise-attack.json"));
    assert_eq!(config.mitre.cache_ttl_hours, 24);
    assert_eq!(config.mitre.fetch_timeout_secs, 60);
}

#[test]
fn example_config_lists_every_vendor() {
    let content = include_str!("../../../rulewarden.toml.example");
    let config = RulewardenConfig::parse(content).expect("should parse");

    assert_eq!(config.repositories.len(), 8);
    for vendor in Vendor::ALL {
        assert!(
            config.repository(vendor.as_str()).is_some(),
            "example config is missing {vendor}"
        );
    }
}

#[test]
fn example_config_matches_default_set() {
    let content = include_str!("../../../rulewarden.toml.example");
    let parsed = RulewardenConfig::parse(content).expect("should parse");
    let defaults = RulewardenConfig::default();

    for repo in &defaults.repositories {
        let example = parsed
            .repository(&repo.name)
            .unwrap_or_else(|| panic!("missing {}", repo.name));
        assert_eq!(example.url, repo.url, "url mismatch for {}", repo.name);
    }
}

// =============================================================================
// 부분 설정 로딩 테스트
// =============================================================================

#[test]
fn partial_config_general_only() {
    let config = RulewardenConfig::parse("[general]\nlog_level = \"debug\"\n").expect("parse");
    assert_eq!(config.general.log_level, "debug");
    // 나머지 섹션은 기본값
    assert_eq!(config.ingest.batch_size, 100);
    assert_eq!(config.repositories.len(), 8);
}

#[test]
fn partial_config_single_repository_replaces_default_set() {
    let toml = r#"
[[repositories]]
name = "elastic"
url = "https://git.internal/mirror/detection-rules.git"
branch = "release"
"#;
    let config = RulewardenConfig::parse(toml).expect("parse");
    assert_eq!(config.repositories.len(), 1);
    assert_eq!(
        config.repository("elastic").unwrap().branch_or_default(),
        "release"
    );
    assert!(config.repository("sigma").is_none());
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial]
fn env_override_beats_file_value() {
    // SAFETY: serial 실행이므로 환경변수 조작이 안전합니다.
    unsafe { std::env::set_var("RULEWARDEN_GENERAL_LOG_LEVEL", "error") };

    let mut config =
        RulewardenConfig::parse("[general]\nlog_level = \"debug\"\n").expect("parse");
    config.apply_env_overrides();
    assert_eq!(config.general.log_level, "error");

    unsafe { std::env::remove_var("RULEWARDEN_GENERAL_LOG_LEVEL") };
}

#[test]
#[serial]
fn env_override_numeric_fields() {
    // SAFETY: serial 실행이므로 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("RULEWARDEN_INGEST_BATCH_SIZE", "250");
        std::env::set_var("RULEWARDEN_MITRE_CACHE_TTL_HOURS", "6");
    }

    let mut config = RulewardenConfig::default();
    config.apply_env_overrides();
    assert_eq!(config.ingest.batch_size, 250);
    assert_eq!(config.mitre.cache_ttl_hours, 6);

    unsafe {
        std::env::remove_var("RULEWARDEN_INGEST_BATCH_SIZE");
        std::env::remove_var("RULEWARDEN_MITRE_CACHE_TTL_HOURS");
    }
}

// =============================================================================
// 에러 케이스
// =============================================================================

#[test]
fn empty_config_uses_all_defaults() {
    let config = RulewardenConfig::parse("").expect("empty config should parse");
    config.validate().expect("defaults should validate");
}

#[test]
fn malformed_toml_is_parse_error() {
    let result = RulewardenConfig::parse("[general\nlog_level = ");
    assert!(matches!(
        result,
        Err(RulewardenError::Config(ConfigError::ParseFailed { .. }))
    ));
}

#[test]
fn unknown_repository_vendor_fails_validation() {
    let toml = r#"
[[repositories]]
name = "crowdstrike"
url = "https://example.invalid/cs.git"
"#;
    let config = RulewardenConfig::parse(toml).expect("parse");
    let err = config.validate().unwrap_err();
    assert!(matches!(
        err,
        RulewardenError::Config(ConfigError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn load_missing_file_is_file_not_found() {
    let result = RulewardenConfig::load("/nonexistent/rulewarden.toml").await;
    assert!(matches!(
        result,
        Err(RulewardenError::Config(ConfigError::FileNotFound { .. }))
    ));
}
