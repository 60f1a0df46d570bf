//! 설정 관리 — rulewarden.toml 파싱 및 런타임 설정
//!
//! [`RulewardenConfig`]는 파이프라인 전체의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`RULEWARDEN_GENERAL_LOG_LEVEL=debug` 형식)
//! 2. 설정 파일 (`rulewarden.toml`)
//! 3. 기본값 (`Default` 구현 — 8개 벤더 저장소 전부 포함)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, RulewardenError};
use crate::types::Vendor;

/// Rulewarden 통합 설정
///
/// `rulewarden.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulewardenConfig {
    /// 일반 설정
    pub general: GeneralConfig,
    /// MITRE ATT&CK 카탈로그 설정
    pub mitre: MitreConfig,
    /// 인제스트 설정
    pub ingest: IngestConfig,
    /// 벤더 저장소 목록
    pub repositories: Vec<RepositoryConfig>,
}

impl Default for RulewardenConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            mitre: MitreConfig::default(),
            ingest: IngestConfig::default(),
            repositories: RepositoryConfig::default_set(),
        }
    }
}

impl RulewardenConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RulewardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RulewardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RulewardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                RulewardenError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, RulewardenError> {
        toml::from_str(toml_str).map_err(|e| {
            RulewardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 네이밍 규칙: `RULEWARDEN_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "RULEWARDEN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "RULEWARDEN_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "RULEWARDEN_GENERAL_DATA_DIR");

        override_string(&mut self.mitre.source_url, "RULEWARDEN_MITRE_SOURCE_URL");
        override_string(&mut self.mitre.cache_path, "RULEWARDEN_MITRE_CACHE_PATH");
        override_u64(&mut self.mitre.cache_ttl_hours, "RULEWARDEN_MITRE_CACHE_TTL_HOURS");
        override_u64(
            &mut self.mitre.fetch_timeout_secs,
            "RULEWARDEN_MITRE_FETCH_TIMEOUT_SECS",
        );

        override_usize(&mut self.ingest.batch_size, "RULEWARDEN_INGEST_BATCH_SIZE");
        override_usize(
            &mut self.ingest.error_sample_limit,
            "RULEWARDEN_INGEST_ERROR_SAMPLE_LIMIT",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), RulewardenError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.ingest.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.batch_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.mitre.cache_ttl_hours == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mitre.cache_ttl_hours".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        for repo in &self.repositories {
            if Vendor::from_name(&repo.name).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "repositories.name".to_owned(),
                    reason: format!("unknown vendor: {}", repo.name),
                }
                .into());
            }
            if repo.url.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "repositories.url".to_owned(),
                    reason: format!("url must not be empty for {}", repo.name),
                }
                .into());
            }
        }

        Ok(())
    }

    /// 이름으로 저장소 설정을 찾습니다.
    pub fn repository(&self, name: &str) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|r| r.name == name)
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리 (카탈로그 캐시, 파일 스토어)
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/rulewarden".to_owned(),
        }
    }
}

/// MITRE ATT&CK 카탈로그 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MitreConfig {
    /// 공식 CTI 저장소의 enterprise-attack STIX 번들 URL
    pub source_url: String,
    /// 로컬 캐시 파일 경로
    pub cache_path: String,
    /// 캐시 유효 기간 (시간)
    pub cache_ttl_hours: u64,
    /// 원격 다운로드 타임아웃 (초)
    pub fetch_timeout_secs: u64,
}

impl Default for MitreConfig {
    fn default() -> Self {
        Self {
            source_url: "https://raw.githubusercontent.com/mitre/cti/master/enterprise-attack/enterprise-attack.json".to_owned(),
            cache_path: "/var/lib/rulewarden/mitre_attack.json".to_owned(),
            cache_ttl_hours: 24,
            fetch_timeout_secs: 60,
        }
    }
}

/// 인제스트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 스토어 배치 크기
    pub batch_size: usize,
    /// 통계에 포함할 샘플 에러 수
    pub error_sample_limit: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            error_sample_limit: 20,
        }
    }
}

/// 벤더 저장소 설정
///
/// `name`은 [`Vendor`] 이름과 일치해야 합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// 벤더 이름 (sigma, elastic, ...)
    pub name: String,
    /// 저장소 원격 URL
    pub url: String,
    /// 브랜치 오버라이드 (없으면 벤더 기본 브랜치)
    #[serde(default)]
    pub branch: Option<String>,
    /// 로컬 체크아웃 경로 (없으면 `{data_dir}/repos/{name}`)
    #[serde(default)]
    pub local_path: Option<String>,
}

impl RepositoryConfig {
    /// 8개 벤더 전부를 포함하는 기본 저장소 목록
    pub fn default_set() -> Vec<Self> {
        let defaults = [
            ("sigma", "https://github.com/SigmaHQ/sigma.git"),
            ("elastic", "https://github.com/elastic/detection-rules.git"),
            ("splunk", "https://github.com/splunk/security_content.git"),
            ("sentinel", "https://github.com/Azure/Azure-Sentinel.git"),
            ("sublime", "https://github.com/sublime-security/sublime-rules.git"),
            (
                "elastic_protections",
                "https://github.com/elastic/protections-artifacts.git",
            ),
            (
                "elastic_hunting",
                "https://github.com/elastic/detection-rules.git",
            ),
            ("lolrmm", "https://github.com/magicsword-io/LOLRMM.git"),
        ];
        defaults
            .iter()
            .map(|(name, url)| Self {
                name: (*name).to_owned(),
                url: (*url).to_owned(),
                branch: None,
                local_path: None,
            })
            .collect()
    }

    /// 이 저장소의 벤더를 반환합니다.
    ///
    /// `validate()`를 통과한 설정에서는 항상 `Some`입니다.
    pub fn vendor(&self) -> Option<Vendor> {
        Vendor::from_name(&self.name)
    }

    /// 직접 링크 생성에 쓸 브랜치 이름
    pub fn branch_or_default(&self) -> &str {
        match (&self.branch, self.vendor()) {
            (Some(branch), _) => branch,
            (None, Some(vendor)) => vendor.default_branch(),
            (None, None) => "main",
        }
    }

    /// 로컬 체크아웃 경로를 계산합니다.
    pub fn resolve_local_path(&self, data_dir: &str) -> PathBuf {
        match &self.local_path {
            Some(path) => PathBuf::from(path),
            None => Path::new(data_dir).join("repos").join(&self.name),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
