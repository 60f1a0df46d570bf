//! MITRE ATT&CK 리졸버 서비스
//!
//! 공식 CTI 저장소에서 카탈로그를 내려받아 메모리에 보관하고, 디스크
//! 캐시(TTL 24시간)로 미러링합니다. 다운로드 실패 시 (만료되었더라도)
//! 기존 캐시 → 내장 최소 카탈로그 순으로 강등해 서비스가 항상 조회
//! 가능하도록 보장합니다.
//!
//! 전역 싱글턴이 아니라 명시적으로 생성해 주입하는 인스턴스입니다.
//! 갱신은 single-flight로 직렬화되어 동시 호출이 중복 다운로드를
//! 일으키지 않습니다. 조회는 읽기 잠금만 사용하므로 정규화 작업이
//! 얼마든지 동시에 읽을 수 있습니다.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use rulewarden_core::config::MitreConfig;
use rulewarden_core::error::CatalogError;
use rulewarden_core::metrics as metric_names;

use super::catalog::Catalog;
use super::remap::remapped_technique;

/// 디스크 캐시 파일 형식
#[derive(Serialize, Deserialize)]
struct CachedCatalog {
    #[serde(flatten)]
    catalog: Catalog,
    fetched_at: DateTime<Utc>,
}

/// 카탈로그 상태 스냅샷 (운영자 조회용)
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub tactics_count: usize,
    pub techniques_count: usize,
    pub subtechniques_count: usize,
    pub last_fetch: Option<DateTime<Utc>>,
    pub loaded: bool,
}

struct CatalogState {
    catalog: Catalog,
    fetched_at: Option<DateTime<Utc>>,
    loaded: bool,
}

/// MITRE ATT&CK 리졸버
pub struct MitreService {
    config: MitreConfig,
    client: reqwest::Client,
    state: RwLock<CatalogState>,
    /// 갱신 single-flight 게이트
    refresh_gate: Mutex<()>,
}

impl MitreService {
    /// 설정으로 서비스를 생성합니다. 카탈로그는 아직 비어 있습니다.
    pub fn new(config: MitreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            client,
            state: RwLock::new(CatalogState {
                catalog: Catalog::default(),
                fetched_at: None,
                loaded: false,
            }),
            refresh_gate: Mutex::new(()),
        }
    }

    /// 이미 구성된 카탈로그로 서비스를 생성합니다 (테스트/오프라인용).
    ///
    /// 명시적으로 주입된 카탈로그는 TTL 만료 없이 유지됩니다.
    pub fn with_catalog(catalog: Catalog) -> Self {
        let mut service = Self::new(MitreConfig::default());
        service.state = RwLock::new(CatalogState {
            catalog,
            fetched_at: None,
            loaded: true,
        });
        service
    }

    /// 카탈로그가 로드되어 있고 TTL 내인지 보장합니다.
    ///
    /// 필요 시 캐시 로드 또는 원격 갱신을 수행합니다.
    /// 동시 호출은 single-flight로 직렬화됩니다.
    pub async fn ensure_loaded(&self) {
        if self.is_fresh().await {
            return;
        }

        let _gate = self.refresh_gate.lock().await;
        // 게이트 대기 중 다른 호출이 갱신을 끝냈을 수 있음
        if self.is_fresh().await {
            return;
        }

        if self.load_from_cache(false).await {
            return;
        }

        self.refresh_locked().await;
    }

    /// 원격 카탈로그를 강제로 갱신합니다.
    ///
    /// 반환값은 원격 다운로드 성공 여부입니다. 실패 시에도 서비스는
    /// 기존 캐시 또는 내장 카탈로그로 조회 가능한 상태를 유지합니다.
    pub async fn refresh(&self) -> bool {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    async fn is_fresh(&self) -> bool {
        let state = self.state.read().await;
        if !state.loaded {
            return false;
        }
        match state.fetched_at {
            Some(fetched_at) => {
                Utc::now() - fetched_at < Duration::hours(self.config.cache_ttl_hours as i64)
            }
            // 명시적 카탈로그 주입(with_catalog)은 만료 없음
            None => true,
        }
    }

    async fn refresh_locked(&self) -> bool {
        tracing::info!(url = %self.config.source_url, "fetching MITRE ATT&CK catalog");
        metrics::counter!(metric_names::MITRE_CATALOG_REFRESH_TOTAL).increment(1);

        match self.fetch_remote().await {
            Ok(catalog) => {
                let fetched_at = Utc::now();
                {
                    let mut state = self.state.write().await;
                    state.catalog = catalog;
                    state.fetched_at = Some(fetched_at);
                    state.loaded = true;
                }
                self.save_cache(fetched_at).await;
                let state = self.state.read().await;
                tracing::info!(
                    tactics = state.catalog.tactics.len(),
                    techniques = state.catalog.techniques.len(),
                    "MITRE catalog refreshed"
                );
                true
            }
            Err(e) => {
                metrics::counter!(metric_names::MITRE_CATALOG_REFRESH_FAILURES_TOTAL).increment(1);
                tracing::warn!(error = %e, "MITRE catalog fetch failed, degrading");

                // 만료된 캐시라도 내장 카탈로그보다는 낫다
                if !self.state.read().await.catalog.is_empty() {
                    tracing::info!("keeping stale in-memory MITRE catalog");
                } else if self.load_from_cache(true).await {
                    tracing::info!("loaded stale MITRE catalog from disk cache");
                } else {
                    tracing::warn!("falling back to embedded minimal MITRE catalog");
                    let mut state = self.state.write().await;
                    state.catalog = Catalog::fallback();
                    state.loaded = true;
                }
                false
            }
        }
    }

    async fn fetch_remote(&self) -> Result<Catalog, CatalogError> {
        let response = self
            .client
            .get(&self.config.source_url)
            .send()
            .await
            .map_err(|e| CatalogError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| CatalogError::Fetch(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Fetch(e.to_string()))?;

        Catalog::from_stix_bundle(&body)
    }

    /// 디스크 캐시에서 카탈로그를 로드합니다.
    ///
    /// `allow_stale`이 false면 TTL이 지난 캐시는 거부합니다.
    async fn load_from_cache(&self, allow_stale: bool) -> bool {
        let path = self.config.cache_path.clone();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return false,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "failed to read MITRE cache");
                return false;
            }
        };

        let cached: CachedCatalog = match serde_json::from_str(&content) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "failed to parse MITRE cache");
                return false;
            }
        };

        let age = Utc::now() - cached.fetched_at;
        if !allow_stale && age >= Duration::hours(self.config.cache_ttl_hours as i64) {
            tracing::info!(path = %path, "MITRE cache is stale, will refresh");
            return false;
        }

        let mut state = self.state.write().await;
        state.catalog = cached.catalog;
        state.fetched_at = Some(cached.fetched_at);
        state.loaded = true;
        tracing::info!(
            path = %path,
            tactics = state.catalog.tactics.len(),
            techniques = state.catalog.techniques.len(),
            "loaded MITRE catalog from cache"
        );
        true
    }

    async fn save_cache(&self, fetched_at: DateTime<Utc>) {
        let path = std::path::PathBuf::from(&self.config.cache_path);
        let payload = {
            let state = self.state.read().await;
            CachedCatalog {
                catalog: state.catalog.clone(),
                fetched_at,
            }
        };

        let json = match serde_json::to_string(&payload) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize MITRE cache");
                return;
            }
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(path = %parent.display(), error = %e, "failed to create cache dir");
                return;
            }
        }
        if let Err(e) = tokio::fs::write(&path, json).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to write MITRE cache");
        }
    }

    /// 기법 ID가 현행(폐기/철회 아님)인지 확인합니다.
    pub async fn is_valid(&self, technique_id: &str) -> bool {
        let state = self.state.read().await;
        state
            .catalog
            .techniques
            .get(technique_id)
            .map(|t| !t.deprecated && !t.revoked)
            .unwrap_or(false)
    }

    /// 기법 ID를 현행 ID로 해석합니다.
    ///
    /// - 현행 ID면 그대로 반환
    /// - 철회된 ID면 정적 리매핑 테이블의 대체 ID가 현행일 때 그 ID 반환
    /// - 카탈로그에 있으나 폐기/철회 상태고 대체도 없으면 원래 ID 반환 (최선-노력)
    /// - 카탈로그가 모르는 ID면 `None`
    pub async fn map_technique(&self, technique_id: &str) -> Option<String> {
        if self.is_valid(technique_id).await {
            return Some(technique_id.to_owned());
        }

        if let Some(mapped) = remapped_technique(technique_id) {
            if self.is_valid(mapped).await {
                return Some(mapped.to_owned());
            }
        }

        let state = self.state.read().await;
        if state.catalog.techniques.contains_key(technique_id) {
            return Some(technique_id.to_owned());
        }

        None
    }

    /// 기법 ID 목록의 연관 전술을 합집합으로 반환합니다.
    ///
    /// 서브 기법이 카탈로그에 없으면 부모 기법의 전술을 참조합니다.
    /// 결과는 정렬되고 중복이 제거됩니다.
    pub async fn tactics_for(&self, technique_ids: &[String]) -> Vec<String> {
        let state = self.state.read().await;
        let mut tactics: Vec<String> = Vec::new();

        for id in technique_ids {
            let technique = state.catalog.techniques.get(id).or_else(|| {
                // 서브 기법이 없으면 부모 기법으로 폴백
                id.split('.')
                    .next()
                    .and_then(|parent| state.catalog.techniques.get(parent))
            });
            if let Some(technique) = technique {
                for tactic in &technique.tactics {
                    if !tactics.contains(tactic) {
                        tactics.push(tactic.clone());
                    }
                }
            }
        }

        tactics.sort();
        tactics
    }

    /// 전술 이름을 조회합니다. 모르는 ID는 그대로 돌려줍니다.
    pub async fn tactic_name(&self, tactic_id: &str) -> String {
        let state = self.state.read().await;
        state
            .catalog
            .tactics
            .get(tactic_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| tactic_id.to_owned())
    }

    /// 기법 이름을 조회합니다. 모르는 ID는 그대로 돌려줍니다.
    pub async fn technique_name(&self, technique_id: &str) -> String {
        let state = self.state.read().await;
        state
            .catalog
            .techniques
            .get(technique_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| technique_id.to_owned())
    }

    /// 카탈로그 상태 스냅샷을 반환합니다.
    pub async fn stats(&self) -> CatalogStats {
        let state = self.state.read().await;
        CatalogStats {
            tactics_count: state.catalog.tactics.len(),
            techniques_count: state.catalog.techniques.len(),
            subtechniques_count: state
                .catalog
                .techniques
                .values()
                .filter(|t| t.is_subtechnique)
                .count(),
            last_fetch: state.fetched_at,
            loaded: state.loaded,
        }
    }
}
