//! 규칙 파일 탐색 — 저장소 체크아웃에서 후보 파일 열거
//!
//! 탐색 제공자는 외부 협력자(git 동기화 메커니즘)가 내려받아 둔
//! 로컬 체크아웃을 읽기만 합니다. 벤더별 포함 루트/확장자/제외
//! 디렉토리 규칙을 적용해 상대 경로의 유한 시퀀스를 돌려줍니다.
//!
//! 반환 경로는 정렬되어 있어 통계와 샘플 에러 순서가 재현 가능합니다.

use std::path::{Path, PathBuf};

use rulewarden_core::config::RepositoryConfig;
use rulewarden_core::types::Vendor;

use crate::error::RulePipelineError;

/// 벤더별 탐색 규칙
struct DiscoveryRules {
    /// 포함 루트 접두어 (소문자, `/` 구분)
    roots: &'static [&'static str],
    /// 허용 확장자
    extensions: &'static [&'static str],
    /// 제외 디렉토리/토큰
    exclude: &'static [&'static str],
}

fn rules_for(vendor: Vendor) -> DiscoveryRules {
    match vendor {
        Vendor::Sigma => DiscoveryRules {
            // rules/ 외에 rules-emerging-threats/ 같은 변형 루트도 포함
            roots: &["rules"],
            extensions: &[".yml", ".yaml"],
            exclude: &["tests", "deprecated", "test", ".git"],
        },
        Vendor::Elastic => DiscoveryRules {
            roots: &["rules"],
            extensions: &[".toml"],
            exclude: &["_deprecated", "deprecated", "tests", "test", ".git", "_building_block"],
        },
        Vendor::Splunk => DiscoveryRules {
            roots: &["detections"],
            extensions: &[".yml", ".yaml"],
            exclude: &["deprecated", "tests", "test", ".git"],
        },
        Vendor::Sentinel => DiscoveryRules {
            roots: &["solutions"],
            extensions: &[".yml", ".yaml"],
            exclude: &["tests", "deprecated", "test", ".git", "sample"],
        },
        Vendor::Sublime => DiscoveryRules {
            roots: &["detection-rules"],
            extensions: &[".yml", ".yaml"],
            exclude: &["tests", "deprecated", "test", ".git"],
        },
        Vendor::ElasticProtections => DiscoveryRules {
            roots: &["behavior/rules"],
            extensions: &[".toml"],
            exclude: &["deprecated", "tests", "test", ".git"],
        },
        Vendor::ElasticHunting => DiscoveryRules {
            roots: &["hunting"],
            extensions: &[".toml"],
            exclude: &["deprecated", "tests", "test", ".git"],
        },
        Vendor::Lolrmm => DiscoveryRules {
            roots: &["detections/sigma"],
            extensions: &[".yml", ".yaml"],
            exclude: &["deprecated", "tests", "test", ".git"],
        },
    }
}

/// 규칙 파일 탐색 trait
///
/// 파이프라인은 이 trait을 통해서만 파일 시스템을 봅니다.
pub trait RuleDiscovery: Send + Sync {
    /// 저장소의 후보 규칙 파일 상대 경로를 열거합니다 (정렬됨).
    fn enumerate(
        &self,
        repo: &RepositoryConfig,
    ) -> impl Future<Output = Result<Vec<String>, RulePipelineError>> + Send;

    /// 규칙 파일 내용을 읽습니다. 읽을 수 없으면 `None`입니다.
    fn read(
        &self,
        repo: &RepositoryConfig,
        relative_path: &str,
    ) -> impl Future<Output = Option<String>> + Send;
}

/// 로컬 파일 시스템 탐색 제공자
#[derive(Debug, Clone)]
pub struct FsRuleDiscovery {
    data_dir: String,
}

impl FsRuleDiscovery {
    pub fn new(data_dir: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn repo_root(&self, repo: &RepositoryConfig) -> PathBuf {
        repo.resolve_local_path(&self.data_dir)
    }
}

impl RuleDiscovery for FsRuleDiscovery {
    async fn enumerate(&self, repo: &RepositoryConfig) -> Result<Vec<String>, RulePipelineError> {
        let Some(vendor) = repo.vendor() else {
            return Err(RulePipelineError::UnknownRepository(repo.name.clone()));
        };
        let root = self.repo_root(repo);

        if !root.exists() {
            tracing::warn!(
                repository = %repo.name,
                path = %root.display(),
                "repository checkout not found"
            );
            return Ok(Vec::new());
        }

        let rules = rules_for(vendor);
        let repo_name = repo.name.clone();

        // 디렉토리 워크는 동기 I/O — blocking 풀에서 수행
        let paths = tokio::task::spawn_blocking(move || walk(&root, &rules))
            .await
            .map_err(|e| RulePipelineError::Discovery {
                repository: repo_name,
                reason: e.to_string(),
            })??;

        Ok(paths)
    }

    async fn read(&self, repo: &RepositoryConfig, relative_path: &str) -> Option<String> {
        let full_path = self.repo_root(repo).join(relative_path);
        match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!(
                    path = %full_path.display(),
                    error = %e,
                    "failed to read rule file"
                );
                None
            }
        }
    }
}

/// 저장소 루트 아래를 재귀 순회하며 규칙에 맞는 상대 경로를 수집합니다.
fn walk(root: &Path, rules: &DiscoveryRules) -> Result<Vec<String>, RulePipelineError> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "failed to read directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let relative_str = relative.to_string_lossy().replace('\\', "/");
            let relative_lower = relative_str.to_lowercase();

            if path.is_dir() {
                // 제외 토큰이 경로에 등장하면 하위 전체를 버린다
                if rules
                    .exclude
                    .iter()
                    .any(|token| relative_lower.contains(token))
                {
                    continue;
                }
                stack.push(path);
                continue;
            }

            if !rules
                .extensions
                .iter()
                .any(|ext| relative_lower.ends_with(ext))
            {
                continue;
            }
            if !rules
                .roots
                .iter()
                .any(|prefix| relative_lower.starts_with(prefix))
            {
                continue;
            }
            if rules
                .exclude
                .iter()
                .any(|token| relative_lower.contains(token))
            {
                continue;
            }

            out.push(relative_str);
        }
    }

    out.sort();
    Ok(out)
}
