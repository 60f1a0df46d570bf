//! Rulewarden CLI — 탐지 규칙 수집/정규화 명령줄 도구

mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};

use rulewarden_core::config::RulewardenConfig;
use rulewarden_rule_pipeline::{FsRuleDiscovery, IngestionService, MitreService};

use store::JsonFileStore;

/// Rulewarden — 멀티 벤더 탐지 규칙 수집/정규화 도구
#[derive(Parser)]
#[command(name = "rulewarden", version, about)]
struct Cli {
    /// 설정 파일 경로
    #[arg(short, long, default_value = "rulewarden.toml")]
    config: String,

    /// 로그 레벨 오버라이드
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 저장소 인제스트 실행
    Ingest {
        /// 저장소 이름 (sigma, elastic, ...) 또는 all
        repository: String,
    },
    /// MITRE ATT&CK 카탈로그 관련 명령
    Mitre {
        #[command(subcommand)]
        action: MitreAction,
    },
    /// 설정 관련 명령
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum MitreAction {
    /// 카탈로그를 원격에서 갱신
    Refresh,
    /// 기법 ID를 현행 ID로 해석
    Map {
        /// 기법 ID (예: T1086)
        technique: String,
    },
    /// 기법 목록의 연관 전술 조회
    Tactics {
        /// 기법 ID 목록
        techniques: Vec<String>,
    },
    /// 카탈로그 상태 출력
    Stats,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 설정 파일 검증
    Validate,
    /// 유효 설정 출력 (파일 + 환경변수 + 기본값)
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 설정 파일이 없으면 기본값으로 동작
    let config = match RulewardenConfig::load(&cli.config).await {
        Ok(config) => config,
        Err(rulewarden_core::RulewardenError::Config(
            rulewarden_core::ConfigError::FileNotFound { path },
        )) => {
            let mut config = RulewardenConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            eprintln!("config file not found at {path}, using defaults");
            config
        }
        Err(e) => return Err(e.into()),
    };

    init_logging(&config, cli.log_level.as_deref());
    tracing::info!(config = %cli.config, "rulewarden starting");

    match cli.command {
        Commands::Ingest { repository } => {
            let service = IngestionService::new(
                config.clone(),
                FsRuleDiscovery::new(config.general.data_dir.clone()),
                JsonFileStore::new(&config.general.data_dir),
            );

            if repository == "all" {
                for (name, result) in service.ingest_all().await {
                    match result {
                        Ok(stats) => print_report(&name, &stats.report(config.ingest.error_sample_limit))?,
                        Err(e) => eprintln!("{name}: ingestion failed: {e}"),
                    }
                }
            } else {
                let stats = service
                    .ingest(&repository)
                    .await
                    .map_err(|e| anyhow::anyhow!("ingestion failed: {e}"))?;
                print_report(&repository, &stats.report(config.ingest.error_sample_limit))?;
            }
        }
        Commands::Mitre { action } => {
            let service = MitreService::new(config.mitre.clone());
            handle_mitre_command(&service, action).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate => {
                config.validate()?;
                println!("configuration is valid");
            }
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        },
    }

    Ok(())
}

fn init_logging(config: &RulewardenConfig, override_level: Option<&str>) {
    let level = override_level.unwrap_or(&config.general.log_level);
    let builder = tracing_subscriber::fmt().with_env_filter(level);
    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_report(
    name: &str,
    report: &rulewarden_rule_pipeline::IngestionReport,
) -> Result<()> {
    println!("== {name} ==");
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

async fn handle_mitre_command(service: &MitreService, action: MitreAction) -> Result<()> {
    match action {
        MitreAction::Refresh => {
            let refreshed = service.refresh().await;
            let stats = service.stats().await;
            if refreshed {
                println!(
                    "catalog refreshed: {} tactics, {} techniques",
                    stats.tactics_count, stats.techniques_count
                );
            } else {
                println!(
                    "remote fetch failed, serving degraded catalog: {} tactics, {} techniques",
                    stats.tactics_count, stats.techniques_count
                );
            }
        }
        MitreAction::Map { technique } => {
            service.ensure_loaded().await;
            match service.map_technique(&technique).await {
                Some(mapped) if mapped == technique => {
                    println!("{technique} is current");
                }
                Some(mapped) => {
                    println!("{technique} -> {mapped}");
                }
                None => {
                    println!("{technique} is unknown to the catalog");
                }
            }
        }
        MitreAction::Tactics { techniques } => {
            service.ensure_loaded().await;
            let tactics = service.tactics_for(&techniques).await;
            if tactics.is_empty() {
                println!("no associated tactics found");
            } else {
                for tactic in tactics {
                    let name = service.tactic_name(&tactic).await;
                    println!("{tactic}  {name}");
                }
            }
        }
        MitreAction::Stats => {
            service.ensure_loaded().await;
            println!("{}", serde_json::to_string_pretty(&service.stats().await)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ingest_command() {
        let cli = Cli::try_parse_from(["rulewarden", "ingest", "sigma"]).unwrap();
        match cli.command {
            Commands::Ingest { repository } => assert_eq!(repository, "sigma"),
            _ => panic!("expected Ingest command"),
        }
    }

    #[test]
    fn parse_mitre_map_command() {
        let cli = Cli::try_parse_from(["rulewarden", "mitre", "map", "T1086"]).unwrap();
        match cli.command {
            Commands::Mitre {
                action: MitreAction::Map { technique },
            } => assert_eq!(technique, "T1086"),
            _ => panic!("expected Mitre Map command"),
        }
    }

    #[test]
    fn parse_mitre_tactics_command() {
        let cli =
            Cli::try_parse_from(["rulewarden", "mitre", "tactics", "T1059", "T1027"]).unwrap();
        match cli.command {
            Commands::Mitre {
                action: MitreAction::Tactics { techniques },
            } => assert_eq!(techniques, vec!["T1059", "T1027"]),
            _ => panic!("expected Mitre Tactics command"),
        }
    }

    #[test]
    fn parse_custom_config_path() {
        let cli =
            Cli::try_parse_from(["rulewarden", "-c", "/etc/rulewarden.toml", "config", "show"])
                .unwrap();
        assert_eq!(cli.config, "/etc/rulewarden.toml");
    }

    #[test]
    fn missing_command_fails() {
        assert!(Cli::try_parse_from(["rulewarden"]).is_err());
    }
}
