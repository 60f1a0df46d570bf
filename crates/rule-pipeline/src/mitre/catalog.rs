//! MITRE ATT&CK 카탈로그 — STIX 번들 파싱 및 인메모리 표현
//!
//! 공식 CTI 저장소의 enterprise-attack STIX 2.1 번들에서
//! 전술(`x-mitre-tactic`)과 기법(`attack-pattern`)을 추출합니다.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use rulewarden_core::error::CatalogError;

/// MITRE ATT&CK 전술
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tactic {
    /// 전술 ID (TA0001 형식)
    pub id: String,
    /// 이름 (예: "Initial Access")
    pub name: String,
    /// 축약 이름 (예: "initial-access")
    pub short_name: String,
    /// attack.mitre.org 페이지 URL
    pub url: String,
    /// 폐기 여부
    #[serde(default)]
    pub deprecated: bool,
}

/// MITRE ATT&CK 기법
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technique {
    /// 기법 ID (T1059 / T1059.001 형식)
    pub id: String,
    /// 이름
    pub name: String,
    /// 연관 전술 ID 목록
    pub tactics: Vec<String>,
    /// attack.mitre.org 페이지 URL
    pub url: Option<String>,
    /// 폐기 여부
    #[serde(default)]
    pub deprecated: bool,
    /// 철회 여부 (다른 기법으로 대체됨)
    #[serde(default)]
    pub revoked: bool,
    /// 서브 기법 여부 (ID에 점 포함)
    #[serde(default)]
    pub is_subtechnique: bool,
}

/// 인메모리 카탈로그
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// 전술 ID → 전술
    pub tactics: HashMap<String, Tactic>,
    /// 기법 ID → 기법
    pub techniques: HashMap<String, Technique>,
}

// --- STIX 번들 역직렬화 구조 ---

#[derive(Deserialize)]
struct StixBundle {
    #[serde(default)]
    objects: Vec<StixObject>,
}

#[derive(Deserialize)]
struct StixObject {
    #[serde(rename = "type")]
    object_type: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "x_mitre_shortname")]
    short_name: String,
    #[serde(default)]
    external_references: Vec<ExternalReference>,
    #[serde(default)]
    kill_chain_phases: Vec<KillChainPhase>,
    #[serde(default, rename = "x_mitre_deprecated")]
    deprecated: bool,
    #[serde(default)]
    revoked: bool,
}

#[derive(Deserialize)]
struct ExternalReference {
    #[serde(default)]
    external_id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct KillChainPhase {
    #[serde(default)]
    kill_chain_name: String,
    #[serde(default)]
    phase_name: String,
}

impl Catalog {
    /// STIX 번들 JSON에서 카탈로그를 파싱합니다.
    ///
    /// 전술 객체가 기법 객체보다 뒤에 나와도 동작하도록 2-패스로 처리합니다.
    pub fn from_stix_bundle(json: &str) -> Result<Self, CatalogError> {
        let bundle: StixBundle =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut tactics = HashMap::new();
        // 전술 축약 이름 → 전술 ID (kill_chain_phases 해석용)
        let mut short_name_to_id: HashMap<String, String> = HashMap::new();

        // 1-패스: 전술
        for obj in &bundle.objects {
            if obj.object_type != "x-mitre-tactic" {
                continue;
            }
            let Some(tactic_id) = obj
                .external_references
                .iter()
                .map(|r| r.external_id.as_str())
                .find(|id| id.starts_with("TA"))
            else {
                continue;
            };
            if obj.name.is_empty() {
                continue;
            }

            short_name_to_id.insert(obj.short_name.clone(), tactic_id.to_owned());
            tactics.insert(
                tactic_id.to_owned(),
                Tactic {
                    id: tactic_id.to_owned(),
                    name: obj.name.clone(),
                    short_name: obj.short_name.clone(),
                    url: format!("https://attack.mitre.org/tactics/{tactic_id}/"),
                    deprecated: obj.deprecated,
                },
            );
        }

        // 2-패스: 기법
        let mut techniques = HashMap::new();
        for obj in &bundle.objects {
            if obj.object_type != "attack-pattern" {
                continue;
            }
            let Some(reference) = obj
                .external_references
                .iter()
                .find(|r| r.external_id.starts_with('T'))
            else {
                continue;
            };
            let technique_id = reference.external_id.clone();

            let technique_tactics: Vec<String> = obj
                .kill_chain_phases
                .iter()
                .filter(|phase| phase.kill_chain_name == "mitre-attack")
                .filter_map(|phase| short_name_to_id.get(&phase.phase_name).cloned())
                .collect();

            let is_subtechnique = technique_id.contains('.');
            techniques.insert(
                technique_id.clone(),
                Technique {
                    url: reference.url.clone().or_else(|| {
                        Some(format!(
                            "https://attack.mitre.org/techniques/{}/",
                            technique_id.replace('.', "/")
                        ))
                    }),
                    id: technique_id,
                    name: obj.name.clone(),
                    tactics: technique_tactics,
                    deprecated: obj.deprecated,
                    revoked: obj.revoked,
                    is_subtechnique,
                },
            );
        }

        Ok(Self {
            tactics,
            techniques,
        })
    }

    /// 원격/캐시 모두 실패했을 때 쓰는 내장 최소 카탈로그
    ///
    /// 14개 전술만 포함하며 기법 목록은 비어 있습니다.
    /// 서비스가 항상 조회 가능해야 하므로 (충실도는 낮아도) 존재합니다.
    pub fn fallback() -> Self {
        const TACTICS: &[(&str, &str, &str)] = &[
            ("TA0043", "Reconnaissance", "reconnaissance"),
            ("TA0042", "Resource Development", "resource-development"),
            ("TA0001", "Initial Access", "initial-access"),
            ("TA0002", "Execution", "execution"),
            ("TA0003", "Persistence", "persistence"),
            ("TA0004", "Privilege Escalation", "privilege-escalation"),
            ("TA0005", "Defense Evasion", "defense-evasion"),
            ("TA0006", "Credential Access", "credential-access"),
            ("TA0007", "Discovery", "discovery"),
            ("TA0008", "Lateral Movement", "lateral-movement"),
            ("TA0009", "Collection", "collection"),
            ("TA0011", "Command and Control", "command-and-control"),
            ("TA0010", "Exfiltration", "exfiltration"),
            ("TA0040", "Impact", "impact"),
        ];

        let tactics = TACTICS
            .iter()
            .map(|(id, name, short_name)| {
                (
                    (*id).to_owned(),
                    Tactic {
                        id: (*id).to_owned(),
                        name: (*name).to_owned(),
                        short_name: (*short_name).to_owned(),
                        url: format!("https://attack.mitre.org/tactics/{id}/"),
                        deprecated: false,
                    },
                )
            })
            .collect();

        Self {
            tactics,
            techniques: HashMap::new(),
        }
    }

    /// 전술과 기법이 모두 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.tactics.is_empty() && self.techniques.is_empty()
    }
}
