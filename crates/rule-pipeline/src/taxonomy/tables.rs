//! 분류 테이블 — 플랫폼 / 이벤트 카테고리 / 데이터 소스
//!
//! 테이블은 `const` 슬라이스로 선언 순서가 곧 우선순위입니다.
//! 키워드 점수가 동점일 때는 먼저 선언된 항목이 이깁니다 (결정적 타이브레이크).

/// 플랫폼 항목 — 로그를 생성하는 구체적 제품/기술
pub struct PlatformSpec {
    /// 표준 플랫폼 ID
    pub id: &'static str,
    /// 표시 이름
    pub display_name: &'static str,
    /// 플랫폼 그룹 (endpoint, cloud, saas, network, email, edr, container)
    pub group: &'static str,
    /// 검색 텍스트에서 이 플랫폼을 가리키는 키워드
    pub keywords: &'static [&'static str],
}

pub const PLATFORMS: &[PlatformSpec] = &[
    // 엔드포인트 OS
    PlatformSpec {
        id: "windows",
        display_name: "Windows",
        group: "endpoint",
        keywords: &[
            "windows", "win", "winlogbeat", "sysmon", "microsoft-windows", "powershell", "cmd",
            "wmi", "msiexec", "certutil", "regsvr32", "wscript", "cscript", "mshta", "rundll32",
            "bits",
        ],
    },
    PlatformSpec {
        id: "linux",
        display_name: "Linux",
        group: "endpoint",
        keywords: &[
            "linux", "unix", "auditd", "syslog", "systemd", "journald", "bash", "cron", "ssh",
            "sudo", "apt", "yum", "rpm", "deb", "iptables", "selinux", "apparmor",
        ],
    },
    PlatformSpec {
        id: "macos",
        display_name: "macOS",
        group: "endpoint",
        keywords: &[
            "macos", "mac", "osx", "apple", "darwin", "unified_log", "launchd", "spotlight",
            "gatekeeper", "xprotect",
        ],
    },
    // 클라우드 (IaaS/PaaS)
    PlatformSpec {
        id: "aws",
        display_name: "AWS",
        group: "cloud",
        keywords: &[
            "aws", "amazon", "cloudtrail", "cloudwatch", "guardduty", "s3", "ec2", "iam",
            "lambda", "eks", "ecs", "rds", "vpc",
        ],
    },
    PlatformSpec {
        id: "azure",
        display_name: "Azure",
        group: "cloud",
        keywords: &[
            "azure", "microsoft-azure", "azure_activity", "azure_monitor", "azure_sentinel",
            "entra", "aad", "azure_ad", "azure_storage", "azure_vm", "azure_keyvault",
            "azure_network",
        ],
    },
    PlatformSpec {
        id: "gcp",
        display_name: "Google Cloud",
        group: "cloud",
        keywords: &[
            "gcp", "google_cloud", "google-cloud", "gcp_audit", "gce", "gke", "bigquery", "gcs",
            "cloud_functions",
        ],
    },
    // SaaS — 아이덴티티/협업
    PlatformSpec {
        id: "microsoft_365",
        display_name: "Microsoft 365",
        group: "saas",
        keywords: &[
            "o365", "office365", "m365", "microsoft_365", "microsoft365", "sharepoint",
            "onedrive", "teams", "exchange_online", "defender_365", "microsoft_defender",
        ],
    },
    PlatformSpec {
        id: "okta",
        display_name: "Okta",
        group: "saas",
        keywords: &["okta", "okta_system", "okta_auth", "okta_sso"],
    },
    PlatformSpec {
        id: "google_workspace",
        display_name: "Google Workspace",
        group: "saas",
        keywords: &[
            "google_workspace", "gsuite", "g_suite", "gmail", "google_drive", "google_admin",
            "google_meet",
        ],
    },
    PlatformSpec {
        id: "duo",
        display_name: "Cisco Duo",
        group: "saas",
        keywords: &["duo", "cisco_duo", "duo_security", "duo_mfa"],
    },
    PlatformSpec {
        id: "onelogin",
        display_name: "OneLogin",
        group: "saas",
        keywords: &["onelogin", "one_login"],
    },
    PlatformSpec {
        id: "auth0",
        display_name: "Auth0",
        group: "saas",
        keywords: &["auth0"],
    },
    PlatformSpec {
        id: "github",
        display_name: "GitHub",
        group: "saas",
        keywords: &["github", "github_audit", "github_actions"],
    },
    PlatformSpec {
        id: "salesforce",
        display_name: "Salesforce",
        group: "saas",
        keywords: &["salesforce", "sfdc"],
    },
    PlatformSpec {
        id: "slack",
        display_name: "Slack",
        group: "saas",
        keywords: &["slack", "slack_audit"],
    },
    PlatformSpec {
        id: "zoom",
        display_name: "Zoom",
        group: "saas",
        keywords: &["zoom", "zoom_meeting"],
    },
    // 네트워크 보안 — 방화벽
    PlatformSpec {
        id: "palo_alto",
        display_name: "Palo Alto",
        group: "network",
        keywords: &[
            "paloalto", "palo_alto", "pan", "pan-os", "panw", "palo_alto_networks", "prisma",
        ],
    },
    PlatformSpec {
        id: "fortigate",
        display_name: "FortiGate",
        group: "network",
        keywords: &["fortinet", "fortigate", "forti", "fortios", "fortianalyzer"],
    },
    PlatformSpec {
        id: "cisco_asa",
        display_name: "Cisco ASA",
        group: "network",
        keywords: &["cisco_asa", "asa", "cisco_firewall", "cisco_ftd"],
    },
    PlatformSpec {
        id: "checkpoint",
        display_name: "Check Point",
        group: "network",
        keywords: &["checkpoint", "check_point", "smartconsole"],
    },
    // 네트워크 보안 — 프록시/웹 게이트웨이
    PlatformSpec {
        id: "zscaler",
        display_name: "Zscaler",
        group: "network",
        keywords: &["zscaler", "zia", "zpa", "zscaler_internet_access"],
    },
    PlatformSpec {
        id: "cisco_umbrella",
        display_name: "Cisco Umbrella",
        group: "network",
        keywords: &["umbrella", "cisco_umbrella", "opendns"],
    },
    PlatformSpec {
        id: "bluecoat",
        display_name: "Symantec ProxySG",
        group: "network",
        keywords: &["bluecoat", "proxysg", "symantec_proxy"],
    },
    // 네트워크 보안 — IDS/IPS
    PlatformSpec {
        id: "suricata",
        display_name: "Suricata",
        group: "network",
        keywords: &["suricata", "suricata_ids"],
    },
    PlatformSpec {
        id: "snort",
        display_name: "Snort",
        group: "network",
        keywords: &["snort", "snort_ids"],
    },
    PlatformSpec {
        id: "zeek",
        display_name: "Zeek",
        group: "network",
        keywords: &["zeek", "bro", "zeek_logs"],
    },
    // 이메일 보안
    PlatformSpec {
        id: "exchange",
        display_name: "Microsoft Exchange",
        group: "email",
        keywords: &[
            "exchange", "microsoft_exchange", "exchange_server", "exchange_online", "owa",
        ],
    },
    PlatformSpec {
        id: "proofpoint",
        display_name: "Proofpoint",
        group: "email",
        keywords: &["proofpoint", "proofpoint_tap", "proofpoint_pod"],
    },
    PlatformSpec {
        id: "mimecast",
        display_name: "Mimecast",
        group: "email",
        keywords: &["mimecast"],
    },
    // EDR/XDR
    PlatformSpec {
        id: "crowdstrike",
        display_name: "CrowdStrike",
        group: "edr",
        keywords: &["crowdstrike", "falcon", "cs_falcon", "crowdstrike_falcon"],
    },
    PlatformSpec {
        id: "defender_endpoint",
        display_name: "Defender for Endpoint",
        group: "edr",
        keywords: &[
            "mde", "wdatp", "defender", "microsoft_defender", "defender_for_endpoint",
            "microsoft_defender_endpoint",
        ],
    },
    PlatformSpec {
        id: "sentinelone",
        display_name: "SentinelOne",
        group: "edr",
        keywords: &["sentinelone", "s1", "sentinel_one"],
    },
    PlatformSpec {
        id: "carbon_black",
        display_name: "Carbon Black",
        group: "edr",
        keywords: &["carbon_black", "carbonblack", "cb", "vmware_carbon_black"],
    },
    // 컨테이너/쿠버네티스
    PlatformSpec {
        id: "kubernetes",
        display_name: "Kubernetes",
        group: "container",
        keywords: &["kubernetes", "k8s", "kubectl", "kube", "eks", "aks", "gke"],
    },
    PlatformSpec {
        id: "docker",
        display_name: "Docker",
        group: "container",
        keywords: &["docker", "container", "containerd"],
    },
];

/// 이벤트 카테고리 항목 — 어떤 종류의 텔레메트리인지
///
/// MITRE 전술이 아니라 로그/이벤트 유형을 설명합니다.
pub struct EventCategorySpec {
    /// 표준 카테고리 ID
    pub id: &'static str,
    /// 표시 이름
    pub display_name: &'static str,
    /// 검색 텍스트에서 이 카테고리를 가리키는 키워드
    pub keywords: &'static [&'static str],
}

pub const EVENT_CATEGORIES: &[EventCategorySpec] = &[
    EventCategorySpec {
        id: "process",
        display_name: "Process Activity",
        keywords: &[
            "process_creation", "process_access", "process_termination", "process_start",
            "process_stop", "create_process", "image_load", "driver_load", "process_injection",
            "create_remote_thread", "sysmon_event_1", "sysmon_event_7", "sysmon_event_8",
            "eventid_4688",
        ],
    },
    EventCategorySpec {
        id: "file",
        display_name: "File Activity",
        keywords: &[
            "file_event", "file_creation", "file_modification", "file_delete", "file_access",
            "file_change", "file_rename", "file_write", "file_read", "file_open",
            "sysmon_event_11", "sysmon_event_23", "create_stream_hash", "alternate_data_stream",
        ],
    },
    EventCategorySpec {
        id: "network_connection",
        display_name: "Network Connections",
        keywords: &[
            "network_connection", "socket", "tcp", "udp", "sysmon_event_3", "connection_attempt",
            "established_connection",
        ],
    },
    EventCategorySpec {
        id: "dns",
        display_name: "DNS Activity",
        keywords: &[
            "dns_query", "dns_event", "dns_request", "dns_response", "sysmon_event_22",
            "dns_lookup", "name_resolution",
        ],
    },
    EventCategorySpec {
        id: "http",
        display_name: "Web/HTTP Traffic",
        keywords: &[
            "http", "https", "web", "proxy", "web_proxy", "url", "user_agent", "web_request",
        ],
    },
    EventCategorySpec {
        id: "firewall",
        display_name: "Firewall Events",
        keywords: &[
            "firewall", "fw", "firewall_allow", "firewall_deny", "traffic_flow", "blocked",
            "permitted",
        ],
    },
    EventCategorySpec {
        id: "registry",
        display_name: "Registry Activity",
        keywords: &[
            "registry_event", "registry_add", "registry_delete", "registry_set",
            "registry_value", "registry_key", "sysmon_event_12", "sysmon_event_13",
            "sysmon_event_14", "regkey", "regvalue",
        ],
    },
    EventCategorySpec {
        id: "authentication",
        display_name: "Authentication",
        keywords: &[
            "logon", "logoff", "authentication", "failed_logon", "login", "logout", "credential",
            "session", "token", "kerberos", "ntlm", "ldap_bind", "mfa", "password",
            "eventid_4624", "eventid_4625", "eventid_4648",
        ],
    },
    EventCategorySpec {
        id: "api_activity",
        display_name: "API Activity",
        keywords: &[
            "api", "api_call", "management_event", "control_plane", "admin_activity",
            "cloudtrail", "audit_log",
        ],
    },
    EventCategorySpec {
        id: "email",
        display_name: "Email Events",
        keywords: &[
            "email", "mail", "smtp", "message_trace", "email_received", "email_sent",
            "attachment", "phishing", "spam",
        ],
    },
    EventCategorySpec {
        id: "identity_management",
        display_name: "Identity Management",
        keywords: &[
            "user_created", "user_deleted", "group_membership", "role_assignment",
            "permission_change", "privilege_change", "identity", "iam",
        ],
    },
    EventCategorySpec {
        id: "configuration_change",
        display_name: "Configuration Changes",
        keywords: &[
            "config_change", "policy_change", "setting_change", "configuration", "audit_policy",
            "system_config",
        ],
    },
    EventCategorySpec {
        id: "scheduled_task",
        display_name: "Scheduled Tasks",
        keywords: &[
            "scheduled_task", "cron", "at_job", "task_scheduler", "schtasks", "launchd",
        ],
    },
    EventCategorySpec {
        id: "service",
        display_name: "Service Events",
        keywords: &[
            "service_install", "service_start", "service_stop", "service_created",
            "sysmon_event_6", "systemd_service",
        ],
    },
    EventCategorySpec {
        id: "pipe",
        display_name: "Named Pipes",
        keywords: &[
            "pipe_created", "pipe_connected", "named_pipe", "sysmon_event_17", "sysmon_event_18",
        ],
    },
    EventCategorySpec {
        id: "wmi",
        display_name: "WMI Events",
        keywords: &[
            "wmi", "wmi_event", "sysmon_event_19", "sysmon_event_20", "sysmon_event_21",
            "wmi_filter", "wmi_consumer",
        ],
    },
];

/// 데이터 소스 항목 — 플랫폼/카테고리 연관이 알려진 구체적 수집원
pub struct DataSourceSpec {
    /// 표준 데이터 소스 ID
    pub id: &'static str,
    /// 이 수집원이 속한 플랫폼
    pub platform: &'static str,
    /// 표시 이름
    pub display_name: &'static str,
}

pub const DATA_SOURCES: &[DataSourceSpec] = &[
    // Windows
    DataSourceSpec { id: "sysmon", platform: "windows", display_name: "Sysmon" },
    DataSourceSpec { id: "security", platform: "windows", display_name: "Windows Security Log" },
    DataSourceSpec { id: "powershell", platform: "windows", display_name: "PowerShell" },
    DataSourceSpec { id: "winlogbeat", platform: "windows", display_name: "Winlogbeat" },
    // Linux
    DataSourceSpec { id: "auditd", platform: "linux", display_name: "Linux Auditd" },
    DataSourceSpec { id: "syslog", platform: "linux", display_name: "Syslog" },
    // 클라우드
    DataSourceSpec { id: "cloudtrail", platform: "aws", display_name: "AWS CloudTrail" },
    DataSourceSpec { id: "azure_activity", platform: "azure", display_name: "Azure Activity Log" },
    DataSourceSpec { id: "gcp_audit", platform: "gcp", display_name: "GCP Audit Logs" },
    // 네트워크
    DataSourceSpec { id: "zeek_conn", platform: "zeek", display_name: "Zeek Connection Logs" },
    DataSourceSpec { id: "zeek_dns", platform: "zeek", display_name: "Zeek DNS Logs" },
    DataSourceSpec { id: "zeek_http", platform: "zeek", display_name: "Zeek HTTP Logs" },
];
