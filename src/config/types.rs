use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::phase::{AgentDefinition, PipelineProfile};
use crate::stream::fallback::FallbackTiming;

/// Environment variable holding the backend base address.
pub const API_URL_ENV: &str = "AGENTDECK_API_URL";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 30;

/// On-disk configuration. Every section is optional.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ConsoleConfig {
    pub backend: Option<BackendConfig>,
    pub pipeline: Option<PipelineConfig>,
    pub fallback: Option<FallbackTiming>,
    pub operator: Option<OperatorConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub stream_timeout_secs: Option<u64>,
    pub allow_fallback: Option<bool>,
    /// Running as a deployed client: local addresses are treated as unreachable.
    pub deployed: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PipelineConfig {
    pub profile: Option<PipelineProfile>,
    pub agents: Option<Vec<AgentDefinition>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OperatorConfig {
    pub name: Option<String>,
}

/// Values given on the command line; they win over env and file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub allow_fallback: Option<bool>,
    pub profile: Option<PipelineProfile>,
    pub operator: Option<String>,
}

/// Where live calls would go, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendAvailability {
    Unconfigured,
    /// Points at a loopback address while running deployed.
    LocalInDeployment(String),
    Configured(String),
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: Option<String>,
    pub request_timeout: Duration,
    pub stream_timeout: Duration,
    pub allow_fallback: bool,
    pub deployed: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            stream_timeout: Duration::from_secs(DEFAULT_STREAM_TIMEOUT_SECS),
            allow_fallback: true,
            deployed: false,
        }
    }
}

impl BackendSettings {
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(Some(base_url)),
            ..Default::default()
        }
    }

    pub fn availability(&self) -> BackendAvailability {
        match &self.base_url {
            None => BackendAvailability::Unconfigured,
            Some(url) if self.deployed && is_local_address(url) => {
                BackendAvailability::LocalInDeployment(url.clone())
            }
            Some(url) => BackendAvailability::Configured(url.clone()),
        }
    }

    /// Full URL for a backend route, or `None` when no backend is configured.
    pub fn endpoint(&self, path: &str) -> Option<String> {
        self.base_url.as_ref().map(|base| format!("{}{}", base, path))
    }
}

/// Fully resolved settings the console runs with.
#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    pub backend: BackendSettings,
    pub profile: PipelineProfile,
    pub agents: Vec<AgentDefinition>,
    pub fallback: FallbackTiming,
    pub operator: String,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        let profile = PipelineProfile::default();
        Self {
            backend: BackendSettings::default(),
            profile,
            agents: profile.agents(),
            fallback: FallbackTiming::default(),
            operator: "operator".to_string(),
        }
    }
}

impl ConsoleSettings {
    /// Merge CLI overrides, the environment and the config file, in that
    /// order of precedence.
    pub fn resolve(file: Option<&ConsoleConfig>, overrides: &Overrides) -> Self {
        Self::resolve_with_env(file, overrides, std::env::var(API_URL_ENV).ok())
    }

    pub fn resolve_with_env(
        file: Option<&ConsoleConfig>,
        overrides: &Overrides,
        env_url: Option<String>,
    ) -> Self {
        let backend_file = file.and_then(|c| c.backend.clone()).unwrap_or_default();
        let pipeline_file = file.and_then(|c| c.pipeline.clone()).unwrap_or_default();

        let base_url = normalize_base_url(overrides.api_url.as_deref())
            .or_else(|| normalize_base_url(env_url.as_deref()))
            .or_else(|| normalize_base_url(backend_file.base_url.as_deref()));

        let backend = BackendSettings {
            base_url,
            request_timeout: Duration::from_secs(
                backend_file.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            stream_timeout: Duration::from_secs(
                backend_file.stream_timeout_secs.unwrap_or(DEFAULT_STREAM_TIMEOUT_SECS),
            ),
            allow_fallback: overrides
                .allow_fallback
                .or(backend_file.allow_fallback)
                .unwrap_or(true),
            deployed: backend_file.deployed.unwrap_or(false),
        };

        let profile = overrides
            .profile
            .or(pipeline_file.profile)
            .unwrap_or_default();
        let agents = match (overrides.profile, pipeline_file.agents) {
            (None, Some(custom)) if !custom.is_empty() => custom,
            _ => profile.agents(),
        };

        let operator = overrides
            .operator
            .clone()
            .or_else(|| file.and_then(|c| c.operator.as_ref()?.name.clone()))
            .unwrap_or_else(|| "operator".to_string());

        Self {
            backend,
            profile,
            agents,
            fallback: file.and_then(|c| c.fallback.clone()).unwrap_or_default(),
            operator,
        }
    }
}

/// Trim whitespace and trailing slashes; empty means unset.
pub fn normalize_base_url(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn is_local_address(url: &str) -> bool {
    let host = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.host_str().map(|h| h.to_string()),
        Err(_) => None,
    };
    match host {
        Some(host) => {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            host == "localhost"
                || host.ends_with(".localhost")
                || host == "0.0.0.0"
                || host == "::1"
                || host.starts_with("127.")
        }
        None => url.contains("localhost"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url(Some("https://api.example.com/")), Some("https://api.example.com".into()));
        assert_eq!(normalize_base_url(Some("  ")), None);
        assert_eq!(normalize_base_url(None), None);
    }

    #[test]
    fn test_unconfigured_by_default() {
        let settings = ConsoleSettings::resolve_with_env(None, &Overrides::default(), None);
        assert_eq!(settings.backend.availability(), BackendAvailability::Unconfigured);
        assert!(settings.backend.allow_fallback);
        assert_eq!(settings.agents.len(), 4);
        assert_eq!(settings.operator, "operator");
        assert!(settings.backend.endpoint("/health").is_none());
    }

    #[test]
    fn test_precedence_cli_env_file() {
        let file = ConsoleConfig {
            backend: Some(BackendConfig {
                base_url: Some("https://file.example.com".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let from_file = ConsoleSettings::resolve_with_env(Some(&file), &Overrides::default(), None);
        assert_eq!(from_file.backend.base_url.as_deref(), Some("https://file.example.com"));

        let from_env = ConsoleSettings::resolve_with_env(
            Some(&file), &Overrides::default(), Some("https://env.example.com/".into()),
        );
        assert_eq!(from_env.backend.base_url.as_deref(), Some("https://env.example.com"));

        let overrides = Overrides { api_url: Some("https://cli.example.com".into()), ..Default::default() };
        let from_cli = ConsoleSettings::resolve_with_env(Some(&file), &overrides, Some("https://env.example.com".into()));
        assert_eq!(from_cli.backend.base_url.as_deref(), Some("https://cli.example.com"));
        assert_eq!(from_cli.backend.endpoint("/health").as_deref(), Some("https://cli.example.com/health"));
    }

    #[test]
    fn test_local_address_in_deployment() {
        let mut backend = BackendSettings::with_base_url("http://localhost:8000");
        assert_eq!(backend.availability(), BackendAvailability::Configured("http://localhost:8000".into()));
        backend.deployed = true;
        assert!(matches!(backend.availability(), BackendAvailability::LocalInDeployment(_)));
    }

    #[test]
    fn test_is_local_address() {
        assert!(is_local_address("http://127.0.0.1:9000"));
        assert!(is_local_address("http://[::1]:80"));
        assert!(is_local_address("http://localhost"));
        assert!(!is_local_address("https://backend.up.railway.app"));
    }

    #[test]
    fn test_custom_agents_and_operator_from_file() {
        let file: ConsoleConfig = serde_yaml::from_str(
            "pipeline:\n  agents:\n    - name: triage\n      label: TriageAgent\n    - name: fix\n      label: FixAgent\noperator:\n  name: alice\n",
        ).unwrap();
        let settings = ConsoleSettings::resolve_with_env(Some(&file), &Overrides::default(), None);
        assert_eq!(settings.agents.len(), 2);
        assert_eq!(settings.agents[0].name, "triage");
        assert_eq!(settings.operator, "alice");
    }

    #[test]
    fn test_profile_override_replaces_custom_agents() {
        let file: ConsoleConfig = serde_yaml::from_str(
            "pipeline:\n  agents:\n    - name: triage\n      label: TriageAgent\n",
        ).unwrap();
        let overrides = Overrides { profile: Some(PipelineProfile::Ops), ..Default::default() };
        let settings = ConsoleSettings::resolve_with_env(Some(&file), &overrides, None);
        assert_eq!(settings.agents[0].name, "monitor");
    }
}
