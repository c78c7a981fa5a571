use std::path::Path;

use crate::errors::ConsoleError;
use super::types::{ConsoleConfig, normalize_base_url};

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<ConsoleConfig, ConsoleError> {
    if !path.exists() {
        return Err(ConsoleError::Configuration(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(ConsoleError::Configuration("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

pub fn parse_config_str(content: &str) -> Result<ConsoleConfig, ConsoleError> {
    // An empty file is a valid, all-defaults config.
    if content.trim().is_empty() {
        return Ok(ConsoleConfig::default());
    }
    let config: ConsoleConfig = serde_yaml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Semantic checks serde cannot express.
pub fn validate(config: &ConsoleConfig) -> Result<(), ConsoleError> {
    if let Some(backend) = &config.backend {
        if let Some(url) = normalize_base_url(backend.base_url.as_deref()) {
            let parsed = reqwest::Url::parse(&url).map_err(|e| {
                ConsoleError::Configuration(format!("Invalid backend.base_url '{}': {}", url, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConsoleError::Configuration(format!(
                    "backend.base_url must use http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }
        if backend.request_timeout_secs == Some(0) {
            return Err(ConsoleError::Configuration(
                "backend.request_timeout_secs must be greater than zero".into(),
            ));
        }
        if backend.stream_timeout_secs == Some(0) {
            return Err(ConsoleError::Configuration(
                "backend.stream_timeout_secs must be greater than zero".into(),
            ));
        }
    }

    if let Some(pipeline) = &config.pipeline {
        if let Some(agents) = &pipeline.agents {
            if agents.is_empty() {
                return Err(ConsoleError::Configuration(
                    "pipeline.agents must list at least one agent".into(),
                ));
            }
            for (i, agent) in agents.iter().enumerate() {
                if agent.name.trim().is_empty() {
                    return Err(ConsoleError::Configuration(format!(
                        "pipeline.agents[{}] has an empty name",
                        i
                    )));
                }
            }
            let mut seen = std::collections::HashSet::new();
            for agent in agents {
                if !seen.insert(agent.name.to_lowercase()) {
                    return Err(ConsoleError::Configuration(format!(
                        "Duplicate agent name '{}' in pipeline.agents",
                        agent.name
                    )));
                }
            }
        }
    }

    if let Some(operator) = &config.operator {
        if operator.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ConsoleError::Configuration("operator.name must not be blank".into()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_missing_file() {
        let err = parse_config(Path::new("/nonexistent/agentdeck.yaml")).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Configuration(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_oversized_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let line = "# padding padding padding padding padding padding padding padding\n";
        for _ in 0..(MAX_CONFIG_BYTES as usize / line.len() + 2) {
            file.write_all(line.as_bytes()).unwrap();
        }
        let err = parse_config(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("1MB"));
    }

    #[tokio::test]
    async fn test_parse_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "backend:\n  base_url: https://api.example.com/\n  request_timeout_secs: 5\n  deployed: true\npipeline:\n  profile: ops\nfallback:\n  base_delay_ms: 100\n  step_ms: 10\n  gap_ms: 5\noperator:\n  name: dana\n"
        ).unwrap();
        let config = parse_config(file.path()).await.unwrap();
        let backend = config.backend.unwrap();
        assert_eq!(backend.request_timeout_secs, Some(5));
        assert_eq!(backend.deployed, Some(true));
        assert_eq!(config.fallback.unwrap().base_delay_ms, 100);
        assert_eq!(config.operator.unwrap().name.as_deref(), Some("dana"));
    }

    #[test]
    fn test_empty_content_is_default() {
        let config = parse_config_str("  \n").unwrap();
        assert!(config.backend.is_none());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = parse_config_str("backend:\n  request_timeout_secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn test_rejects_malformed_url() {
        assert!(parse_config_str("backend:\n  base_url: not a url\n").is_err());
        assert!(parse_config_str("backend:\n  base_url: ftp://files.example.com\n").is_err());
    }

    #[test]
    fn test_rejects_empty_and_duplicate_agents() {
        assert!(parse_config_str("pipeline:\n  agents: []\n").is_err());
        let dup = "pipeline:\n  agents:\n    - name: fix\n      label: A\n    - name: FIX\n      label: B\n";
        assert!(parse_config_str(dup).unwrap_err().to_string().contains("Duplicate"));
    }

    #[test]
    fn test_unknown_profile_is_yaml_error() {
        let err = parse_config_str("pipeline:\n  profile: finance\n").unwrap_err();
        assert!(matches!(err, ConsoleError::Yaml(_)));
    }
}
