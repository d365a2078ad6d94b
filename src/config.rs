use super::*;

/// On-disk JSON configuration, deserialized as-is before being turned into a runtime
/// [`Settings`]. Kept separate from `Settings` so defaults and validation live in one
/// place instead of being smeared across `serde` attributes.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AgentConfig {
    #[serde(default = "default_address")]
    pub(crate) address: String,

    #[serde(default = "default_port")]
    pub(crate) port: u16,

    /// Upstream pool endpoints this agent fans out to, e.g. `stratum+tcp://pool:3333`.
    pub(crate) upstreams: Vec<UpstreamConfig>,

    #[serde(default = "default_timeout_secs")]
    pub(crate) timeout_secs: u64,

    #[serde(default)]
    pub(crate) always_keep_downstream_connected: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UpstreamConfig {
    pub(crate) address: String,
    pub(crate) username: String,
    pub(crate) password: Option<String>,
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3333
}

fn default_timeout_secs() -> u64 {
    30
}

impl AgentConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        ensure!(
            !config.upstreams.is_empty(),
            "config must list at least one upstream"
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_missing_fields() {
        let config: AgentConfig = serde_json::from_str(
            r#"{"upstreams": [{"address": "pool:3333", "username": "user"}]}"#,
        )
        .unwrap();

        assert_eq!(config.address, "0.0.0.0");
        assert_eq!(config.port, 3333);
        assert_eq!(config.timeout_secs, 30);
        assert!(!config.always_keep_downstream_connected);
    }

    #[test]
    fn load_rejects_empty_upstream_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"upstreams": []}"#).unwrap();

        let err = AgentConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("at least one upstream"));
    }
}
