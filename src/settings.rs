use super::*;

/// Runtime configuration, derived from [`AgentConfig`] once at startup. Holds parsed
/// and validated values rather than the raw JSON shape.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    address: String,
    port: u16,
    upstreams: Vec<UpstreamSettings>,
    timeout: Duration,
    always_keep_downstream_connected: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct UpstreamSettings {
    pub(crate) address: String,
    pub(crate) username: Username,
    pub(crate) password: Option<String>,
}

impl Settings {
    pub(crate) fn from_config(config: AgentConfig) -> Result<Self> {
        ensure!(config.port != 0, "port must be nonzero");

        let upstreams = config
            .upstreams
            .into_iter()
            .map(|upstream| UpstreamSettings {
                address: upstream.address,
                username: Username::new(upstream.username),
                password: upstream.password,
            })
            .collect();

        Ok(Self {
            address: config.address,
            port: config.port,
            upstreams,
            timeout: Duration::from_secs(config.timeout_secs),
            always_keep_downstream_connected: config.always_keep_downstream_connected,
        })
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    pub(crate) fn upstreams(&self) -> &[UpstreamSettings] {
        &self.upstreams
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn always_keep_downstream_connected(&self) -> bool {
        self.always_keep_downstream_connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> AgentConfig {
        serde_json::from_str(
            r#"{
                "address": "127.0.0.1",
                "port": 3333,
                "upstreams": [
                    {"address": "pool1:3333", "username": "alice"},
                    {"address": "pool2:3333", "username": "bob", "password": "x"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_settings_from_config() {
        let settings = Settings::from_config(sample_config()).unwrap();

        assert_eq!(settings.address(), "127.0.0.1");
        assert_eq!(settings.port(), 3333);
        assert_eq!(settings.upstreams().len(), 2);
        assert_eq!(settings.upstreams()[1].password.as_deref(), Some("x"));
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = sample_config();
        config.port = 0;
        assert!(Settings::from_config(config).is_err());
    }
}
