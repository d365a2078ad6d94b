use {
    super::*,
    clap::builder::styling::{AnsiColor, Effects, Styles},
    tokio::task::JoinSet,
};

#[derive(Debug, Parser)]
#[command(
  version,
  styles = Styles::styled()
    .error(AnsiColor::Red.on_default() | Effects::BOLD)
    .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
    .invalid(AnsiColor::Red.on_default())
    .literal(AnsiColor::Blue.on_default())
    .placeholder(AnsiColor::Cyan.on_default())
    .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
    .valid(AnsiColor::Green.on_default()),
)]
pub(crate) struct Arguments {
    /// Path to the JSON configuration file.
    #[arg(short, long)]
    pub(crate) config: PathBuf,

    /// Directory to write rolling log files to. Logs go to stderr if omitted.
    #[arg(short, long)]
    pub(crate) logdir: Option<String>,
}

impl Arguments {
    pub(crate) async fn run(self, cancel_token: CancellationToken) -> Result {
        let config = AgentConfig::load(&self.config)?;
        let settings = Arc::new(Settings::from_config(config).context("failed to build settings")?);

        let mut tasks = JoinSet::new();
        let mut upstreams = Vec::with_capacity(settings.upstreams().len());

        for upstream_settings in settings.upstreams() {
            let (handle, events) = agent::UpstreamHandle::connect(
                upstream_settings.address.clone(),
                upstream_settings.username.clone(),
                upstream_settings.password.clone(),
                settings.timeout(),
            )
            .await
            .with_context(|| format!("failed to connect to upstream {}", upstream_settings.address))?;

            handle
                .handshake()
                .await
                .with_context(|| format!("failed to authenticate with upstream {}", upstream_settings.address))?;

            tasks.spawn(handle.clone().run(events, cancel_token.child_token()));
            upstreams.push(handle);
        }

        let server = Arc::new(agent::ProxyServer::new(settings, upstreams));

        server
            .wait_for_availability()
            .await
            .context("no upstream became available at startup")?;

        server.run(cancel_token, &mut tasks).await?;

        while tasks.join_next().await.is_some() {}

        Ok(())
    }
}
