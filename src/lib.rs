use {
    anyhow::{Context, Error, ensure},
    arguments::Arguments,
    clap::Parser,
    config::AgentConfig,
    serde::Deserialize,
    settings::Settings,
    std::{
        fs,
        path::{Path, PathBuf},
        process,
        sync::Arc,
        time::Duration,
    },
    stratum::Username,
    tokio_util::sync::CancellationToken,
    tracing::info,
    tracing_subscriber::EnvFilter,
};

mod agent;
mod arguments;
mod config;
mod logging;
mod settings;
mod signal;

pub const USER_AGENT: &str = "btccom-agent/1.0.0-su";

type Result<T = (), E = Error> = std::result::Result<T, E>;

pub async fn run() -> Result {
    let arguments = Arguments::parse();
    let _guard = logging::init(arguments.logdir.as_deref());
    let cancel_token = signal::setup_signal_handler();

    arguments.run(cancel_token).await
}

pub fn main() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    match runtime.block_on(run()) {
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
        Ok(()) => process::exit(0),
    }
}
