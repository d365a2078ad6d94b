//! The mining-proxy agent: multiplexes many downstream miners onto a small pool of
//! upstream Stratum connections.
use {
    crate::settings::Settings,
    anyhow::{Context, Result, anyhow, bail, ensure},
    futures::{SinkExt, StreamExt},
    serde_json::json,
    snafu::{ResultExt, Snafu},
    std::{
        collections::HashMap,
        net::SocketAddr,
        sync::Arc,
        time::{Duration, Instant},
    },
    stratum::{
        Difficulty, Event, EventReceiver, Extranonce, JobId, Message, Notify, Nonce, Ntime,
        SetDifficulty, Submit, Username, Version,
    },
    tokio::sync::{Mutex, RwLock, mpsc},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

pub(crate) const MAX_MESSAGE_SIZE: usize = 32 * 1024;

pub(crate) use {
    dialect::Dialect,
    downstream::Downstream,
    jobs::JobRing,
    server::ProxyServer,
    session_id::SessionIdPool,
    share::Share,
    upstream::{DownstreamEvent, UpstreamHandle},
    wire::{Command, ExMessage, Frame, WireCodec},
};

mod dialect;
mod downstream;
mod jobs;
mod server;
mod session_id;
mod share;
mod upstream;
mod wire;
