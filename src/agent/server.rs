use {
    super::*,
    tokio::{net::TcpListener, task::JoinSet},
};

const WATCHDOG_INTERVAL: Duration = Duration::from_secs(15);
const STARTUP_POLL_INTERVAL: Duration = Duration::from_secs(1);
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the downstream listener and the pool of upstream connections, and fans out
/// accepted connections onto a single-threaded reactor.
pub(crate) struct ProxyServer {
    settings: Arc<Settings>,
    upstreams: Vec<Arc<UpstreamHandle>>,
    session_ids: Mutex<SessionIdPool>,
}

impl ProxyServer {
    pub(crate) fn new(settings: Arc<Settings>, upstreams: Vec<Arc<UpstreamHandle>>) -> Self {
        Self {
            settings,
            upstreams,
            session_ids: Mutex::new(SessionIdPool::new()),
        }
    }

    /// Waits up to [`STARTUP_TIMEOUT`] for at least one upstream to become available.
    pub(crate) async fn wait_for_availability(&self) -> Result<()> {
        let deadline = Instant::now() + STARTUP_TIMEOUT;

        loop {
            for upstream in &self.upstreams {
                if upstream.is_available().await {
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                bail!("no upstream became available within {:?}", STARTUP_TIMEOUT);
            }

            tokio::time::sleep(STARTUP_POLL_INTERVAL).await;
        }
    }

    /// Picks the least-loaded available upstream, or fails if none are usable.
    pub(crate) async fn least_loaded_upstream(&self) -> Result<Arc<UpstreamHandle>> {
        let mut best: Option<(Arc<UpstreamHandle>, usize)> = None;

        for upstream in &self.upstreams {
            if !upstream.is_available().await {
                continue;
            }

            let load = upstream.downstream_count().await;
            if best.as_ref().map(|(_, best_load)| load < *best_load).unwrap_or(true) {
                best = Some((upstream.clone(), load));
            }
        }

        best.map(|(upstream, _)| upstream)
            .ok_or_else(|| anyhow!("no upstream currently available"))
    }

    pub(crate) async fn run(self: Arc<Self>, cancel: CancellationToken, tasks: &mut JoinSet<()>) -> Result<()> {
        let address = self.settings.address();
        let port = self.settings.port();

        let listener = TcpListener::bind((address, port))
            .await
            .with_context(|| format!("failed to bind to {address}:{port}"))?;

        info!("agent listening for downstream miners on {address}:{port}");

        let mut watchdog = tokio::time::interval(WATCHDOG_INTERVAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutting down agent server");
                    break;
                }

                _ = watchdog.tick() => {
                    self.watchdog_tick().await;
                }

                accepted = listener.accept() => {
                    let Ok((stream, addr)) = accepted else {
                        continue;
                    };

                    self.clone().accept(stream, addr, cancel.child_token(), tasks);
                }
            }
        }

        Ok(())
    }

    fn accept(
        self: Arc<Self>,
        stream: tokio::net::TcpStream,
        addr: SocketAddr,
        cancel: CancellationToken,
        tasks: &mut JoinSet<()>,
    ) {
        let server = self;

        tasks.spawn(async move {
            let session_id = {
                let mut ids = server.session_ids.lock().await;
                match ids.alloc() {
                    Some(id) => id,
                    None => {
                        warn!("session id pool exhausted, rejecting {addr}");
                        return;
                    }
                }
            };

            info!("accepted downstream {addr} as session {session_id}");

            let (events_tx, events_rx) = mpsc::channel(32);
            let mut downstream = Downstream::new(session_id, addr, stream, server.clone(), events_tx);

            if let Err(err) = downstream.serve(events_rx, cancel).await {
                error!("downstream {addr} error: {err}");
            }

            server.session_ids.lock().await.free(session_id);
        });
    }

    async fn watchdog_tick(&self) {
        for upstream in &self.upstreams {
            if !upstream.is_connected() {
                warn!("upstream disconnected, reconnection is handled by its own actor");
            }
        }
    }
}
