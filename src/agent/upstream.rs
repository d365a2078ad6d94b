use {
    super::*,
    std::{
        str::FromStr,
        sync::atomic::{AtomicU64, AtomicU8, Ordering},
    },
    stratum::{Client, ClientConfig},
};

const AVAILABILITY_WINDOW: Duration = Duration::from_secs(300);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum State {
    Init = 0,
    Connected = 1,
    Subscribed = 2,
    Authenticated = 3,
}

/// An upstream pool connection, fanned out to every downstream miner bound to it.
///
/// Owns the rewritten notify template (this agent's own extranonce1 spliced into the
/// coinbase) and the 3-slot job ring used to classify downstream shares as
/// `isTimeChanged`.
pub(crate) struct UpstreamHandle {
    client: Client,
    username: Username,
    state: AtomicU8,
    enonce1: Extranonce,
    enonce2_size: usize,
    pool_default_diff: RwLock<Option<Difficulty>>,
    last_job_received: RwLock<Instant>,
    template: RwLock<Option<Arc<Notify>>>,
    ring: Mutex<JobRing>,
    downstreams: RwLock<HashMap<u16, mpsc::Sender<DownstreamEvent>>>,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

/// What this upstream tells a bound downstream to do.
#[derive(Debug, Clone)]
pub(crate) enum DownstreamEvent {
    Notify(Arc<Notify>),
    SetDifficulty(Difficulty),
}

impl UpstreamHandle {
    pub(crate) async fn connect(
        address: String,
        username: Username,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<(Arc<Self>, EventReceiver)> {
        let mut client = Client::new(ClientConfig {
            address,
            username: username.to_string(),
            password,
            timeout,
        });

        let events = client
            .connect()
            .await
            .context("failed to connect to upstream")?;

        let handle = Arc::new(Self {
            client,
            username,
            state: AtomicU8::new(State::Connected as u8),
            enonce1: Extranonce::generate(4),
            enonce2_size: 8,
            pool_default_diff: RwLock::new(None),
            last_job_received: RwLock::new(Instant::now()),
            template: RwLock::new(None),
            ring: Mutex::new(JobRing::new()),
            downstreams: RwLock::new(HashMap::new()),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        });

        Ok((handle, events))
    }

    /// Runs `mining.subscribe` and `mining.authorize`, negotiating version rolling
    /// along the way, bringing the connection to `Authenticated`.
    pub(crate) async fn handshake(self: &Arc<Self>) -> Result<()> {
        let (subscribed, _, _) = self
            .client
            .subscribe(stratum::USER_AGENT.to_string())
            .await
            .context("mining.subscribe failed")?;

        ensure!(
            subscribed.enonce2_size == 8,
            "upstream extranonce2_size {} unsupported, expected 8",
            subscribed.enonce2_size
        );

        self.state.store(State::Subscribed as u8, Ordering::SeqCst);

        let _ = self
            .client
            .configure(
                vec!["version-rolling".into()],
                Some(Version::from_str("ffffffff").context("invalid version mask literal")?),
            )
            .await;

        self.client
            .authorize()
            .await
            .context("mining.authorize failed")?;

        self.state
            .store(State::Authenticated as u8, Ordering::SeqCst);

        Ok(())
    }

    /// Consumes the upstream's event stream until it disconnects, fanning out notify
    /// and set_difficulty updates to every bound downstream.
    pub(crate) async fn run(self: Arc<Self>, mut events: EventReceiver, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => {
                    match event {
                        Ok(Event::Notify(notify)) => self.handle_notify(notify).await,
                        Ok(Event::SetDifficulty(diff)) => self.handle_set_difficulty(diff).await,
                        Ok(Event::Disconnected) | Err(_) => {
                            warn!("upstream {} disconnected", self.username);
                            self.state.store(State::Connected as u8, Ordering::SeqCst);
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn handle_notify(&self, notify: Notify) {
        let rewritten = Arc::new(rewrite_notify_template(notify, &self.enonce1));

        {
            let mut ring = self.ring.lock().await;
            ring.push(rewritten.job_id, rewritten.ntime);
        }

        *self.template.write().await = Some(rewritten.clone());
        *self.last_job_received.write().await = Instant::now();

        let downstreams = self.downstreams.read().await;
        for sender in downstreams.values() {
            let _ = sender.try_send(DownstreamEvent::Notify(rewritten.clone()));
        }
    }

    async fn handle_set_difficulty(&self, diff: Difficulty) {
        let mut pool_default = self.pool_default_diff.write().await;
        if pool_default.is_none() {
            *pool_default = Some(diff);
        }
    }

    /// Applies a `MINING_SET_DIFF` ex-message from upstream: `diff = 1 << exponent`,
    /// delivered only to the named downstream sessions.
    pub(crate) async fn apply_mining_set_diff(&self, session_ids: &[u16], diff_exponent: u8) {
        let diff = Difficulty::from(1u64 << diff_exponent);
        let downstreams = self.downstreams.read().await;

        for id in session_ids {
            if let Some(sender) = downstreams.get(id) {
                let _ = sender.try_send(DownstreamEvent::SetDifficulty(diff));
            } else {
                warn!("MINING_SET_DIFF referenced unknown session id {id}");
            }
        }
    }

    pub(crate) async fn bind_downstream(&self, session_id: u16, sender: mpsc::Sender<DownstreamEvent>) {
        self.downstreams.write().await.insert(session_id, sender);
    }

    pub(crate) async fn unbind_downstream(&self, session_id: u16) {
        self.downstreams.write().await.remove(&session_id);
    }

    pub(crate) async fn downstream_count(&self) -> usize {
        self.downstreams.read().await.len()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state.load(Ordering::SeqCst) >= State::Connected as u8
    }

    /// True when this upstream can usefully serve downstream traffic: authenticated,
    /// has a nonzero pool difficulty, and has seen a job within the last five minutes.
    pub(crate) async fn is_available(&self) -> bool {
        if self.state.load(Ordering::SeqCst) != State::Authenticated as u8 {
            return false;
        }

        if self.pool_default_diff.read().await.is_none() {
            return false;
        }

        self.template.read().await.is_some()
            && self.last_job_received.read().await.elapsed() < AVAILABILITY_WINDOW
    }

    pub(crate) fn enonce1(&self) -> &Extranonce {
        &self.enonce1
    }

    pub(crate) fn enonce2_size(&self) -> usize {
        self.enonce2_size
    }

    pub(crate) async fn template(&self) -> Option<Arc<Notify>> {
        self.template.read().await.clone()
    }

    pub(crate) async fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) async fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Classifies the share against the job ring, drops it silently if it targets a
    /// fake watchdog job, then relays it upstream via `mining.submit`.
    pub(crate) async fn submit_share(&self, mut share: Share) -> Result<()> {
        {
            let ring = self.ring.lock().await;
            if ring.is_fake(share.job_id) {
                return Ok(());
            }
            share.is_time_changed = ring.is_time_changed(share.job_id, share.ntime);
        }

        match self
            .client
            .submit(
                share.job_id,
                share.extranonce2,
                share.ntime,
                share.nonce,
                share.version_bits,
            )
            .await
        {
            Ok(_) => {
                self.record_accepted().await;
                Ok(())
            }
            Err(err) => {
                self.record_rejected().await;
                Err(anyhow!("share rejected by upstream: {err}"))
            }
        }
    }
}

/// Splits the notify's coinbase1 after the 14th `"` (the quote closing `coinb1`) and
/// splices in 8 hex nibbles of this upstream's own extranonce1, so that a downstream
/// session can further splice its own 8-nibble extranonce1 into the same span.
fn rewrite_notify_template(notify: Notify, enonce1: &Extranonce) -> Notify {
    let coinb1 = notify.coinb1.clone();
    let mut quote_count = 0;
    let mut split_at = coinb1.len();

    for (index, byte) in coinb1.as_bytes().iter().enumerate() {
        if *byte == b'"' {
            quote_count += 1;
            if quote_count == 14 {
                split_at = index + 1;
                break;
            }
        }
    }

    let mut rewritten = coinb1[..split_at].to_string();
    rewritten.push_str(&enonce1.to_hex());
    rewritten.push_str(&coinb1[split_at..]);

    Notify {
        coinb1: rewritten,
        ..notify
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_notify(coinb1: &str) -> Notify {
        Notify {
            job_id: JobId::from(1),
            prevhash: "00".repeat(32).parse().unwrap(),
            coinb1: coinb1.to_string(),
            coinb2: "ffffffff".to_string(),
            merkle_branches: vec![],
            version: Version::from_str("20000000").unwrap(),
            nbits: stratum::Nbits::from_str("1d00ffff").unwrap(),
            ntime: Ntime::from(0x504e86b9),
            clean_jobs: true,
        }
    }

    #[test]
    fn rewrite_splices_after_fourteenth_quote() {
        let mut coinb1 = String::new();
        for i in 0..7 {
            coinb1.push_str(&format!("\"field{i}\""));
        }
        assert_eq!(coinb1.matches('"').count(), 14);

        let enonce1: Extranonce = "deadbeef".parse().unwrap();
        let rewritten = rewrite_notify_template(sample_notify(&coinb1), &enonce1);

        assert!(rewritten.coinb1.starts_with(&coinb1));
        assert!(rewritten.coinb1.ends_with("deadbeef"));
    }

    #[test]
    fn rewrite_appends_when_fewer_than_fourteen_quotes() {
        let coinb1 = "\"a\"".to_string();
        let enonce1: Extranonce = "cafebabe".parse().unwrap();
        let rewritten = rewrite_notify_template(sample_notify(&coinb1), &enonce1);

        assert_eq!(rewritten.coinb1, format!("{coinb1}cafebabe"));
    }
}
