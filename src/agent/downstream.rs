use {
    super::*,
    tokio::net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    tokio_util::codec::{FramedRead, FramedWrite},
};

const READ_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const WRITE_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_AGENT_LEN: usize = 30;
const SUBSCRIPTION_ID: &str = "deadbeefcafebabe";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Connected,
    Subscribed,
    Authenticated,
}

/// One downstream miner connection, bound to a single upstream once it authorizes.
pub(crate) struct Downstream {
    session_id: u16,
    source: SocketAddr,
    reader: FramedRead<OwnedReadHalf, WireCodec>,
    writer: FramedWrite<OwnedWriteHalf, WireCodec>,
    state: State,
    dialect: Dialect,
    user_agent: String,
    username: Option<Username>,
    session_enonce1: Extranonce,
    server: Arc<ProxyServer>,
    events_tx: mpsc::Sender<DownstreamEvent>,
    upstream: Option<Arc<UpstreamHandle>>,
    version_mask: Option<Version>,
    wanted_version_mask: Option<Version>,
    version_rolling_shares_since_loss: u32,
}

impl Downstream {
    pub(crate) fn new(
        session_id: u16,
        source: SocketAddr,
        stream: TcpStream,
        server: Arc<ProxyServer>,
        events_tx: mpsc::Sender<DownstreamEvent>,
    ) -> Self {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        Self {
            session_id,
            source,
            reader: FramedRead::new(read_half, WireCodec::new(MAX_MESSAGE_SIZE)),
            writer: FramedWrite::new(write_half, WireCodec::new(MAX_MESSAGE_SIZE)),
            state: State::Connected,
            dialect: Dialect::Bitcoin,
            user_agent: "unknown".to_string(),
            username: None,
            session_enonce1: session_enonce1_for(session_id),
            server,
            events_tx,
            upstream: None,
            version_mask: None,
            wanted_version_mask: None,
            version_rolling_shares_since_loss: 0,
        }
    }

    pub(crate) async fn serve(
        &mut self,
        mut upstream_events: mpsc::Receiver<DownstreamEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                _ = tokio::time::sleep(READ_TIMEOUT) => {
                    info!("read timeout for {}, closing", self.source);
                    break;
                }

                frame = self.reader.next() => {
                    let Some(frame) = frame else {
                        info!("{} disconnected", self.source);
                        break;
                    };

                    let Frame::Line(line) = frame.context("wire read error")? else {
                        warn!("ignoring unexpected ex-message frame from downstream {}", self.source);
                        continue;
                    };

                    let message: Message = serde_json::from_str(&line)
                        .with_context(|| format!("invalid stratum message from {}: {line:?}", self.source))?;

                    let Message::Request { id, method, params } = message else {
                        continue;
                    };

                    self.dispatch(id, &method, params).await?;
                }

                event = upstream_events.recv() => {
                    let Some(event) = event else {
                        continue;
                    };

                    self.deliver(event).await?;
                }
            }
        }

        self.teardown().await;
        Ok(())
    }

    async fn dispatch(&mut self, id: stratum::Id, method: &str, params: serde_json::Value) -> Result<()> {
        match method {
            "mining.configure" => self.configure(id, params).await,
            "mining.subscribe" => self.subscribe(id, params).await,
            "mining.authorize" => self.authorize(id, params).await,
            "mining.submit" => self.submit(id, params).await,
            other => {
                warn!("unknown method {other} from {}", self.source);
                Ok(())
            }
        }
    }

    async fn configure(&mut self, id: stratum::Id, params: serde_json::Value) -> Result<()> {
        let configure: stratum::Configure =
            serde_json::from_value(params).context("failed to deserialize mining.configure")?;

        if let Some(wanted) = configure.version_rolling_mask {
            self.wanted_version_mask = Some(wanted);
            let negotiated = wanted & Version::from_str("1fffe000").unwrap();
            self.version_mask = Some(negotiated);

            self.send(Message::Response {
                id,
                result: Some(json!({
                    "version-rolling": true,
                    "version-rolling.mask": negotiated.to_string(),
                })),
                error: None,
                reject_reason: None,
            })
            .await
        } else {
            self.send(Message::Response {
                id,
                result: Some(json!({})),
                error: None,
                reject_reason: None,
            })
            .await
        }
    }

    async fn subscribe(&mut self, id: stratum::Id, params: serde_json::Value) -> Result<()> {
        let subscribe: stratum::Subscribe =
            serde_json::from_value(params).context("failed to deserialize mining.subscribe")?;

        self.user_agent = subscribe
            .user_agent
            .chars()
            .take(MAX_AGENT_LEN)
            .collect();

        self.state = State::Subscribed;

        let result = stratum::SubscribeResult {
            subscriptions: vec![
                ("mining.set_difficulty".to_string(), SUBSCRIPTION_ID.to_string()),
                ("mining.notify".to_string(), SUBSCRIPTION_ID.to_string()),
            ],
            enonce1: self.session_enonce1.clone(),
            enonce2_size: 4,
        };

        self.send(Message::Response {
            id,
            result: Some(json!(result)),
            error: None,
            reject_reason: None,
        })
        .await
    }

    async fn authorize(&mut self, id: stratum::Id, params: serde_json::Value) -> Result<()> {
        if self.state == State::Connected {
            return self
                .send_error(id, stratum::StratumErrorCode::NotSubscribed)
                .await;
        }

        let authorize: stratum::Authorize =
            serde_json::from_value(params).context("failed to deserialize mining.authorize")?;

        self.username = Some(authorize.username);
        self.state = State::Authenticated;

        match self.server.least_loaded_upstream().await {
            Ok(upstream) => {
                upstream
                    .bind_downstream(self.session_id, self.events_tx.clone())
                    .await;
                self.upstream = Some(upstream);
            }
            Err(err) => {
                warn!("{} authorized with no upstream available: {err}", self.source);
            }
        }

        self.send(Message::Response {
            id,
            result: Some(json!(true)),
            error: None,
            reject_reason: None,
        })
        .await
    }

    async fn submit(&mut self, id: stratum::Id, params: serde_json::Value) -> Result<()> {
        if self.state != State::Authenticated {
            self.send_error(id.clone(), stratum::StratumErrorCode::Unauthorized)
                .await?;

            return self
                .send(Message::Notification {
                    method: "client.reconnect".into(),
                    params: json!([]),
                })
                .await;
        }

        let Some(ref upstream) = self.upstream else {
            return self
                .send_error(id, stratum::StratumErrorCode::InternalErrorCode)
                .await;
        };

        let submit: Submit =
            serde_json::from_value(params).context("failed to deserialize mining.submit")?;

        let reply = Message::Response {
            id,
            result: Some(json!(true)),
            error: None,
            reject_reason: None,
        };
        self.send(reply).await?;

        if submit.version_bits.is_some() {
            self.version_rolling_shares_since_loss = 0;
        } else if self.version_mask.is_some() {
            self.version_rolling_shares_since_loss += 1;

            if self.version_rolling_shares_since_loss >= 100 {
                warn!(
                    "{} appears to have lost AsicBoost version rolling, suggesting reconnect",
                    self.source
                );

                self.send(Message::Notification {
                    method: "client.reconnect".into(),
                    params: json!([]),
                })
                .await?;
            }
        }

        let extranonce2_suffix = self.session_enonce1.as_bytes()[self.session_enonce1.len() - 4..].to_vec();
        let mut upstream_enonce2 = extranonce2_suffix;
        upstream_enonce2.extend_from_slice(submit.extranonce2.as_bytes());

        let share = Share {
            session_id: self.session_id,
            job_id: submit.job_id,
            extranonce2: Extranonce::from_hex(&hex::encode(upstream_enonce2))
                .context("failed to build upstream extranonce2")?,
            ntime: submit.ntime,
            nonce: submit.nonce,
            version_bits: submit.version_bits,
            is_time_changed: false,
            is_fake_job: false,
        };

        let upstream = upstream.clone();
        let source = self.source;
        tokio::spawn(async move {
            if let Err(err) = upstream.submit_share(share).await {
                debug!("{source} share rejected: {err}");
            }
        });

        Ok(())
    }

    async fn deliver(&mut self, event: DownstreamEvent) -> Result<()> {
        match event {
            DownstreamEvent::Notify(notify) => {
                let mut notify = (*notify).clone();
                splice_session_enonce1(&mut notify.coinb1, &self.session_enonce1);

                self.send(Message::Notification {
                    method: "mining.notify".into(),
                    params: json!(notify),
                })
                .await
            }
            DownstreamEvent::SetDifficulty(diff) => {
                self.send(Message::Notification {
                    method: "mining.set_difficulty".into(),
                    params: json!(SetDifficulty(diff)),
                })
                .await
            }
        }
    }

    async fn teardown(&mut self) {
        if let Some(upstream) = &self.upstream {
            upstream.unbind_downstream(self.session_id).await;
        }
    }

    async fn send(&mut self, message: Message) -> Result<()> {
        let frame = serde_json::to_string(&message).context("failed to serialize response")?;

        tokio::time::timeout(WRITE_TIMEOUT, self.writer.send(Frame::Line(frame)))
            .await
            .context("write timed out")?
            .context("write failed")
    }

    async fn send_error(&mut self, id: stratum::Id, code: stratum::StratumErrorCode) -> Result<()> {
        self.send(stratum::StratumError::new(code).into_response(id))
            .await
    }
}

/// Derives this session's 4-byte extranonce1 deterministically from its session id, so
/// every miner gets a distinct value without central coordination.
fn session_enonce1_for(session_id: u16) -> Extranonce {
    let bytes = session_id.to_be_bytes();
    Extranonce::from_bytes(&[0, 0, bytes[0], bytes[1]])
}

/// Splices this session's 4-byte extranonce1 into the 8 hex nibbles an upstream
/// reserved after the 14th `"` when it rewrote its own notify template.
fn splice_session_enonce1(coinb1: &mut String, session_enonce1: &Extranonce) {
    let mut quote_count = 0;
    let mut splice_at = None;

    for (index, byte) in coinb1.as_bytes().iter().enumerate() {
        if *byte == b'"' {
            quote_count += 1;
            if quote_count == 14 {
                splice_at = Some(index + 1);
                break;
            }
        }
    }

    let Some(start) = splice_at else {
        return;
    };

    if coinb1.len() < start + 8 {
        return;
    }

    coinb1.replace_range(start..start + 8, &session_enonce1.to_hex());
}
