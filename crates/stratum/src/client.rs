use crate::USER_AGENT;
pub use error::ClientError;
use {
    super::*,
    std::{
        collections::BTreeMap,
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    },
    tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter},
        net::TcpStream,
        sync::{mpsc, oneshot},
    },
    tracing::{error, warn},
};

mod error;

pub type Result<T = (), E = ClientError> = std::result::Result<T, E>;

/// Subscribes a listener to every [`Event`] the upstream connection emits: job updates,
/// difficulty changes, and disconnection.
pub type EventReceiver = tokio::sync::broadcast::Receiver<Event>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub address: String,
    pub username: String,
    pub password: Option<String>,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    id_counter: Arc<AtomicU64>,
    tx: mpsc::Sender<ActorMessage>,
    events: tokio::sync::broadcast::Sender<Event>,
}

enum ActorMessage {
    Request {
        id: Id,
        method: String,
        params: Value,
        tx: oneshot::Sender<Result<(Message, usize)>>,
    },
    Disconnect,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        let (tx, _) = mpsc::channel(32);
        let (events, _) = tokio::sync::broadcast::channel(32);

        Self {
            config: Arc::new(config),
            id_counter: Arc::new(AtomicU64::new(0)),
            tx,
            events,
        }
    }

    /// Spawns the connection actor and returns a fresh subscription to its event stream.
    pub async fn connect(&mut self) -> Result<EventReceiver> {
        let (tx, rx) = mpsc::channel(32);
        self.tx = tx;

        let connection = Connection::new(self.config.clone(), rx, self.events.clone());

        tokio::spawn(async move {
            if let Err(e) = connection.run().await {
                error!("connection actor failed: {e}");
            }
        });

        Ok(self.events.subscribe())
    }

    pub async fn reconnect(&mut self) -> Result<EventReceiver> {
        self.disconnect().await?;
        let events = self.connect().await?;

        let (_subscribe, _, _) = self.subscribe(USER_AGENT.into()).await?;
        self.authorize().await?;

        Ok(events)
    }

    pub async fn disconnect(&self) -> Result<()> {
        let _ = self.tx.send(ActorMessage::Disconnect).await;
        Ok(())
    }

    async fn send_request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<(oneshot::Receiver<Result<(Message, usize)>>, Instant)> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();

        let instant = Instant::now();

        self.tx
            .send(ActorMessage::Request {
                id,
                method: method.to_string(),
                params,
                tx,
            })
            .await
            .map_err(|_| ClientError::NotConnected)?;

        Ok((rx, instant))
    }

    fn next_id(&self) -> Id {
        Id::Number(self.id_counter.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn configure(
        &self,
        extensions: Vec<String>,
        version_rolling_mask: Option<Version>,
    ) -> Result<(Value, Duration, usize)> {
        let (rx, instant) = self
            .send_request(
                "mining.configure",
                serde_json::to_value(Configure {
                    extensions,
                    minimum_difficulty_value: None,
                    version_rolling_mask,
                    version_rolling_min_bit_count: None,
                })
                .context(error::SerializationSnafu)?,
            )
            .await?;

        let (message, bytes_read) = rx
            .await
            .map_err(|e| ClientError::ChannelRecv { source: e })??;

        let duration = instant.elapsed();

        match message {
            Message::Response {
                result: Some(result),
                error: None,
                ..
            } => Ok((result, duration, bytes_read)),
            Message::Response {
                error: Some(err), ..
            } => Err(ClientError::Protocol {
                message: format!("mining.configure error: {err}"),
            }),
            _ => Err(ClientError::Protocol {
                message: "unhandled error in mining.configure".to_string(),
            }),
        }
    }

    pub async fn subscribe(
        &self,
        user_agent: String,
    ) -> Result<(SubscribeResult, Duration, usize)> {
        let (rx, instant) = self
            .send_request(
                "mining.subscribe",
                serde_json::to_value(Subscribe {
                    user_agent,
                    enonce1: None,
                })
                .context(error::SerializationSnafu)?,
            )
            .await?;

        let (message, bytes_read) = rx
            .await
            .map_err(|e| ClientError::ChannelRecv { source: e })??;

        let duration = instant.elapsed();

        match message {
            Message::Response {
                result: Some(result),
                error: None,
                ..
            } => Ok((
                serde_json::from_value(result).context(error::SerializationSnafu)?,
                duration,
                bytes_read,
            )),
            Message::Response {
                error: Some(err), ..
            } => Err(ClientError::Protocol {
                message: format!("mining.subscribe error: {err}"),
            }),
            _ => Err(ClientError::Protocol {
                message: "unknown mining.subscribe error".to_string(),
            }),
        }
    }

    pub async fn authorize(&self) -> Result<(Duration, usize)> {
        let (rx, instant) = self
            .send_request(
                "mining.authorize",
                serde_json::to_value(Authorize {
                    username: self.config.username.clone(),
                    password: Some(
                        self.config
                            .password
                            .clone()
                            .unwrap_or_else(|| "x".to_string()),
                    ),
                })
                .context(error::SerializationSnafu)?,
            )
            .await?;

        let (message, bytes_read) = rx
            .await
            .map_err(|e| ClientError::ChannelRecv { source: e })??;

        let duration = instant.elapsed();

        match message {
            Message::Response {
                result: Some(result),
                error: None,
                ..
            } => {
                if serde_json::from_value(result).context(error::SerializationSnafu)? {
                    Ok((duration, bytes_read))
                } else {
                    Err(ClientError::Protocol {
                        message: "unauthorized".to_string(),
                    })
                }
            }
            Message::Response {
                error: Some(err), ..
            } => Err(ClientError::Protocol {
                message: format!("mining.authorize error: {err}"),
            }),
            _ => Err(ClientError::Protocol {
                message: "unknown mining.authorize error".to_string(),
            }),
        }
    }

    pub async fn submit(
        &self,
        job_id: JobId,
        extranonce2: Extranonce,
        ntime: Ntime,
        nonce: Nonce,
        version_bits: Option<Version>,
    ) -> Result<Submit> {
        let submit = Submit {
            username: self.config.username.clone(),
            job_id,
            extranonce2,
            ntime,
            nonce,
            version_bits,
        };

        let (rx, _) = self
            .send_request(
                "mining.submit",
                serde_json::to_value(&submit).context(error::SerializationSnafu)?,
            )
            .await?;

        let (message, _) = rx
            .await
            .map_err(|e| ClientError::ChannelRecv { source: e })??;

        match message {
            Message::Response {
                result: Some(result),
                error: None,
                reject_reason: None,
                ..
            } => {
                if let Err(err) = serde_json::from_value::<Value>(result) {
                    return Err(ClientError::Protocol {
                        message: format!("failed to submit: {err}"),
                    });
                }
            }
            Message::Response {
                error: Some(err), ..
            } => {
                return Err(ClientError::Protocol {
                    message: format!("mining.submit error: {err}"),
                });
            }
            Message::Response {
                reject_reason: Some(reason),
                ..
            } => {
                return Err(ClientError::Protocol {
                    message: format!("share rejected: {reason}"),
                });
            }
            _ => {
                return Err(ClientError::Protocol {
                    message: "unhandled error in mining.submit".to_string(),
                });
            }
        }

        Ok(submit)
    }
}

struct Connection {
    config: Arc<ClientConfig>,
    rx: mpsc::Receiver<ActorMessage>,
    events: tokio::sync::broadcast::Sender<Event>,
    pending: BTreeMap<Id, oneshot::Sender<Result<(Message, usize)>>>,
}

impl Connection {
    fn new(
        config: Arc<ClientConfig>,
        rx: mpsc::Receiver<ActorMessage>,
        events: tokio::sync::broadcast::Sender<Event>,
    ) -> Self {
        Self {
            config,
            rx,
            events,
            pending: BTreeMap::new(),
        }
    }

    async fn run(mut self) -> Result<()> {
        let stream = tokio::time::timeout(
            self.config.timeout,
            TcpStream::connect(&self.config.address),
        )
        .await
        .context(error::TimeoutSnafu)?
        .context(error::IoSnafu)?;

        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut writer = BufWriter::new(writer);

        let mut line = String::new();

        loop {
            line.clear();

            tokio::select! {
                msg = self.rx.recv() => {
                    match msg {
                        Some(ActorMessage::Request { id, method, params, tx }) => {
                            let msg = Message::Request {
                                id: id.clone(),
                                method,
                                params,
                            };
                            let frame = match serde_json::to_string(&msg) {
                                Ok(f) => f + "\n",
                                Err(e) => {
                                    let _ = tx.send(Err(ClientError::Serialization { source: e }));
                                    continue;
                                }
                            };

                            if let Err(e) = writer.write_all(frame.as_bytes()).await {
                                let _ = tx.send(Err(ClientError::Io { source: e }));
                                break;
                            }
                            if let Err(e) = writer.flush().await {
                                let _ = tx.send(Err(ClientError::Io { source: e }));
                                break;
                            }

                            self.pending.insert(id, tx);
                        }
                        Some(ActorMessage::Disconnect) => {
                            break;
                        }
                        None => {
                            break;
                        }
                    }
                }

                read_result = reader.read_line(&mut line) => {
                    let bytes_read = match read_result {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(e) => {
                            error!("read error: {e}");
                            break;
                        }
                    };

                    let msg: Message = match serde_json::from_str(&line) {
                        Ok(msg) => msg,
                        Err(e) => {
                            warn!("invalid JSON message: {line:?} - {e}");
                            continue;
                        }
                    };

                    match msg {
                        Message::Response { id, result, error, reject_reason } => {
                            if let Some(tx) = self.pending.remove(&id) {
                                let _ = tx.send(Ok((
                                    Message::Response { id, result, error, reject_reason },
                                    bytes_read
                                )));
                            } else {
                                warn!("unmatched response id={id}: {line}");
                            }
                        }
                        Message::Notification { method, params } => {
                            self.handle_notification(method, params).await;
                        }
                        _ => {
                             warn!("unexpected message type: {msg:?}");
                        }
                    }
                }
            }
        }

        let pending = std::mem::take(&mut self.pending);
        for (_, tx) in pending {
            let _ = tx.send(Err(ClientError::NotConnected));
        }

        let _ = self.events.send(Event::Disconnected);

        Ok(())
    }

    async fn handle_notification(&self, method: String, params: Value) {
        match method.as_str() {
            "mining.notify" => match serde_json::from_value::<Notify>(params) {
                Ok(notify) => {
                    let _ = self.events.send(Event::Notify(notify));
                }
                Err(e) => warn!("failed to parse mining.notify: {e}"),
            },
            "mining.set_difficulty" => match serde_json::from_value::<SetDifficulty>(params) {
                Ok(set_diff) => {
                    let _ = self
                        .events
                        .send(Event::SetDifficulty(set_diff.difficulty()));
                }
                Err(e) => warn!("failed to parse mining.set_difficulty: {e}"),
            },
            _ => warn!("unhandled notification: {method}"),
        }
    }
}
