//! Realtime change feeds over the websocket API

mod message;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};

pub use message::*;

/// Interval between heartbeats on an open socket
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Client for the realtime service
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    url: String,
    key: String,
    token: String,
    heartbeat_interval: Duration,
}

/// A live subscription. Dropping it closes the socket.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    events: mpsc::Receiver<Result<ChangeEvent>>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Wait for the next change; `None` once the socket closed
    pub async fn next(&mut self) -> Option<Result<ChangeEvent>> {
        self.events.recv().await
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(topic = %self.topic, "closing realtime subscription");
        self.task.abort();
    }
}

impl RealtimeClient {
    pub(crate) fn new(url: &str, key: &str, token: &str) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            token: token.to_string(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    /// Override the heartbeat interval
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Websocket endpoint derived from the project URL
    pub fn websocket_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.url)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(Error::realtime(format!("Unsupported URL scheme: {}", other))),
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::realtime("Cannot switch URL to a websocket scheme"))?;
        url.set_path("/realtime/v1/websocket");
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.key)
            .append_pair("vsn", "1.0.0");
        Ok(url.to_string())
    }

    /// Open a socket, join `realtime:{channel}` and stream the requested changes
    pub async fn subscribe(
        &self,
        channel: &str,
        changes: Vec<PostgresChanges>,
    ) -> Result<Subscription> {
        let ws_url = self.websocket_url()?;
        let topic = format!("realtime:{}", channel);

        let (stream, _) = connect_async(ws_url.as_str()).await?;
        info!(%topic, "realtime socket connected");
        let (mut write, mut read) = stream.split();

        let join = join_message(&topic, &changes, &self.token, 1);
        write.send(Message::Text(join.to_string())).await?;

        let (tx, rx) = mpsc::channel(64);
        let heartbeat_interval = self.heartbeat_interval;
        let task_topic = topic.clone();

        let task = tokio::spawn(async move {
            let mut next_ref: u32 = 2;
            let mut heartbeat = tokio::time::interval(heartbeat_interval);
            heartbeat.tick().await;

            loop {
                tokio::select! {
                    incoming = read.next() => {
                        let text = match incoming {
                            Some(Ok(Message::Text(text))) => text,
                            Some(Ok(Message::Close(_))) | None => {
                                debug!(topic = %task_topic, "realtime socket closed");
                                break;
                            }
                            Some(Ok(other)) => {
                                trace!("ignoring frame {:?}", other);
                                continue;
                            }
                            Some(Err(e)) => {
                                error!("realtime read error: {}", e);
                                let _ = tx.send(Err(e.into())).await;
                                break;
                            }
                        };

                        let message = match serde_json::from_str::<RealtimeMessage>(&text) {
                            Ok(message) => message,
                            Err(e) => {
                                warn!("unparseable realtime message: {}", e);
                                continue;
                            }
                        };
                        if message.topic != task_topic {
                            continue;
                        }
                        if let Err(e) = check_reply(&message) {
                            let _ = tx.send(Err(e)).await;
                            break;
                        }
                        if let Some(change) = parse_change(&message) {
                            if tx.send(Ok(change)).await.is_err() {
                                break;
                            }
                        }
                    }
                    _ = heartbeat.tick() => {
                        let beat = heartbeat_message(next_ref);
                        next_ref = next_ref.wrapping_add(1);
                        if let Err(e) = write.send(Message::Text(beat.to_string())).await {
                            error!("failed to send heartbeat: {}", e);
                            break;
                        }
                    }
                }
            }
        });

        Ok(Subscription {
            topic,
            events: rx,
            task,
        })
    }
}
