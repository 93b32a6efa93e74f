//! Connection supervision: connect, register, pump, reconnect.
//!
//! The supervisor owns the socket and the chat throttle and is the
//! only place that awaits on I/O. Everything else happens inside the
//! [`Engine`], which communicates back through its outbound queues and
//! the quit/reconnect flags. Auxiliary workers never touch shared
//! state; they post [`WorkerMessage`]s into the supervisor's mailbox.

use crate::config::Config;
use crate::engine::bus::BusMessage;
use crate::engine::context::Outbound;
use crate::engine::throttle::LeakyBucket;
use crate::engine::Engine;
use crate::error::SessionError;
use crate::plugins::Plugin;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

/// RFC 2812 allows 512 bytes; tag-happy servers send more.
const MAX_LINE: usize = 1024;

/// Consecutive mailbox messages processed before the socket gets
/// serviced again.
const MAILBOX_DRAIN_CAP: usize = 32;

type IrcFramed = Framed<TcpStream, LinesCodec>;

/// How one session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Connection lost or cycled; connect again after backoff.
    Reconnect,
    /// Deliberate shutdown; the process exits cleanly.
    Quit,
}

/// Fire-and-forget messages from auxiliary worker tasks.
#[derive(Debug)]
pub enum WorkerMessage {
    /// A chat line for the throttled outbound path.
    Send(String),
    /// A bus broadcast for the plugins. `from` of `usize::MAX` marks
    /// an external origin so every plugin receives it.
    Broadcast {
        header: String,
        payload: serde_json::Value,
    },
}

pub struct Supervisor {
    config: Arc<Config>,
    engine: Engine,
    cancel: CancellationToken,
    bucket: LeakyBucket,
    mailbox: mpsc::UnboundedReceiver<WorkerMessage>,
    mailbox_tx: mpsc::UnboundedSender<WorkerMessage>,
    /// Monotonic reference for throttle time.
    epoch: Instant,
}

impl Supervisor {
    pub fn new(
        config: Arc<Config>,
        plugins: Vec<Box<dyn Plugin>>,
        cancel: CancellationToken,
    ) -> Self {
        let bucket = LeakyBucket::new(
            config.throttle.rate,
            config.throttle.burst,
            config.throttle.increment,
        );
        let engine = Engine::new(config.clone(), plugins);
        let (mailbox_tx, mailbox) = mpsc::unbounded_channel();
        Self {
            config,
            engine,
            cancel,
            bucket,
            mailbox,
            mailbox_tx,
            epoch: Instant::now(),
        }
    }

    /// Sender half of the worker mailbox, for long-running helper
    /// tasks spawned outside the engine loop.
    pub fn mailbox(&self) -> mpsc::UnboundedSender<WorkerMessage> {
        self.mailbox_tx.clone()
    }

    /// Run sessions until cancellation or a requested shutdown.
    ///
    /// Failure to resolve or connect is fatal and reported to the
    /// caller; transport failures on an established session reconnect
    /// after the configured backoff.
    pub async fn run(mut self) -> Result<(), SessionError> {
        loop {
            match self.run_session().await {
                Ok(SessionOutcome::Quit) => return Ok(()),
                Ok(SessionOutcome::Reconnect) => {}
                Err(err @ SessionError::Connect { .. }) => return Err(err),
                Err(err) => tracing::warn!(%err, "session ended"),
            }
            self.engine.reset_connection();
            self.bucket.reset();
            let backoff = Duration::from_secs(self.config.session.reconnect_backoff_secs);
            tracing::info!(backoff_secs = backoff.as_secs(), "reconnecting after backoff");
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn run_session(&mut self) -> Result<SessionOutcome, SessionError> {
        let host = self.config.server.host.clone();
        let port = self.config.server.port;
        let stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|source| SessionError::Connect { host: host.clone(), port, source })?;
        tracing::info!(%host, port, "connected");
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE));

        self.register(&mut framed).await?;
        self.session_loop(&mut framed).await
    }

    async fn register(&mut self, framed: &mut IrcFramed) -> Result<(), SessionError> {
        if let Some(password) = &self.config.server.password {
            // Keep the secret out of the logs.
            tracing::debug!(line = "PASS ********", "send");
            framed.send(format!("PASS {password}\r")).await?;
        }
        let nick = self.engine.core.nickname.clone();
        send_line(framed, &format!("NICK {nick}"), false).await?;
        let user = if self.config.server.username.is_empty() {
            nick.as_str()
        } else {
            self.config.server.username.as_str()
        };
        let realname = &self.config.server.realname;
        send_line(framed, &format!("USER {user} 0 * :{realname}"), false).await?;
        Ok(())
    }

    fn accept_worker(&mut self, msg: WorkerMessage) {
        match msg {
            WorkerMessage::Send(line) => {
                self.engine.core.outbound.push_back(Outbound { line, quiet: false });
            }
            WorkerMessage::Broadcast { header, payload } => {
                self.engine.core.bus_queue.push_back(BusMessage {
                    from: usize::MAX,
                    header,
                    payload,
                });
            }
        }
    }

    async fn session_loop(
        &mut self,
        framed: &mut IrcFramed,
    ) -> Result<SessionOutcome, SessionError> {
        let tick = Duration::from_millis(self.config.session.tick_millis.max(50));
        let read_timeout = Duration::from_secs(self.config.session.read_timeout_secs);
        let mut last_read = Instant::now();

        loop {
            // The unthrottled queue drains completely first: replies
            // to PING and registration fixups cannot sit behind chat.
            while let Some(line) = self.engine.core.immediate.pop_front() {
                send_line(framed, &line, false).await?;
            }
            if self.engine.core.quit_requested {
                // LinesCodec encodes any AsRef<str>; pin the sink's
                // item type so a bare flush infers.
                SinkExt::<String>::flush(framed).await?;
                return Ok(SessionOutcome::Quit);
            }
            if self.engine.core.reconnect_requested {
                return Ok(SessionOutcome::Reconnect);
            }

            let mut send_wait: Option<Duration> = None;
            while let Some(out) = self.engine.core.outbound.pop_front() {
                match self.bucket.try_acquire(self.epoch.elapsed().as_secs_f64()) {
                    Ok(()) => send_line(framed, &out.line, out.quiet).await?,
                    Err(wait) => {
                        // An interrupted wait costs nothing; the line
                        // stays queued.
                        self.engine.core.outbound.push_front(out);
                        send_wait = Some(wait);
                        break;
                    }
                }
            }

            let mut sleep_for = tick;
            if let Some(wait) = send_wait {
                sleep_for = sleep_for.min(wait);
            }
            if let Some(wake) = self.engine.next_wakeup() {
                let until = (wake - chrono::Utc::now().timestamp()).max(0) as u64;
                sleep_for = sleep_for.min(Duration::from_secs(until));
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = send_line(framed, "QUIT :terminated", false).await;
                    return Ok(SessionOutcome::Quit);
                }
                next = framed.next() => match next {
                    Some(Ok(line)) => {
                        last_read = Instant::now();
                        let now = chrono::Utc::now().timestamp();
                        self.engine.handle_line(line.trim_end_matches('\r'), now).await;
                    }
                    Some(Err(err)) => return Err(err.into()),
                    None => {
                        tracing::info!("server closed the connection");
                        return Ok(SessionOutcome::Reconnect);
                    }
                },
                msg = self.mailbox.recv() => {
                    let mut budget = MAILBOX_DRAIN_CAP;
                    let mut next = msg;
                    while let Some(msg) = next {
                        self.accept_worker(msg);
                        budget -= 1;
                        if budget == 0 {
                            break;
                        }
                        next = self.mailbox.try_recv().ok();
                    }
                }
                _ = tokio::time::sleep(sleep_for) => {
                    if last_read.elapsed() >= read_timeout {
                        tracing::warn!(
                            silent_secs = last_read.elapsed().as_secs(),
                            "read timeout"
                        );
                        return Ok(SessionOutcome::Reconnect);
                    }
                    self.engine.tick(chrono::Utc::now().timestamp()).await;
                }
            }
        }
    }
}

async fn send_line(
    framed: &mut IrcFramed,
    line: &str,
    quiet: bool,
) -> Result<(), LinesCodecError> {
    if quiet {
        tracing::debug!(line, "send");
    } else {
        tracing::info!(line, "send");
    }
    // LinesCodec terminates with a bare LF; carry the CR ourselves.
    framed.send(format!("{line}\r")).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn supervisor() -> Supervisor {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "irc.example.net"
            nickname = "wm"
            "#,
        )
        .unwrap();
        Supervisor::new(Arc::new(config), Vec::new(), CancellationToken::new())
    }

    #[tokio::test]
    async fn worker_messages_land_on_engine_queues() {
        let mut sup = supervisor();
        let tx = sup.mailbox();
        tx.send(WorkerMessage::Send("PRIVMSG #chat :report ready".into()))
            .unwrap();
        tx.send(WorkerMessage::Broadcast {
            header: "report.done".into(),
            payload: json!({"rows": 3}),
        })
        .unwrap();

        while let Ok(msg) = sup.mailbox.try_recv() {
            sup.accept_worker(msg);
        }

        let out = sup.engine.core.outbound.pop_front().unwrap();
        assert_eq!(out.line, "PRIVMSG #chat :report ready");
        assert!(!out.quiet);
        let bus = sup.engine.core.bus_queue.pop_front().unwrap();
        assert_eq!(bus.header, "report.done");
        // External origin: every plugin receives it on delivery.
        assert_eq!(bus.from, usize::MAX);
    }
}
