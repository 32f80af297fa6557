use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use hashbrown::HashSet;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::{
    net::UdpSocket,
    sync::{Mutex, broadcast, mpsc, oneshot, watch},
};
use tracing::{debug, error, info, warn};

use crate::{
    adif,
    config::ListenerConfig,
    persist::{self, DupeCache},
    qso::QsoRecord,
    types::DupeKey,
    upload::QsoUploader,
};

use super::events::{ListenerEvent, ListenerState, ListenerStats};

/// Run-ending listener failure.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Socket creation or bind failed.
    #[error("cannot bind UDP port {port}: {source}")]
    Bind {
        /// Requested port.
        port: u16,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Joining the multicast group failed.
    #[error("cannot join multicast group {group}: {source}")]
    Join {
        /// Requested group.
        group: Ipv4Addr,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The receive loop has already ended.
    #[error("listener is not running")]
    ChannelClosed,
}

/// Result of the best-effort decode of one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatagramOutcome {
    /// A valid record was found.
    Record {
        /// Record text from `<QSO_DATE:` through `<EOR>`.
        line: String,
        /// Its duplicate key.
        key: DupeKey,
        /// Worked callsign.
        call: String,
    },
    /// Nothing usable in the payload.
    NoRecord,
}

/// Pulls an embedded record out of an arbitrary payload.
///
/// Never fails: undecodable bytes are replaced, and anything without a
/// complete, valid record is [`DatagramOutcome::NoRecord`].
pub fn decode_datagram(bytes: &[u8]) -> DatagramOutcome {
    let text = String::from_utf8_lossy(bytes);
    if !adif::mentions_record(&text) {
        return DatagramOutcome::NoRecord;
    }
    let Some(line) = adif::extract_record(&text) else {
        return DatagramOutcome::NoRecord;
    };
    match QsoRecord::parse(line) {
        Some(rec) => DatagramOutcome::Record {
            line: line.to_string(),
            key: rec.dupe_key(),
            call: rec.call().to_string(),
        },
        None => DatagramOutcome::NoRecord,
    }
}

/// Binds `0.0.0.0:port` with address reuse and joins the multicast group.
///
/// Must be called from within a tokio runtime.
pub fn bind_multicast(config: &ListenerConfig) -> Result<UdpSocket, ListenerError> {
    let port = config.port;
    let bind_err = |source| ListenerError::Bind { port, source };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true).map_err(bind_err)?;
    socket
        .bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())
        .map_err(bind_err)?;
    socket
        .join_multicast_v4(&config.group, &Ipv4Addr::UNSPECIFIED)
        .map_err(|source| ListenerError::Join {
            group: config.group,
            source,
        })?;
    socket.set_nonblocking(true).map_err(bind_err)?;

    UdpSocket::from_std(socket.into()).map_err(bind_err)
}

/// Control handle for a running receive loop.
#[derive(Clone)]
pub struct ListenerHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<ListenerEvent>,
    state_rx: watch::Receiver<ListenerState>,
}

enum Command {
    Stats {
        resp: oneshot::Sender<ListenerStats>,
    },
    Shutdown {
        resp: oneshot::Sender<ListenerStats>,
    },
}

/// Binds the configured multicast endpoint and starts receiving.
pub fn start<C, U>(
    config: ListenerConfig,
    cache: C,
    uploader: U,
) -> Result<ListenerHandle, ListenerError>
where
    C: DupeCache + 'static,
    U: QsoUploader + 'static,
{
    let socket = bind_multicast(&config)?;
    info!(group = %config.group, port = config.port, "listening for logged QSOs");
    Ok(spawn_listener(socket, cache, uploader, config))
}

/// Runs the receive loop over an already bound socket.
///
/// The duplicate cache is loaded once when the loop starts; afterwards the
/// in-memory set is only ever added to, so another process writing the same
/// cache meanwhile goes unnoticed until the next start.
pub fn spawn_listener<C, U>(
    socket: UdpSocket,
    cache: C,
    uploader: U,
    config: ListenerConfig,
) -> ListenerHandle
where
    C: DupeCache + 'static,
    U: QsoUploader + 'static,
{
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(16);
    let (events_tx, _) = broadcast::channel::<ListenerEvent>(256);
    let (state_tx, state_rx) = watch::channel(ListenerState::Bound);

    let port = socket.local_addr().map_or(config.port, |addr| addr.port());
    let task_events = events_tx.clone();

    tokio::spawn(async move {
        let _ = task_events.send(ListenerEvent::Bound { port });
        let cache = Arc::new(Mutex::new(cache));
        let seen = persist::load_blocking(&cache).await.unwrap_or_else(|err| {
            warn!(error = %err, "duplicate cache load failed, treating as empty");
            HashSet::new()
        });
        let mut session = Session {
            cache,
            uploader,
            seen,
            events_tx: task_events,
            stats: ListenerStats::default(),
        };

        let mut buf = vec![0u8; config.max_datagram.max(1)];
        let mut shutdown_resp = None;
        let mut error = None;
        state_tx.send_replace(ListenerState::Receiving);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Stats { resp }) => {
                            let _ = resp.send(session.stats);
                        }
                        Some(Command::Shutdown { resp }) => {
                            shutdown_resp = Some(resp);
                            break;
                        }
                        None => break,
                    }
                }
                recv = socket.recv_from(&mut buf) => {
                    match recv {
                        Ok((n, _peer)) => session.handle_datagram(&buf[..n]).await,
                        Err(err) => {
                            error!(error = %err, "socket receive failed, listener stopping");
                            error = Some(err.to_string());
                            break;
                        }
                    }
                }
            }
        }

        drop(socket);
        state_tx.send_replace(ListenerState::Idle);
        info!(
            uploaded = session.stats.uploaded,
            failed = session.stats.failed,
            duplicates = session.stats.duplicates,
            "listener stopped"
        );
        let _ = session.events_tx.send(ListenerEvent::Stopped { error });
        if let Some(resp) = shutdown_resp {
            let _ = resp.send(session.stats);
        }
    });

    ListenerHandle {
        cmd_tx,
        events_tx,
        state_rx,
    }
}

impl ListenerHandle {
    /// Subscribes to upload and lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ListenerEvent> {
        self.events_tx.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        *self.state_rx.borrow()
    }

    /// Resolves once the loop has ended, for whatever reason.
    pub async fn stopped(&self) {
        let mut rx = self.state_rx.clone();
        let _ = rx.wait_for(|s| *s == ListenerState::Idle).await;
    }

    /// Totals so far.
    pub async fn stats(&self) -> Result<ListenerStats, ListenerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Stats { resp: tx })
            .await
            .map_err(|_| ListenerError::ChannelClosed)?;
        rx.await.map_err(|_| ListenerError::ChannelClosed)
    }

    /// Stops the loop and closes the socket; returns the session totals.
    pub async fn shutdown(&self) -> Result<ListenerStats, ListenerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| ListenerError::ChannelClosed)?;
        rx.await.map_err(|_| ListenerError::ChannelClosed)
    }
}

struct Session<C, U> {
    cache: Arc<Mutex<C>>,
    uploader: U,
    seen: HashSet<DupeKey>,
    events_tx: broadcast::Sender<ListenerEvent>,
    stats: ListenerStats,
}

impl<C: DupeCache + 'static, U: QsoUploader> Session<C, U> {
    async fn handle_datagram(&mut self, bytes: &[u8]) {
        self.stats.datagrams += 1;

        let DatagramOutcome::Record { line, key, call } = decode_datagram(bytes) else {
            self.stats.ignored += 1;
            debug!(len = bytes.len(), "datagram without a record");
            return;
        };

        // Loggers re-announce contacts; repeats are expected and stay quiet.
        if self.seen.contains(&key) {
            self.stats.duplicates += 1;
            return;
        }

        match self.uploader.push(&line).await {
            Ok(()) => {
                self.stats.uploaded += 1;
                if let Err(err) = persist::add_blocking(&self.cache, &key).await {
                    warn!(%call, error = %err, "uploaded but could not record in duplicate cache");
                }
                self.seen.insert(key);
                info!(%call, "uploaded QSO");
                let _ = self.events_tx.send(ListenerEvent::Uploaded { call });
            }
            Err(reason) => {
                self.stats.failed += 1;
                warn!(%call, %reason, "upload failed");
                let _ = self.events_tx.send(ListenerEvent::UploadFailed { call, reason });
            }
        }
    }
}
