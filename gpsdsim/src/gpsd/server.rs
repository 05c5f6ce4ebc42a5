//! GPSD TCP server.
//!
//! Accepts connections on the native GPSD port and speaks the line-JSON
//! protocol: a VERSION hello, then a command loop reading `;`-terminated
//! chunks. The first `?WATCH=` command starts the per-connection reporter
//! task, which bridges a controller subscription to the wire writer.
//!
//! Connection state machine: `HELLO -> READING -> (first ?WATCH=)
//! REPORTING`. There is no transition back; later commands are logged and
//! ignored.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::log::Logger;
use crate::route::{Controller, Point};
use crate::{log_debug, log_error, log_info};

use super::writer::{Writer, WriterConfig};
use super::{COMMAND_SUFFIX, WATCH_COMMAND};

/// Errors raised while starting the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind the listen socket.
    #[error("failed to bind GPSD listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// GPSD protocol server.
pub struct GpsdServer {
    listener: TcpListener,
    cancel: CancellationToken,
    controller: Arc<Controller>,
    writer_config: WriterConfig,
    logger: Arc<dyn Logger>,
}

impl GpsdServer {
    /// Bind the IPv4 listen socket. Port 0 picks an ephemeral port.
    pub async fn bind(
        parent: CancellationToken,
        port: u16,
        writer_config: WriterConfig,
        controller: Arc<Controller>,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, ServerError> {
        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            cancel: parent.child_token(),
            controller,
            writer_config,
            logger,
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Spawn the accept loop.
    pub fn startup(self) {
        if let Ok(addr) = self.local_addr() {
            log_info!(self.logger, "gpsd: starting up the simulator server on {}", addr);
        }
        tokio::spawn(self.accept_loop());
    }

    async fn accept_loop(self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    log_info!(self.logger, "gpsd: shutting down the simulator server");
                    return;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let connection = Connection {
                                cancel: self.cancel.child_token(),
                                controller: Arc::clone(&self.controller),
                                writer_config: self.writer_config.clone(),
                                logger: self.logger.clone(),
                            };
                            tokio::spawn(connection.handle(stream, peer));
                        }
                        Err(e) => {
                            log_error!(self.logger, "gpsd: accept error: {e}");
                            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        }
    }
}

/// One accepted client connection.
struct Connection {
    cancel: CancellationToken,
    controller: Arc<Controller>,
    writer_config: WriterConfig,
    logger: Arc<dyn Logger>,
}

impl Connection {
    async fn handle(self, stream: TcpStream, peer: SocketAddr) {
        log_info!(self.logger, "gpsd: serving {peer}");

        let (updates, subscription) = self.controller.subscribe().await;
        let (read_half, write_half) = stream.into_split();

        let mut writer = Writer::new(write_half, self.writer_config.clone());
        if let Err(e) = writer.write_version().await {
            log_debug!(self.logger, "gpsd: VERSION write error: {e}");
            subscription.cancel().await;
            return;
        }

        let mut pump = Some((writer, updates));
        let mut reporter = None;
        self.read_loop(read_half, &mut pump, &mut reporter).await;

        // Teardown runs on every exit path. Dropping an unconsumed pump
        // closes our receiver, so a broadcast blocked on this connection
        // fails over instead of wedging the subscriber table; only then is
        // it safe to take the table lock and unsubscribe.
        log_info!(self.logger, "gpsd: closing connection to {peer}");
        drop(pump);
        subscription.cancel().await;
        self.cancel.cancel();
        if let Some(task) = reporter {
            let _ = task.await;
        }
    }

    async fn read_loop(
        &self,
        read_half: OwnedReadHalf,
        pump: &mut Option<(Writer<OwnedWriteHalf>, mpsc::Receiver<Point>)>,
        reporter: &mut Option<tokio::task::JoinHandle<()>>,
    ) {
        let mut reader = BufReader::new(read_half);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                _ = self.cancel.cancelled() => return,
                read = reader.read_until(COMMAND_SUFFIX, &mut buf) => read,
            };

            match read {
                Ok(0) => {
                    log_debug!(self.logger, "gpsd: client closed the connection");
                    return;
                }
                Ok(_) if buf.last() != Some(&COMMAND_SUFFIX) => {
                    // Partial command truncated by EOF.
                    return;
                }
                Ok(_) => {
                    let command = String::from_utf8_lossy(&buf);
                    log_debug!(self.logger, "gpsd: received: {command}");

                    if command.starts_with(WATCH_COMMAND) {
                        if let Some((writer, updates)) = pump.take() {
                            let task = TpvReporter {
                                cancel: self.cancel.clone(),
                                logger: self.logger.clone(),
                            };
                            *reporter = Some(tokio::spawn(task.run(writer, updates)));
                        }
                    }
                }
                Err(e) => {
                    log_error!(self.logger, "gpsd: read error: {e}");
                    return;
                }
            }
        }
    }
}

/// Per-connection TPV pump: DEVICES and WATCH once, then one TPV per
/// received point until the connection dies or the subscription closes.
struct TpvReporter {
    cancel: CancellationToken,
    logger: Arc<dyn Logger>,
}

impl TpvReporter {
    async fn run(self, mut writer: Writer<OwnedWriteHalf>, mut updates: mpsc::Receiver<Point>) {
        if let Err(e) = writer.write_devices().await {
            log_error!(self.logger, "gpsd: DEVICES write error: {e}");
            return;
        }
        if let Err(e) = writer.write_watch().await {
            log_error!(self.logger, "gpsd: WATCH write error: {e}");
            return;
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                point = updates.recv() => {
                    let Some(point) = point else {
                        return; // subscription closed
                    };
                    if let Err(e) = writer.write_tpv(&point).await {
                        log_error!(self.logger, "gpsd: TPV write error on point {point}: {e}");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoOpLogger;
    use crate::route::ElevationClient;
    use std::time::Duration;

    fn controller(parent: &CancellationToken) -> Arc<Controller> {
        Arc::new(Controller::with_elevation(
            parent.clone(),
            Duration::from_millis(50),
            ElevationClient::new("http://127.0.0.1:1/unreachable".into()),
            Arc::new(NoOpLogger),
        ))
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let parent = CancellationToken::new();
        let server = GpsdServer::bind(
            parent.clone(),
            0,
            WriterConfig::default(),
            controller(&parent),
            Arc::new(NoOpLogger),
        )
        .await
        .unwrap();

        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(addr.is_ipv4());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let parent = CancellationToken::new();
        let first = GpsdServer::bind(
            parent.clone(),
            0,
            WriterConfig::default(),
            controller(&parent),
            Arc::new(NoOpLogger),
        )
        .await
        .unwrap();
        let port = first.local_addr().unwrap().port();

        let second = GpsdServer::bind(
            parent.clone(),
            port,
            WriterConfig::default(),
            controller(&parent),
            Arc::new(NoOpLogger),
        )
        .await;
        assert!(matches!(second, Err(ServerError::Bind { .. })));
    }
}
