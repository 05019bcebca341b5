//! Listens for client connections and spawns a [`Session`] per peer (§4.8).

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::MatchingEngine;
use crate::fix::{encode, FrameSplitter, ProtocolError};

use super::{sending_time_now, Session, SessionState};

/// Idle time a partial frame is allowed to sit in the buffer before the
/// connection is dropped (§4.8 "buffer until complete or until an idle
/// timeout").
const FRAME_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Accepts connections on `config.bind` until the given signal resolves,
/// spawning one task per peer.
pub async fn run(config: Arc<Config>, engine: Arc<MatchingEngine>, mut shutdown: tokio::sync::watch::Receiver<bool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind).await?;
    info!(addr = %config.bind, "acceptor listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let config = Arc::clone(&config);
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, config, engine).await {
                        warn!(%peer, error = %err, "session ended with error");
                    }
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("acceptor shutting down");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, config: Arc<Config>, engine: Arc<MatchingEngine>) -> anyhow::Result<()> {
    let peer = stream.peer_addr()?;
    info!(%peer, "accepted connection");

    let mut session = Session::new(config.comp_id.clone(), Arc::clone(&engine));
    let mut splitter = FrameSplitter::new();
    let mut read_buf = [0u8; 4096];

    loop {
        let read_deadline = if splitter.has_pending() {
            FRAME_IDLE_TIMEOUT.min(session.heartbeat_interval())
        } else {
            session.heartbeat_interval()
        };
        let read_result = timeout(read_deadline, stream.read(&mut read_buf)).await;

        match read_result {
            Ok(Ok(0)) => {
                info!(%peer, "peer closed socket");
                break;
            }
            Ok(Ok(n)) => {
                splitter.feed(&read_buf[..n]);
                loop {
                    match splitter.next_frame() {
                        Ok(Some(msg)) => {
                            crate::metrics::messages_decoded();
                            let output = session.handle_message(msg);
                            // Before Logon the peer has declared no identity yet, so the
                            // raw socket address is used as a placeholder target; once
                            // logged in, replies address the peer by its declared id.
                            let peer_str = peer.to_string();
                            let target = session.target_id().unwrap_or(&peer_str);
                            for reply in output.replies {
                                write_reply(&mut stream, &config.comp_id, target, reply.seq, reply.builder).await?;
                            }
                            if output.close || session.state() == SessionState::Closing {
                                stream.shutdown().await.ok();
                                finalize(&config, &engine, &session);
                                return Ok(());
                            }
                        }
                        Ok(None) => break,
                        Err(ProtocolError::ChecksumMismatch { .. }) => {
                            // §4.5: silently drop the offending frame; no reply required.
                            crate::metrics::messages_rejected("checksum");
                            break;
                        }
                        Err(err) => {
                            warn!(%peer, error = %err, "protocol error, dropping frame");
                            crate::metrics::messages_rejected("protocol");
                            break;
                        }
                    }
                }
            }
            Ok(Err(err)) => {
                warn!(%peer, error = %err, "socket read failed");
                break;
            }
            Err(_elapsed) => {
                if splitter.has_pending() {
                    warn!(%peer, "partial frame idle timeout, closing session");
                    break;
                }
                if session.is_dead(std::time::Instant::now()) {
                    warn!(%peer, "heartbeat timeout, closing session");
                    break;
                }
                if session.needs_heartbeat(std::time::Instant::now()) {
                    let peer_str = peer.to_string();
                    let target = session.target_id().unwrap_or(&peer_str).to_string();
                    let hb = session.heartbeat_reply();
                    write_reply(&mut stream, &config.comp_id, &target, hb.seq, hb.builder).await?;
                }
            }
        }
    }

    finalize(&config, &engine, &session);
    Ok(())
}

async fn write_reply(
    stream: &mut TcpStream,
    sender: &str,
    target: &str,
    seq: u32,
    builder: crate::fix::FixMessageBuilder,
) -> anyhow::Result<()> {
    let bytes = encode(sender, target, seq, &sending_time_now(), builder);
    stream.write_all(&bytes).await?;
    Ok(())
}

/// Applies the cancel-on-disconnect policy (§5, §9 Open Question (b)) and
/// releases session resources.
fn finalize(config: &Config, engine: &Arc<MatchingEngine>, session: &Session) {
    if config.cancel_on_disconnect {
        for (symbol, order_id) in session.resting_order_ids() {
            let _ = engine.cancel(&symbol, order_id);
        }
    }
}
