//! Remote console transport: newline-delimited JSON over TCP.
//!
//! Every connected client receives every outbound broadcast (status
//! snapshots). Replies to a client's own requests go to that client only.

use flockstep_core::IntentRouter;
use flockstep_proto::OutboundMessage;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Accepts remote consoles until the runtime shuts down.
pub async fn serve(
    listener: TcpListener,
    router: IntentRouter,
    outbound: broadcast::Sender<OutboundMessage>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!(%peer, "Remote console connected");
                tokio::spawn(handle_client(stream, peer, router.clone(), outbound.subscribe()));
            }
            Err(e) => warn!(error = %e, "Failed to accept remote console"),
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    router: IntentRouter,
    mut outbound: broadcast::Receiver<OutboundMessage>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    // Show loading reads files; keep it off the reactor
                    let router = router.clone();
                    let reply = match tokio::task::spawn_blocking(move || router.handle_message(&line)).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            warn!(%peer, error = %e, "Message handler failed");
                            None
                        }
                    };
                    if let Some(reply) = reply {
                        if let Err(e) = write_message(&mut writer, &reply).await {
                            debug!(%peer, error = %e, "Write failed");
                            break;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(%peer, error = %e, "Read failed");
                    break;
                }
            },
            message = outbound.recv() => match message {
                Ok(message) => {
                    if let Err(e) = write_message(&mut writer, &message).await {
                        debug!(%peer, error = %e, "Write failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(%peer, skipped, "Remote console lagging, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    info!(%peer, "Remote console disconnected");
}

async fn write_message<W>(writer: &mut W, message: &OutboundMessage) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(message).map_err(std::io::Error::other)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use flockstep_core::{ModeRequest, ModeRequests};
    use flockstep_proto::{GlobalStatus, STATUS_SCHEMA_VERSION, StatusSnapshot};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn connect(
        router: IntentRouter,
    ) -> (
        tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
        tokio::net::tcp::OwnedWriteHalf,
        broadcast::Sender<OutboundMessage>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, _) = broadcast::channel(8);
        tokio::spawn(serve(listener, router, tx.clone()));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        (BufReader::new(reader).lines(), writer, tx)
    }

    async fn read_reply(
        lines: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    ) -> OutboundMessage {
        let line = lines.next_line().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn test_requests_and_error_replies() {
        let dir = TempDir::new().unwrap();
        let requests = Arc::new(ModeRequests::new());
        let router = IntentRouter::new(Arc::clone(&requests), dir.path(), 1.0);
        let (mut lines, mut writer, _tx) = connect(router).await;

        writer
            .write_all(b"{\"type\":\"prepare\"}\n{\"type\":\"warp\"}\n")
            .await
            .unwrap();

        let reply = read_reply(&mut lines).await;
        assert!(matches!(reply, OutboundMessage::Error { .. }));
        assert!(requests.is_pending(ModeRequest::Prepare));
    }

    #[tokio::test]
    async fn test_list_reply_goes_to_sender() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("opening.jocs"), "{}").unwrap();
        let router = IntentRouter::new(Arc::new(ModeRequests::new()), dir.path(), 1.0);
        let (mut lines, mut writer, _tx) = connect(router).await;

        writer.write_all(b"{\"type\":\"list\"}\n").await.unwrap();
        assert_eq!(
            read_reply(&mut lines).await,
            OutboundMessage::ListReply {
                files: vec!["opening.jocs".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_status_is_broadcast() {
        let dir = TempDir::new().unwrap();
        let router = IntentRouter::new(Arc::new(ModeRequests::new()), dir.path(), 1.0);
        let (mut lines, mut writer, tx) = connect(router).await;

        // A round trip guarantees the client task has subscribed.
        writer.write_all(b"{\"type\":\"list\"}\n").await.unwrap();
        read_reply(&mut lines).await;

        let status = StatusSnapshot {
            version: STATUS_SCHEMA_VERSION,
            time: 1.5,
            vehicles: Vec::new(),
            global: GlobalStatus {
                playing: true,
                ready: false,
                mode: "playing".to_string(),
            },
        };
        tx.send(OutboundMessage::Status(status.clone())).unwrap();
        assert_eq!(read_reply(&mut lines).await, OutboundMessage::Status(status));
    }
}
