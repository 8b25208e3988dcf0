#![allow(dead_code)]

use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use jobsocket_client::{ChannelClient, ClientConfig};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Reconnect delay used by tests; short, but long enough to measure.
pub const TEST_DELAY: Duration = Duration::from_millis(300);

/// One accepted WebSocket connection on the scheduler side.
pub struct ServerConn {
    pub ws: WebSocketStream<TcpStream>,
    pub path: String,
    pub accepted_at: Instant,
}

impl ServerConn {
    /// Push a text frame to the client.
    pub async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string()))
            .await
            .expect("server send should succeed");
    }

    /// Next text frame from the client, skipping control frames.
    pub async fn next_text(&mut self) -> String {
        tokio::time::timeout(WAIT, async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Text(text))) => return text,
                    Some(Ok(Message::Close(frame))) => panic!("client closed: {frame:?}"),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => panic!("server receive error: {e}"),
                    None => panic!("client stream ended"),
                }
            }
        })
        .await
        .expect("timed out waiting for a client frame")
    }

    /// Wait for the client to close, answering its Close frame and
    /// reading on until the stream ends.
    pub async fn expect_closed(&mut self) {
        tokio::time::timeout(WAIT, async {
            loop {
                match self.ws.next().await {
                    Some(Err(_)) | None => return,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await
        .expect("timed out waiting for the client to close");
    }

    /// Wait for the client's Close frame and stop reading, so the reply
    /// tungstenite queued is never flushed.
    pub async fn expect_close_frame(&mut self) {
        tokio::time::timeout(WAIT, async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Close(_))) => return,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => panic!("server receive error: {e}"),
                    None => panic!("client stream ended before its Close frame"),
                }
            }
        })
        .await
        .expect("timed out waiting for a Close frame");
    }
}

/// Loopback scheduler stand-in that hands every accepted connection to
/// the test.
pub struct TestServer {
    pub origin: String,
    conns: mpsc::UnboundedReceiver<ServerConn>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let accepted_at = Instant::now();
                let mut path = String::new();
                let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    path = req.uri().path().to_string();
                    Ok(resp)
                };
                let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    continue;
                };
                let conn = ServerConn {
                    ws,
                    path,
                    accepted_at,
                };
                if tx.send(conn).is_err() {
                    break;
                }
            }
        });

        Self {
            origin: format!("http://{addr}"),
            conns: rx,
        }
    }

    /// Client config pointing at this server with the short test delay.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.origin)
            .expect("loopback origin is valid")
            .with_reconnect_delay(TEST_DELAY)
    }

    /// Next accepted connection, or panic after [`WAIT`].
    pub async fn accept(&mut self) -> ServerConn {
        tokio::time::timeout(WAIT, self.conns.recv())
            .await
            .expect("timed out waiting for a client connection")
            .expect("server task stopped")
    }

    /// `true` if a connection arrives within `within`.
    pub async fn accepts_within(&mut self, within: Duration) -> bool {
        matches!(tokio::time::timeout(within, self.conns.recv()).await, Ok(Some(_)))
    }
}

/// Poll `cond` until it holds or [`WAIT`] elapses.
pub async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Connect `client` and wait for both ends to see the connection.
pub async fn connect_and_open(client: &ChannelClient, server: &mut TestServer) -> ServerConn {
    client.connect();
    let conn = server.accept().await;
    assert!(wait_for(|| client.is_connected()).await, "client never reported open");
    conn
}
