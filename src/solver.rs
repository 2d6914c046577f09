//! The seam to the external solver.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::{Request, Response};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One request, one response. Implementations must not retry on their own.
pub trait SolverClient: Send + Sync + 'static {
    fn call(&self, request: Request) -> impl Future<Output = Result<Response, ClientError>> + Send;
}

/// Sends `request` and turns a solver-side `Error` into [`ClientError::Server`].
pub(crate) async fn exchange<S: SolverClient>(
    solver: &S,
    request: Request,
) -> Result<Response, ClientError> {
    let kind = request.kind();
    debug!("-> {}", kind);
    match solver.call(request).await {
        Ok(Response::Error { message }) => {
            warn!("{} rejected by solver: {}", kind, message);
            Err(ClientError::Server(message))
        }
        Ok(resp) => {
            debug!("<- {}", resp.kind());
            Ok(resp)
        }
        Err(e) => {
            warn!("{} failed: {}", kind, e);
            Err(e)
        }
    }
}

pub(crate) fn unexpected(expected: &str, got: &Response) -> ClientError {
    ClientError::Contract(format!("expected {expected}, got {}", got.kind()))
}

struct Connection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

/// Newline-delimited JSON over TCP.
///
/// The connection is opened lazily and dropped after any I/O failure; the
/// next call reconnects. Calls are serialized over the single connection.
pub struct TcpSolverClient {
    addr: String,
    timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl TcpSolverClient {
    pub fn new(cfg: &ClientConfig) -> Self {
        Self {
            addr: cfg.solver_addr.clone(),
            timeout: cfg.request_timeout(),
            conn: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> Result<Connection, ClientError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| ClientError::Transport(format!("connect {}: {e}", self.addr)))?;
        stream.set_nodelay(true).ok();
        let (reader, writer) = stream.into_split();
        debug!("Connected to solver at {}", self.addr);
        Ok(Connection {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    async fn round_trip(conn: &mut Connection, line: &str) -> Result<Response, ClientError> {
        conn.writer.write_all(line.as_bytes()).await?;
        conn.writer.write_all(b"\n").await?;
        conn.writer.flush().await?;

        let reply = conn
            .lines
            .next_line()
            .await?
            .ok_or_else(|| ClientError::Transport("solver closed the connection".into()))?;
        serde_json::from_str(&reply)
            .map_err(|e| ClientError::Contract(format!("invalid response: {e}")))
    }
}

impl SolverClient for TcpSolverClient {
    async fn call(&self, request: Request) -> Result<Response, ClientError> {
        let line = serde_json::to_string(&request)
            .map_err(|e| ClientError::Transport(format!("encode request: {e}")))?;

        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(ClientError::Transport("no connection".into()));
        };

        let result = match tokio::time::timeout(self.timeout, Self::round_trip(conn, &line)).await
        {
            Ok(r) => r,
            Err(_) => Err(ClientError::Transport(format!(
                "no reply within {} ms",
                self.timeout.as_millis()
            ))),
        };
        // A half-read line would desync every later reply.
        if matches!(result, Err(ClientError::Transport(_) | ClientError::Contract(_))) {
            *guard = None;
        }
        result
    }
}
