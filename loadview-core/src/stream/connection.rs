use futures_util::StreamExt as _;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::Result;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One established subscription to the result stream.
///
/// The socket is owned by this value: dropping it on any path (error,
/// cancellation, early return) releases the channel. [`Connection::close`]
/// additionally performs the close handshake.
pub struct Connection {
    url: Url,
    socket: Option<Socket>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url.as_str())
            .field("open", &self.socket.is_some())
            .finish()
    }
}

impl Connection {
    pub async fn open(url: &Url) -> Result<Self> {
        let (socket, _resp) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::info!(url = %url, "result stream connected");
        Ok(Self {
            url: url.clone(),
            socket: Some(socket),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Waits for the next data frame.
    ///
    /// Returns `Ok(None)` once the peer closes or the stream ends. Control
    /// frames are handled by the websocket layer and skipped here. Cancel-safe:
    /// dropping the future between frames loses nothing.
    pub async fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let Some(socket) = self.socket.as_mut() else {
                return Ok(None);
            };

            match socket.next().await {
                None => {
                    self.socket = None;
                    return Ok(None);
                }
                Some(Err(err)) => {
                    self.socket = None;
                    return Err(err.into());
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(bytes))) => return Ok(Some(bytes.to_vec())),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(url = %self.url, ?frame, "result stream close received");
                    self.socket = None;
                    return Ok(None);
                }
                Some(Ok(_)) => {}
            }
        }
    }

    /// Closes the channel. Safe to call more than once.
    pub async fn close(&mut self) {
        let Some(mut socket) = self.socket.take() else {
            return;
        };

        if let Err(err) = socket.close(None).await {
            tracing::debug!(url = %self.url, error = %err, "result stream close handshake failed");
        }
        tracing::info!(url = %self.url, "result stream closed");
    }
}
