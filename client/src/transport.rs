//! # Channel Transport
//!
//! The manager never touches a socket directly. It asks a [`Connector`]
//! for a [`Channel`]: a sink of outbound text frames plus a stream of
//! inbound text frames. The stream ending means the channel closed.
//!
//! [`WebSocketConnector`] is the production implementation on top of
//! `tokio-tungstenite`.

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;
use url::Url;

/// Outbound half of a [`Channel`]: accepts text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = ClientError> + Send>>;
/// Inbound half of a [`Channel`]: yields text frames until the channel
/// closes. An `Err` item is a transport failure.
pub type FrameStream = Pin<Box<dyn Stream<Item = ClientResult<String>> + Send>>;

/// One physical duplex channel, split into its two halves.
pub struct Channel {
    /// Frames written here go out to the hub. Closing it closes the channel.
    pub sink: FrameSink,

    /// Frames received from the hub.
    pub stream: FrameStream,
}

impl Channel {
    /// Boxes the two halves of a channel.
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<String, Error = ClientError> + Send + 'static,
        R: Stream<Item = ClientResult<String>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

/// Opens channels to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Resolves once the channel is open, or fails if the attempt is
    /// refused outright.
    async fn open(&self, endpoint: &Url) -> ClientResult<Channel>;
}

/// Connects over WebSocket (`wss://` needs the default `tls` feature).
/// Only text frames reach the router; binary,
/// ping and pong frames are dropped here and a close frame ends the
/// inbound stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, endpoint: &Url) -> ClientResult<Channel> {
        let (ws_stream, _response) = connect_async(endpoint.as_str()).await?;
        debug!("WebSocket handshake completed with {}", endpoint);

        let (ws_sink, ws_source) = ws_stream.split();

        let sink = ws_sink.with(|text: String| {
            future::ready(Ok::<_, ClientError>(Message::Text(text.into())))
        });

        let stream = ws_source
            .take_while(|frame| future::ready(!matches!(frame, Ok(Message::Close(_)))))
            .filter_map(|frame| {
                future::ready(match frame {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(_) => None,
                    Err(e) => Some(Err(ClientError::from(e))),
                })
            });

        Ok(Channel::new(sink, stream))
    }
}
