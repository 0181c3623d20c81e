//! # Skaia Live Client
//!
//! Client side of the Skaia live-update channel.
//!
//! - [`ConnectionManager`] owns one WebSocket to `{ws|wss}://<host>/api/ws`
//!   and reconnects with a fixed delay and a bounded number of attempts
//! - [`MessageRouter`] hands each inbound frame's payload to the listeners
//!   registered for its `type`
//! - [`CartStore`] and [`ThreadList`] hold UI state and mirror local
//!   changes through the manager
//!
//! ```no_run
//! use skaia_client::{ClientConfig, ConnectionManager, ThreadList};
//!
//! # async fn run() -> Result<(), skaia_client::ClientError> {
//! let manager = ConnectionManager::new("https://skaia.example", ClientConfig::default())?;
//! let forum = ThreadList::new(manager.clone());
//! let _subscriptions = forum.attach();
//!
//! manager.connect().await?;
//! forum.create_thread("Hi", "Hello");
//! # Ok(())
//! # }
//! ```

pub mod cart;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod forum;
pub mod manager;
pub mod router;
pub mod transport;

pub use cart::CartStore;
pub use config::ClientConfig;
pub use endpoint::channel_endpoint;
pub use error::{ClientError, ClientResult};
pub use forum::ThreadList;
pub use manager::{ConnectionManager, ConnectionState};
pub use router::{Listener, MessageRouter, Subscription};
pub use transport::{Channel, Connector, WebSocketConnector};

pub use skaia_protocol as protocol;
