//! Client for Perplexity's Socket.IO answer stream.
//!
//! A [`Session`] negotiates a sid over the polling transport, upgrades to a
//! websocket through the probe exchange, then asks questions and reads back
//! answers. Follow-up questions carry the continuation token from the
//! previous answer so the remote treats them as one thread.
//!
//! ```no_run
//! # async fn run() -> Result<(), perplexity::SessionError> {
//! let config = perplexity::ClientConfig::from_env()?;
//! let mut session = perplexity::Session::connect(config).await?;
//! session.ask("what is 2+2").await?;
//! let answer = session.read_answer().await?;
//! println!("{}", answer.answer);
//! session.close().await
//! # }
//! ```
//!
//! Wire framing lives in the `frames` crate.

pub mod config;
pub mod cookies;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod session;
pub mod transport;
pub mod types;
pub mod upgrade;

#[cfg(test)]
mod test_support;

pub use config::{AskOptions, ClientConfig, Timeouts};
pub use error::SessionError;
pub use identity::Identity;
pub use session::{Session, SessionState};
pub use transport::{FrameSocket, TransportError, WsSocket};
pub use types::{AnswerDetails, SearchFocus, SearchMode, SearchSource, SessionDescriptor, WebResult};
