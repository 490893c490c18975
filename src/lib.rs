//! # flightwire
//!
//! A single-route server-sent events endpoint. `GET /events` opens a
//! long-lived `text/event-stream` response that pushes flight status
//! updates on a fixed schedule plus a periodic heartbeat, until the client
//! disconnects.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flightwire::{Config, Server, StreamHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let handler = Arc::new(StreamHandler::new(&config)?);
//!     let server = Server::bind(config.bind_addr()).await?;
//!     server.run(move |req| {
//!         let handler = Arc::clone(&handler);
//!         async move { handler.handle(&req) }
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod handler;
pub mod http;
pub mod realtime;
pub mod server;

pub use config::{Config, ConfigError};
pub use handler::{STREAM_PATH, StreamHandler};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use server::{Server, ServerError};
