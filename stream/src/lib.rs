//! Herald Stream - real-time delivery of push notifications.
//!
//! Clients hold a WebSocket open per device. The [`Hub`] keeps every open
//! session per user, pushes each notification to all of them, and evicts
//! sessions that stop answering pings.
//!
//! # Components
//!
//! - [`hub`]: sessions, registry, keepalive and fan-out
//! - [`server`]: axum router and server lifecycle
//! - [`auth`]: caller identity handed over by the authentication layer
//! - [`config`]: keepalive and listener configuration
//! - [`error`]: error types and the JSON error envelope
//! - [`messages`]: notification payloads

pub mod auth;
pub mod config;
pub mod error;
pub mod hub;
pub mod messages;
pub mod server;

pub use auth::{register_authentication, AuthenticatedUser};
pub use config::{HubConfig, ServerConfig};
pub use error::{ErrorBody, HubError, SessionError};
pub use hub::{Hub, HubMetrics, Session, SessionState};
pub use messages::{Message, NewMessage, UserId};
pub use server::{router, Server};
