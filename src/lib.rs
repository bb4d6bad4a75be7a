//! # memberkit
//!
//! Session and authenticated-request layer for a membership client: the
//! digital card, partner directory and booking screens all sit on top of it.
//!
//! ## Architecture Overview
//!
//! - **[`store`]**: durable key/value storage behind the [`store::CredentialStore`] trait
//! - **[`session`]**: in-memory cache, the [`SessionManager`] that owns the logged-in
//!   identity, and the [`session::IdentityPublisher`] that notifies consumers of changes
//! - **[`dispatch`]**: the [`Dispatcher`] through which every HTTP call is made, attaching
//!   the credential and normalizing the backend's response shapes
//! - **[`client`]**: the [`MemberClient`] facade the UI layer calls
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memberkit::{ClientConfig, MemberClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = MemberClient::new(ClientConfig::load(None)?)?;
//!
//!     if client.current_identity().await.is_none() {
//!         client.login("123.456.789-00", "secret").await?;
//!     }
//!
//!     let dependents = client.request("dependentes.php", &json!({}), true).await?;
//!     println!("{}", dependents);
//!     Ok(())
//! }
//! ```

/// UI-facing facade over session and dispatch.
pub mod client;

/// Client configuration with file discovery and environment overrides.
pub mod config;

/// Outbound HTTP dispatch and response normalization.
pub mod dispatch;

/// Environment constants and path utilities.
pub mod env;

/// Error taxonomy shared by all components.
pub mod error;

/// The authenticated principal and its wire decoding.
pub mod identity;

/// Session cache, manager and change publisher.
pub mod session;

/// Durable key/value storage.
pub mod store;

pub use client::MemberClient;
pub use config::ClientConfig;
pub use dispatch::{Dispatcher, Encoding, HttpTransport, Method, RequestOptions};
pub use error::{SessionError, StoreError};
pub use identity::{Address, Credential, Identity, IdentityId, Role};
pub use session::{Durability, SessionManager, SessionState, SubscriptionId};
