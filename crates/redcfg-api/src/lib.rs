// redcfg-api: Async Rust client for the Redfish management API

pub mod auth;
pub mod client;
pub mod error;
pub mod jobs;
pub mod models;
pub mod registries;
pub mod systems;
pub mod transport;

pub use auth::Credentials;
pub use client::RedfishClient;
pub use error::Error;
pub use models::SubmitResponse;
pub use transport::{TlsMode, TransportConfig};
