//! REST API interaction module
//!
//! - [`auth`] - bearer tokens (Application Default Credentials or static)
//! - [`client`] - client combining credentials, HTTP and project
//! - [`http`] - HTTP utilities and typed API errors

pub mod auth;
pub mod client;
pub mod http;

pub use auth::Credentials;
pub use client::RestClient;
pub use http::{api_status, ApiError};
