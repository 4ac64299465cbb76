//! Remote catalog client.
//!
//! [`CatalogClient`] speaks the catalog's REST API through a [`Transport`],
//! keeps the bearer token in an [`AuthState`], and can rebuild the
//! catalog's view of a source as a [`Document`](crate::model::Document).

pub mod auth;
pub mod body;
pub mod client;
mod populate;
pub mod transport;

pub use auth::AuthState;
pub use body::{item_body, relationship_body, set_body};
pub use client::CatalogClient;
pub use transport::{ApiRequest, ApiResponse, Credentials, HttpTransport, Method, Transport};
