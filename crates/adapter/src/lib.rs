//! HTTP adapter: the forum REST API as a feed page source and as repositories.

mod api;
mod repos;

pub use api::{ApiClient, ApiConfig};
