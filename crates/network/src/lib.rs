// crates/network/src/lib.rs
//! HTTP plumbing shared by the content server source and the Meilisearch client

mod client;
mod error;

pub use client::{Client, ClientConfig, Download};
pub use error::{NetworkError, NetworkResult};
pub use reqwest::Url;
