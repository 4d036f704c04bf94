//! HTTP networking module
//!
//! Provides the HTTP client shared by every registry provider.

mod client;

pub use client::HttpClient;
