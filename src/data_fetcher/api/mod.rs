pub mod urls;
pub mod http_client;
mod client;
mod fetch_utils;

// Re-export URL utilities
pub use urls::*;
// Re-export HTTP client utilities
pub use http_client::create_http_client_with_timeout;
// Re-export core API client
pub use client::StatsApi;
