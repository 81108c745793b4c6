pub mod client;
pub mod models;

pub use client::{HttpTransport, ManifestClient};
pub use models::ApiConfig;
