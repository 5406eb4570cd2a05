//! Centralized logic for initializing http clients to
//! ensure uniform configuration.

use crate::errors::DistResult;
use axoasset::reqwest;

/// User-Agent sent with every request (the release API rejects requests without one)
pub const USER_AGENT: &str = concat!("debdist/", env!("CARGO_PKG_VERSION"));

/// Settings for http clients
///
/// Any settings that should apply to all http requests should
/// be stored here, to avoid different configurations.
///
/// Requests carry no timeout of their own, the retry budget is what bounds them.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {}

impl ClientSettings {
    /// Create new ClientSettings using all necessary values
    pub fn new() -> Self {
        Self::default()
    }
}

/// Create a raw reqwest client
///
/// Ideally this should be called only once per run and reused!
pub fn create_reqwest_client(ClientSettings {}: &ClientSettings) -> DistResult<reqwest::Client> {
    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    Ok(client)
}
