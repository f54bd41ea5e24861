use crate::error::AppResult;
use reqwest::Client;

pub const USER_AGENT: &str = "API-Proxy-Service/1.0";

/// Shared outbound HTTP client.
///
/// No client-wide timeout: every call sets its own, per upstream.
pub fn create_client() -> AppResult<Client> {
    let client = Client::builder().user_agent(USER_AGENT).build()?;
    Ok(client)
}
