use std::time::Duration;

use reqwest::{Client, Error};

const USER_AGENT: &str = concat!("guildbeat/", env!("CARGO_PKG_VERSION"));

pub struct HttpClient;

impl HttpClient {
    pub fn user_agent() -> &'static str {
        USER_AGENT
    }

    /// Client shared by the node and bridge collaborators. Callers still wrap
    /// individual calls in their own, usually tighter, timeouts.
    pub fn new(timeout: Duration) -> Result<Client, Error> {
        Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
    }
}
