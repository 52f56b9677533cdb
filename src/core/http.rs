use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use reqwest::Client;
use tracing::warn;

use crate::core::config::FetchConfig;

/// Build the shared client with the identification header and socket timeouts.
///
/// An unusable user agent is logged and skipped; the client still works
/// without it, only with a higher chance of being refused by picky mirrors.
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    match HeaderValue::from_str(&config.user_agent) {
        Ok(agent) => {
            default_headers.insert(USER_AGENT, agent);
        }
        Err(e) => warn!(
            "Ignoring unusable user agent {:?}: {}; continuing without it",
            config.user_agent, e
        ),
    }

    Client::builder()
        .default_headers(default_headers)
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .build()
}
