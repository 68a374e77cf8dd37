// 🌐 HTTP transport
//
// HttpFetch is the seam between the collectors and the network. The real
// implementation is a blocking reqwest client configured once (user agent,
// timeout); tests plug in canned responses.

use crate::config::CollectorConfig;
use crate::error::{SourceError, SourceResult};

/// Raw upstream response: status code plus body bytes
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// GET-only transport used by the source clients
///
/// Implementations return Ok for any HTTP status; only failures to obtain a
/// response at all (connect, DNS, timeout, body read) are errors.
pub trait HttpFetch {
    fn get(&self, url: &str) -> SourceResult<HttpResponse>;
}

// ============================================================================
// REQWEST IMPLEMENTATION
// ============================================================================

pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    pub fn new(config: &CollectorConfig) -> SourceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::transport("client", e))?;

        Ok(ReqwestFetcher { client })
    }
}

impl HttpFetch for ReqwestFetcher {
    fn get(&self, url: &str) -> SourceResult<HttpResponse> {
        let response = self.client.get(url).send().map_err(|e| map_reqwest(url, e))?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| map_reqwest(url, e))?;

        tracing::debug!(url, status, bytes = body.len(), "http get");

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn map_reqwest(url: &str, e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout { url: url.to_string() }
    } else {
        SourceError::transport(url, e)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================
