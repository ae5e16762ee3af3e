use url::Url;

use crate::{Error, Result};

pub const START_TEST_PATH: &str = "/start-test";
pub const STREAM_PATH: &str = "/ws";

/// Addresses of the test-runner service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub start_test: Url,
    pub stream: Url,
}

impl Endpoints {
    /// Derives both endpoints from the runner's base URL
    /// (`http://host:port` → `http://host:port/start-test`, `ws://host:port/ws`).
    pub fn from_server(server: &str) -> Result<Self> {
        let base = parse(server)?;
        if base.scheme() != "http" {
            return Err(Error::InvalidUrl(format!(
                "{server} (only http:// runner URLs are supported)"
            )));
        }

        let start_test = base
            .join(START_TEST_PATH)
            .map_err(|_| Error::InvalidUrl(server.to_string()))?;

        let mut stream = base
            .join(STREAM_PATH)
            .map_err(|_| Error::InvalidUrl(server.to_string()))?;
        stream
            .set_scheme("ws")
            .map_err(|()| Error::InvalidUrl(server.to_string()))?;

        Ok(Self { start_test, stream })
    }

    pub fn with_stream_url(mut self, stream: &str) -> Result<Self> {
        let url = parse(stream)?;
        if url.scheme() != "ws" {
            return Err(Error::InvalidUrl(format!(
                "{stream} (only ws:// stream URLs are supported)"
            )));
        }
        self.stream = url;
        Ok(self)
    }
}

fn parse(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|_| Error::InvalidUrl(raw.to_string()))?;
    if url.host_str().is_none() {
        return Err(Error::InvalidUrl(format!("{raw} (missing host)")));
    }
    Ok(url)
}
