use std::time::Duration;

use reqwest::blocking::Client;

use crate::types::{BrowserError, HttpProbe};

/// Gateway errors mean the app is not serving yet; anything else counts as up.
const NOT_READY: [u16; 3] = [502, 503, 504];

pub struct ReqwestProbe {
    client: Client,
}

impl ReqwestProbe {
    pub fn new(timeout: Duration) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| BrowserError::Probe(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpProbe for ReqwestProbe {
    fn probe(&self, url: &str) -> Result<u16, BrowserError> {
        let resp = self.client.get(url).send().map_err(|e| BrowserError::Probe(e.to_string()))?;
        let status = resp.status().as_u16();
        if NOT_READY.contains(&status) {
            return Err(BrowserError::Probe(format!("{url} answered {status}")));
        }
        Ok(status)
    }
}
