use crate::app::ports::HttpClientPort;
use crate::error::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

pub struct ReqwestHttp {
    client: reqwest::blocking::Client,
}

impl Default for ReqwestHttp {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestHttp {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl HttpClientPort for ReqwestHttp {
    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let resp = self.client.get(url).query(query).send()?.error_for_status()?;
        debug!(url, status = resp.status().as_u16(), "GET");
        Ok(resp.json::<Value>()?)
    }
}

/// In-memory HTTP adapter serving canned JSON bodies keyed by URL.
///
/// Unknown URLs answer with the API's "no data" shape
/// (`[metadata, null]`). Every requested URL is recorded.
#[derive(Default)]
pub struct CannedHttp {
    responses: HashMap<String, Value>,
    requests: Mutex<Vec<String>>,
}

impl CannedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: impl Into<String>, body: Value) -> Self {
        self.responses.insert(url.into(), body);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl HttpClientPort for CannedHttp {
    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let query_string = query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(format!("{url}?{query_string}"));
        }
        Ok(self.responses.get(url).cloned().unwrap_or_else(|| {
            json!([{ "page": 1, "pages": 0, "per_page": 50, "total": 0 }, null])
        }))
    }
}
