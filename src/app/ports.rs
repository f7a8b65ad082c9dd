use crate::error::Result;
use serde_json::Value;

/// Blocking HTTP access used by the fetcher.
pub trait HttpClientPort: Send + Sync {
    /// GET `url` with the given query parameters and decode the body as JSON.
    /// Non-2xx responses are errors.
    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value>;
}

impl<T: HttpClientPort + ?Sized> HttpClientPort for std::sync::Arc<T> {
    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        (**self).get_json(url, query)
    }
}
