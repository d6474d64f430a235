//! Buffered request handed to route handlers
//!
//! The server collects the body once (size-capped) and passes an
//! [`ApiRequest`] down, so handlers never touch the hyper connection and can
//! be driven directly in tests.

use bytes::Bytes;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::CallistoError;

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    /// Build a request from a method and a `path?query` string
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (uri.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Bytes::from(serde_json::to_vec(body).unwrap_or_default());
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    pub fn with_bearer(mut self, token: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
            self.headers.insert(AUTHORIZATION, value);
        }
        self
    }

    /// Deserialize the JSON body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, CallistoError> {
        if self.body.is_empty() {
            return Err(CallistoError::validation("Request body is required"));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decoded value of the first `key` query parameter
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            if k != key {
                return None;
            }
            let v = v.replace('+', " ");
            Some(
                urlencoding::decode(&v)
                    .map(|s| s.into_owned())
                    .unwrap_or(v),
            )
        })
    }

    /// Path split into non-empty segments
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }
}
