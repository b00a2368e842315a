//! Request and response model shared by the stores, the fetcher and the interceptor.
//!
//! A [`Response`] owns a move-once [`Body`]. Writing a network response into a
//! store while also handing it to the caller requires an explicit
//! [`Response::duplicate`] before either copy is read.

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::hash::compute_entry_key;

/// Header list in wire order. Names are kept as received.
pub type Headers = Vec<(String, String)>;

/// An outgoing request as seen by the interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: Headers,
}

impl Request {
    /// Build a request; the method is upper-cased and the fragment dropped.
    pub fn new(method: &str, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url, headers: Vec::new() }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// The identity this request is stored under.
    pub fn key(&self) -> RequestKey {
        RequestKey { method: self.method.clone(), url: self.url.clone() }
    }
}

/// Request identity: method plus URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub method: String,
    pub url: Url,
}

impl RequestKey {
    pub fn get(url: Url) -> Self {
        Request::get(url).key()
    }

    /// Stable content-addressed id used as the persistent primary key.
    pub fn entry_id(&self) -> String {
        compute_entry_key(&self.method, self.url.as_str())
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Classification of a response relative to the app origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    Basic,
    /// Cross-origin response the origin may read.
    Cors,
    /// Cross-origin response without read access.
    Opaque,
    /// Synthesised error response.
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::Error => "error",
        }
    }
}

impl std::str::FromStr for ResponseType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseType::Basic),
            "cors" => Ok(ResponseType::Cors),
            "opaque" => Ok(ResponseType::Opaque),
            "error" => Ok(ResponseType::Error),
            other => Err(crate::Error::InvalidInput(format!("unknown response type: {other}"))),
        }
    }
}

/// A response body that can be read exactly once.
#[derive(Debug, Default)]
pub struct Body(Bytes);

impl Body {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the body.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

/// A live response. Deliberately not `Clone`: use [`Response::duplicate`].
#[derive(Debug)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub response_type: ResponseType,
    pub headers: Headers,
    pub body: Body,
}

impl Response {
    pub fn new(url: Url, status: u16, response_type: ResponseType, body: Body) -> Self {
        Self { url, status, response_type, headers: Vec::new(), body }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Status in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Only a plain 200 from the app's own origin is written through to a store.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    /// Split into two independently readable copies before either body is consumed.
    pub fn duplicate(self) -> (Response, Response) {
        let bytes = self.body.into_bytes();
        let copy = Response {
            url: self.url.clone(),
            status: self.status,
            response_type: self.response_type,
            headers: self.headers.clone(),
            body: Body(bytes.clone()),
        };
        let original = Response {
            url: self.url,
            status: self.status,
            response_type: self.response_type,
            headers: self.headers,
            body: Body(bytes),
        };
        (original, copy)
    }

    /// Consume the response into its persisted form.
    pub fn into_stored(self) -> StoredResponse {
        StoredResponse {
            url: self.url,
            status: self.status,
            response_type: self.response_type,
            headers: self.headers,
            body: self.body.into_bytes(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A response as held by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub url: Url,
    pub status: u16,
    pub response_type: ResponseType,
    pub headers: Headers,
    pub body: Bytes,
    /// RFC 3339 timestamp of the write.
    pub stored_at: String,
}

impl StoredResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    /// Rebuild a live response carrying the stored status, headers and body verbatim.
    pub fn into_response(self) -> Response {
        Response {
            url: self.url,
            status: self.status,
            response_type: self.response_type,
            headers: self.headers,
            body: Body(self.body),
        }
    }
}

fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
