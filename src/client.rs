//! BrowserStack App Automate HTTP client.
//!
//! Every call carries basic authentication and is expected to answer with a
//! JSON object. Status classification happens before decoding, so a non-2xx
//! answer is always a [`Error::Remote`] whether or not its body parses.

use reqwest::{Client, Method, RequestBuilder, Url, header::CONTENT_TYPE, multipart::Form};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    config::Credentials,
    error::{Error, Result},
    multipart::MultipartUpload,
};

pub const DEFAULT_BASE_URL: &str = "https://api-cloud.browserstack.com/";

/// Decoded JSON object returned by the API.
pub type JsonObject = Map<String, Value>;

/// Request payloads the API accepts.
pub enum RequestBody {
    Json(Vec<u8>),
    Multipart(Form),
}

impl RequestBody {
    fn attach(self, req: RequestBuilder) -> RequestBuilder {
        match self {
            RequestBody::Json(bytes) => {
                debug!(bytes = bytes.len(), "json body");
                req.header(CONTENT_TYPE, "application/json").body(bytes)
            }
            RequestBody::Multipart(form) => {
                debug!(boundary = form.boundary(), "multipart body");
                req.multipart(form)
            }
        }
    }
}

pub struct BrowserStackClient {
    http: Client,
    base_url: Url,
    credentials: Credentials,
}

impl BrowserStackClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let base_url = parse_base_url(DEFAULT_BASE_URL)?;
        let http = Client::builder()
            .user_agent(concat!("bstack-xcuitest/", env!("CARGO_PKG_VERSION")))
            .use_rustls_tls()
            .build()
            .map_err(|source| Error::Network {
                method: "INIT".into(),
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Overrides the API root. Useful for tests with a mock server.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Resolves an endpoint path relative to the API root.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|_| Error::Config {
            key: format!("api_url ({}{path})", self.base_url),
        })
    }

    pub async fn get(&self, path: &str) -> Result<JsonObject> {
        let url = self.endpoint(path)?;
        self.execute(Method::GET, url, None).await
    }

    pub async fn post_multipart(&self, path: &str, upload: MultipartUpload) -> Result<JsonObject> {
        let url = self.endpoint(path)?;
        let form = upload.into_form().map_err(|source| Error::Network {
            method: Method::POST.to_string(),
            url: url.to_string(),
            source,
        })?;
        self.execute(Method::POST, url, Some(RequestBody::Multipart(form)))
            .await
    }

    pub async fn post_json<T: Serialize>(&self, path: &str, payload: &T) -> Result<JsonObject> {
        let url = self.endpoint(path)?;
        let body = serde_json::to_vec(payload).map_err(|source| Error::Decode {
            url: url.to_string(),
            source,
        })?;
        self.execute(Method::POST, url, Some(RequestBody::Json(body)))
            .await
    }

    /// Sends one request and classifies the answer.
    pub async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<RequestBody>,
    ) -> Result<JsonObject> {
        info!(method = %method, url = %url, "request");

        let mut req = self
            .http
            .request(method.clone(), url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password));
        if let Some(body) = body {
            req = body.attach(req);
        }

        let network = |source| Error::Network {
            method: method.to_string(),
            url: url.to_string(),
            source,
        };
        let res = req.send().await.map_err(network)?;
        let status = res.status();
        let raw = res.bytes().await.map_err(network)?;
        let decoded = serde_json::from_slice::<JsonObject>(&raw);

        match &decoded {
            Ok(obj) => info!(status = status.as_u16(), body = ?obj, "response"),
            Err(_) => info!(
                status = status.as_u16(),
                body = %String::from_utf8_lossy(&raw),
                "response (not a JSON object)"
            ),
        }

        if !status.is_success() {
            return Err(Error::Remote {
                url: url.to_string(),
                status: status.as_u16(),
                body: decoded.ok(),
            });
        }
        decoded.map_err(|source| Error::Decode {
            url: url.to_string(),
            source,
        })
    }
}

/// Parses an API root, forcing a trailing slash so relative joins append.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    match Url::parse(&with_slash) {
        Ok(url) if !url.cannot_be_a_base() => Ok(url),
        _ => Err(Error::Config {
            key: format!("api_url ({raw})"),
        }),
    }
}

/// Reads a string field from a decoded response.
pub fn string_field(obj: &JsonObject, field: &'static str, url: &Url) -> Result<String> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::MissingField {
            field,
            url: url.to_string(),
        })
}
