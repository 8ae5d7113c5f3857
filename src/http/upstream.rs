//! Upstream origin addressing and credentials.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION},
    uri::{Authority, Scheme},
    HeaderValue, Uri,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;
use tokio_tungstenite::tungstenite::{
    self, client::IntoClientRequest, handshake::client::Request as WsRequest,
};
use url::Url;

use crate::config::{Credentials, UpstreamConfig};

/// Errors building the upstream description.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream origin '{0}'")]
    InvalidOrigin(String),

    #[error("credentials cannot be encoded as a header: {0}")]
    Credentials(#[from] InvalidHeaderValue),
}

/// The single upstream origin: HTTP for forwarding, WS for the relay.
#[derive(Debug, Clone)]
pub struct Upstream {
    authority: Authority,
    authorization: Option<HeaderValue>,
}

impl Upstream {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let invalid = || UpstreamError::InvalidOrigin(config.origin.clone());

        let url = Url::parse(&config.origin).map_err(|_| invalid())?;
        if url.scheme() != "http" {
            return Err(invalid());
        }
        let host = url.host_str().ok_or_else(invalid)?;
        let port = url.port_or_known_default().unwrap_or(80);
        let authority: Authority = format!("{}:{}", host, port).parse().map_err(|_| invalid())?;

        let authorization = config.credentials.as_ref().map(basic_auth).transpose()?;

        Ok(Self {
            authority,
            authorization,
        })
    }

    /// `host:port` of the origin.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// `Authorization` header to attach, when credentials are configured.
    pub fn authorization(&self) -> Option<&HeaderValue> {
        self.authorization.as_ref()
    }

    /// Absolute HTTP URI for a path and query on the origin.
    pub fn http_uri(&self, path_and_query: &str) -> Result<Uri, axum::http::Error> {
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }

    /// WebSocket handshake request for a path and query on the origin.
    pub fn websocket_request(&self, path_and_query: &str) -> Result<WsRequest, tungstenite::Error> {
        let mut request = format!("ws://{}{}", self.authority, path_and_query).into_client_request()?;
        if let Some(auth) = &self.authorization {
            request.headers_mut().insert(AUTHORIZATION, auth.clone());
        }
        Ok(request)
    }
}

/// `Basic <base64(username:password)>`, marked sensitive.
pub fn basic_auth(credentials: &Credentials) -> Result<HeaderValue, InvalidHeaderValue> {
    let token = BASE64.encode(format!("{}:{}", credentials.username, credentials.password));
    let mut value = HeaderValue::from_str(&format!("Basic {}", token))?;
    value.set_sensitive(true);
    Ok(value)
}
