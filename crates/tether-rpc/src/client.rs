//! HTTP transport for daemon calls.
//!
//! Every call is a `POST` of `{method, arguments}` to the server's RPC path.
//! The daemon guards the endpoint with a session token: a request without a
//! current token is answered with `409` carrying a fresh token in
//! [`SESSION_ID_HEADER`], after which the request is re-sent exactly once.

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::header::HeaderValue;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tether_core::{Credentials, ServerEndpoint};
use tracing::debug;
use url::Url;

use crate::error::{RpcError, RpcResult};
use crate::wire::{RpcRequest, RpcResponse};

/// Header carrying the daemon's anti-forgery session token.
pub const SESSION_ID_HEADER: &str = "X-Transmission-Session-Id";

/// RPC path used when a server profile does not override it.
pub const DEFAULT_RPC_PATH: &str = "/transmission/rpc";

const RESULT_SUCCESS: &str = "success";

/// Build the RPC URL for a server profile.
///
/// # Errors
///
/// Returns [`RpcError::InvalidEndpoint`] when the host is empty, the RPC path
/// is not absolute, or the pieces do not form a valid URL.
pub fn endpoint_url(server: &ServerEndpoint) -> RpcResult<Url> {
    let host = server.host.trim();
    if host.is_empty() {
        return Err(RpcError::InvalidEndpoint {
            reason: format!("server '{}' has no host", server.name),
        });
    }
    let path = if server.rpc_path.is_empty() {
        DEFAULT_RPC_PATH
    } else {
        server.rpc_path.as_str()
    };
    if !path.starts_with('/') {
        return Err(RpcError::InvalidEndpoint {
            reason: format!("rpc path '{path}' must start with '/'"),
        });
    }
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    let raw = format!(
        "{}://{host}:{}{path}",
        server.scheme.as_str(),
        server.port
    );
    Url::parse(&raw).map_err(|err| RpcError::InvalidEndpoint {
        reason: format!("'{raw}' is not a valid URL: {err}"),
    })
}

/// Client bound to one daemon endpoint.
#[derive(Clone)]
pub struct HttpTransmissionClient {
    client: Client,
    url: Url,
    credentials: Option<Credentials>,
    session_id: Arc<Mutex<Option<String>>>,
}

impl HttpTransmissionClient {
    /// Bind a shared HTTP client to `server`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidEndpoint`] when the profile cannot form a URL.
    pub fn new(client: Client, server: &ServerEndpoint) -> RpcResult<Self> {
        Ok(Self {
            client,
            url: endpoint_url(server)?,
            credentials: server.credentials.clone(),
            session_id: Arc::new(Mutex::new(None)),
        })
    }

    /// Endpoint this client posts to.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Session token currently held, if the handshake has happened.
    #[must_use]
    pub fn session_token(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_session_token(&self, token: String) {
        *self
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Invoke `method` and decode its `arguments` object into `R`.
    pub(crate) async fn call_as<A, R>(&self, method: &'static str, arguments: &A) -> RpcResult<R>
    where
        A: Serialize + Sync,
        R: DeserializeOwned,
    {
        let value = self.call(method, arguments).await?;
        serde_json::from_value(value).map_err(|source| RpcError::Decode { method, source })
    }

    /// Invoke `method`, returning the raw `arguments` object on success.
    pub(crate) async fn call<A>(
        &self,
        method: &'static str,
        arguments: &A,
    ) -> RpcResult<serde_json::Value>
    where
        A: Serialize + Sync,
    {
        let body = RpcRequest { method, arguments };
        let mut response = self.send(method, &body).await?;

        if response.status() == StatusCode::CONFLICT {
            let token = response
                .headers()
                .get(SESSION_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or(RpcError::SessionHandshake { method })?;
            debug!(method, "daemon issued a new session token");
            self.store_session_token(token);
            response = self.send(method, &body).await?;
            if response.status() == StatusCode::CONFLICT {
                return Err(RpcError::SessionHandshake { method });
            }
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RpcError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(RpcError::Status {
                method,
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| RpcError::Transport { method, source })?;
        let envelope: RpcResponse =
            serde_json::from_slice(&bytes).map_err(|source| RpcError::Decode { method, source })?;
        if envelope.result != RESULT_SUCCESS {
            return Err(RpcError::Rejected {
                method,
                result: envelope.result,
            });
        }
        Ok(envelope.arguments)
    }

    async fn send<A>(&self, method: &'static str, body: &RpcRequest<'_, A>) -> RpcResult<Response>
    where
        A: Serialize + Sync,
    {
        let mut request = self.client.post(self.url.clone()).json(body);
        if let Some(token) = self.session_token()
            && let Ok(value) = HeaderValue::from_str(&token)
        {
            request = request.header(SESSION_ID_HEADER, value);
        }
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        request
            .send()
            .await
            .map_err(|source| RpcError::Transport { method, source })
    }
}
