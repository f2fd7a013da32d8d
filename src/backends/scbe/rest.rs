//! Session-aware REST client for the SAN controller
//!
//! Holds the bearer token obtained at login. Every request carries the
//! current token; a `401 Unauthorized` triggers exactly one re-login and one
//! retry of the original request. A second 401 is returned as
//! `Error::Unauthorized`.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, REFERER};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::RwLock;
use tokio::sync::Mutex;

use crate::backends::scbe::types::{LoginRequest, LoginResponse};
use crate::common::{format_url, ConnectionInfo, CredentialInfo, Error, Result};

/// Path appended to the referer to build the API root
pub const URL_SCBE_BASE_SUFFIX: &str = "api/v1";

/// Auth endpoint, relative to the API root
pub const URL_SCBE_RESOURCE_GET_AUTH: &str = "users/get-auth-token";

/// Query parameters of a request
pub type Params<'a> = [(&'a str, String)];

pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    auth_url: String,
    referer: String,
    credentials: CredentialInfo,
    token: RwLock<Option<String>>,
    login_lock: Mutex<()>,
}

impl RestClient {
    /// Client for the controller described by `connection`
    pub fn new(connection: &ConnectionInfo) -> Result<Self> {
        let referer = connection.referer();
        let base_url = format_url(&referer, &[URL_SCBE_BASE_SUFFIX]);
        Self::with_urls(connection, &base_url, URL_SCBE_RESOURCE_GET_AUTH, &referer)
    }

    /// Client with explicit API root, auth path and referer
    pub fn with_urls(
        connection: &ConnectionInfo,
        base_url: &str,
        auth_url: &str,
        referer: &str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(connection.skip_verify_ssl)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            auth_url: auth_url.to_string(),
            referer: referer.to_string(),
            credentials: connection.credentials.clone(),
            token: RwLock::new(None),
            login_lock: Mutex::new(()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorization(&self) -> Option<String> {
        self.token.read().ok().and_then(|token| token.clone())
    }

    fn set_authorization(&self, value: Option<String>) {
        if let Ok(mut token) = self.token.write() {
            *token = value;
        }
    }

    /// Obtain a fresh token and use it for subsequent requests.
    ///
    /// Logins are serialized; concurrent requests keep using the previous
    /// token until this one is stored.
    pub async fn login(&self) -> Result<()> {
        let _guard = self.login_lock.lock().await;

        let token = self.get_token().await?;
        self.set_authorization(Some(format!("Token {}", token)));
        tracing::debug!(url = %self.base_url, "Logged in to storage controller");
        Ok(())
    }

    async fn get_token(&self) -> Result<String> {
        let url = format_url(&self.base_url, &[&self.auth_url]);
        let payload = serde_json::to_vec(&LoginRequest {
            username: &self.credentials.username,
            password: &self.credentials.password,
            group: &self.credentials.group,
        })?;

        // The auth endpoint takes credentials, not a token
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(REFERER, &self.referer)
            .body(payload)
            .send()
            .await?;

        verify_status_code(response.status(), Some(StatusCode::OK))?;
        let login: LoginResponse = decode(response).await?;
        if login.token.is_empty() {
            tracing::error!(url = %url, "Controller returned an empty token");
            return Err(Error::EmptyToken);
        }
        Ok(login.token)
    }

    /// GET `resource` and decode the body.
    ///
    /// With `expected = None` any 2xx status is accepted.
    pub async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &Params<'_>,
        expected: Option<StatusCode>,
    ) -> Result<T> {
        let url = format_url(&self.base_url, &[resource]);
        let response = self.execute(Method::GET, &url, params, None).await?;
        verify_status_code(response.status(), expected)?;
        decode(response).await
    }

    /// POST `payload` as JSON to `resource` and decode the body
    pub async fn post<B, T>(
        &self,
        resource: &str,
        payload: &B,
        expected: Option<StatusCode>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format_url(&self.base_url, &[resource]);
        let body = serde_json::to_vec(payload)?;
        let response = self.execute(Method::POST, &url, &[], Some(body.as_slice())).await?;
        verify_status_code(response.status(), expected)?;
        decode(response).await
    }

    /// DELETE `resource`; the body is ignored
    pub async fn delete(&self, resource: &str, expected: Option<StatusCode>) -> Result<()> {
        let url = format_url(&self.base_url, &[resource]);
        let response = self.execute(Method::DELETE, &url, &[], None).await?;
        verify_status_code(response.status(), expected)
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        params: &Params<'_>,
        body: Option<&[u8]>,
    ) -> Result<Response> {
        let response = self.send(method.clone(), url, params, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::info!(url = %url, "Token expired, logging in again");
        self.login().await?;

        let response = self.send(method, url, params, body).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::error!(url = %url, "Request unauthorized after re-login");
            return Err(Error::Unauthorized(url.to_string()));
        }
        Ok(response)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        params: &Params<'_>,
        body: Option<&[u8]>,
    ) -> Result<Response> {
        let mut request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(REFERER, &self.referer);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(token) = self.authorization() {
            request = request.header(AUTHORIZATION, token);
        }
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }
        Ok(request.send().await?)
    }
}

fn verify_status_code(actual: StatusCode, expected: Option<StatusCode>) -> Result<()> {
    match expected {
        Some(expected) if actual != expected => Err(Error::BadStatusCode {
            expected: expected.as_u16().to_string(),
            actual: actual.as_u16(),
        }),
        None if !actual.is_success() => Err(Error::BadStatusCode {
            expected: "2xx".to_string(),
            actual: actual.as_u16(),
        }),
        _ => Ok(()),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
