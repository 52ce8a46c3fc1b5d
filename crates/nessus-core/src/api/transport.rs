//! Request parameters and the HTTP exchange underneath every API call.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use zeroize::Zeroize;

use super::Result;

/// HTTP request timeout in seconds.
/// Report downloads on a busy scanner can take a while.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Ordered, named string parameters for one form-encoded request.
///
/// Values are wiped when the parameters are dropped since a login request
/// carries the plaintext password.
#[derive(Default)]
pub struct FormParams {
    pairs: Vec<(&'static str, String)>,
}

impl FormParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.pairs.push((key, value.into()));
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pairs.iter().map(|(k, _)| *k)
    }

    pub fn as_pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }
}

impl std::fmt::Debug for FormParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keys only: values may be secrets
        f.debug_list().entries(self.keys()).finish()
    }
}

impl Drop for FormParams {
    fn drop(&mut self) {
        for (_, value) in self.pairs.iter_mut() {
            value.zeroize();
        }
    }
}

/// One blocking-style exchange: POST the form to `url`, return the whole body.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&self, url: &str, form: &FormParams) -> Result<String>;
}

impl<T: Transport> Transport for &T {
    async fn send(&self, url: &str, form: &FormParams) -> Result<String> {
        (**self).send(url, form).await
    }
}

impl<T: Transport> Transport for Arc<T> {
    async fn send(&self, url: &str, form: &FormParams) -> Result<String> {
        (**self).send(url, form).await
    }
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }
}

pub struct HttpTransportBuilder {
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            accept_invalid_certs: false,
        }
    }
}

impl HttpTransportBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Scanner appliances usually ship a self-signed certificate.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn build(self) -> Result<HttpTransport> {
        let client = Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, url: &str, form: &FormParams) -> Result<String> {
        debug!(url, params = ?form, "POST");
        let response = self
            .client
            .post(url)
            .form(form.as_pairs())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(url, %status, bytes = body.len(), "Response received");
        Ok(body)
    }
}
