//! HTTP request probe, grounded on the health-check HTTP endpoint checker.

use regex::Regex;
use std::time::Duration;

use crate::error::Result;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A probe that issues an HTTP request and succeeds on a 2xx/3xx status,
/// optionally also requiring the body to match a regex.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    port: u16,
    scheme: String,
    method: String,
    path: String,
    regex: Option<Regex>,
    tls_verify: bool,
}

impl HttpProbe {
    /// Build a probe for the given port, defaulting to a plain `GET /`.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            scheme: "http".to_string(),
            method: "GET".to_string(),
            path: "/".to_string(),
            regex: None,
            tls_verify: true,
        }
    }

    /// Set the request path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the HTTP method.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Set the URL scheme (`http` or `https`).
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Require TLS certificate verification (only relevant for `https`).
    pub fn tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Compile and attach a body-matching regex.
    pub fn regex(mut self, pattern: &str) -> Result<Self> {
        self.regex = Some(Regex::new(pattern).map_err(|e| {
            crate::error::MaestroError::configuration(format!("invalid probe regex: {e}"))
        })?);
        Ok(self)
    }

    fn url(&self, host: &str) -> String {
        format!("{}://{}:{}{}", self.scheme, host, self.port, self.path)
    }

    /// Issue the request once.
    pub async fn test(&self, host: &str) -> bool {
        let client = match reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!self.tls_verify)
            .build()
        {
            Ok(c) => c,
            Err(_) => return false,
        };
        let method = match self.method.to_ascii_uppercase().as_str() {
            "POST" => reqwest::Method::POST,
            "HEAD" => reqwest::Method::HEAD,
            "PUT" => reqwest::Method::PUT,
            _ => reqwest::Method::GET,
        };
        let response = match client.request(method, self.url(host)).send().await {
            Ok(r) => r,
            Err(_) => return false,
        };
        if !response.status().is_success() && !response.status().is_redirection() {
            return false;
        }
        match &self.regex {
            None => true,
            Some(re) => match response.text().await {
                Ok(body) => re.is_match(&body),
                Err(_) => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_includes_scheme_and_path() {
        let probe = HttpProbe::new(8080).path("/healthz").scheme("https");
        assert_eq!(probe.url("10.0.0.1"), "https://10.0.0.1:8080/healthz");
    }

    #[tokio::test]
    async fn unreachable_host_is_failure() {
        let probe = HttpProbe::new(1);
        assert!(!probe.test("127.0.0.1").await);
    }
}
