//! Per-connection transfer requests.
//!
//! A `TransferRequest` is one planned connection to one mirror: a validated
//! URL, the method (metadata-only HEAD or full GET), the shared referer and an
//! optional user-defined credential override.

use std::fmt;
use url::Url;

use crate::config::SegdlConfig;

/// Schemes the transfer engine can drive.
pub const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "ftp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Username/password pair for servers that require authentication.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthConfig {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl AuthConfig {
    /// Credentials from `http_user` / `http_passwd`; `None` when neither is set.
    pub fn from_config(cfg: &SegdlConfig) -> Option<Self> {
        let auth = AuthConfig {
            user: cfg.http_user.clone(),
            password: cfg.http_passwd.clone(),
        };
        if auth.is_empty() {
            None
        } else {
            Some(auth)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.password.is_none()
    }
}

// Never print the password.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("invalid URL {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported protocol {scheme:?} in {url}")]
    UnsupportedScheme { url: String, scheme: String },
}

/// One planned connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    url: Url,
    method: Method,
    referer: Option<String>,
    auth: Option<AuthConfig>,
}

impl TransferRequest {
    /// Parses and validates `raw`. Fails for unparseable URLs and unsupported schemes.
    pub fn new(
        raw: &str,
        method: Method,
        referer: Option<String>,
        auth: Option<AuthConfig>,
    ) -> Result<Self, RequestError> {
        let url = Url::parse(raw.trim()).map_err(|source| RequestError::Parse {
            url: raw.to_string(),
            source,
        })?;
        if !SUPPORTED_SCHEMES.contains(&url.scheme()) || !url.has_host() {
            return Err(RequestError::UnsupportedScheme {
                url: raw.to_string(),
                scheme: url.scheme().to_string(),
            });
        }
        Ok(Self {
            url,
            method,
            referer,
            auth,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    /// Same request with a different method (used to turn a HEAD plan into a GET).
    pub fn with_method(&self, method: Method) -> Self {
        Self {
            method,
            ..self.clone()
        }
    }

    /// Credentials to send. Userinfo embedded in the URL wins over the
    /// user-defined override.
    pub fn effective_auth(&self) -> Option<AuthConfig> {
        if !self.url.username().is_empty() {
            return Some(AuthConfig {
                user: Some(self.url.username().to_string()),
                password: self.url.password().map(str::to_string),
            });
        }
        self.auth.clone().filter(|a| !a.is_empty())
    }
}
