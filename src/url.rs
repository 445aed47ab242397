use crate::error::GeminiError;
use std::fmt;

/// The port used when an address does not name one.
pub const DEFAULT_PORT: u16 = 1965;
/// The only scheme a request URL may carry.
pub const SCHEME: &str = "gemini";
const DEFAULT_PATH: &str = "/";
const SCHEME_SEPARATOR: &str = "://";

/// A fully-qualified Gemini request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestURL {
    host: String,
    port: u16,
    path: String,
    query: Option<String>,
}

impl RequestURL {
    /// The scheme, always `gemini`.
    pub fn scheme(&self) -> &str {
        SCHEME
    }

    /// The host name or address literal.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port, [`DEFAULT_PORT`] unless the address named another one.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The path, never empty.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The query component of the original address, if it had one.
    ///
    /// This is not sent on the wire; see [`crate::Request`].
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

impl fmt::Display for RequestURL {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}", self.host)?;

        if self.port != DEFAULT_PORT {
            write!(f, ":{}", self.port)?;
        }

        f.write_str(&self.path)?;

        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }

        Ok(())
    }
}

/// A builder for [`RequestURL`]s.
#[derive(Debug, Default)]
pub struct URLBuilder<'a> {
    scheme: Option<&'a str>,
    hostname: Option<&'a str>,
    port: Option<u16>,
    path: Option<&'a str>,
    query: Option<&'a str>,
}

impl<'a> URLBuilder<'a> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scheme. Anything but `gemini` makes [`URLBuilder::build`] fail.
    pub fn scheme(mut self, scheme: &'a str) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// Set the host name.
    pub fn hostname(mut self, hostname: &'a str) -> Self {
        self.hostname = Some(hostname);
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the path.
    pub fn path(mut self, path: &'a str) -> Self {
        self.path = Some(path);
        self
    }

    /// Set the query.
    pub fn query(mut self, query: &'a str) -> Self {
        self.query = Some(query);
        self
    }

    /// Build the URL, filling in the default port and path.
    pub fn build(&self) -> Result<RequestURL, GeminiError> {
        let scheme = self.scheme.unwrap_or(SCHEME);
        if scheme != SCHEME {
            return Err(GeminiError::SchemeInvalid(scheme.to_string()));
        }

        let host = match self.hostname {
            Some(hostname) if !hostname.is_empty() => hostname.to_string(),
            _ => return Err(GeminiError::URLInvalid(format!("{scheme}://"))),
        };

        let path = match self.path {
            Some(path) if !path.is_empty() => path,
            _ => DEFAULT_PATH,
        };

        Ok(RequestURL {
            host,
            port: self.port.unwrap_or(DEFAULT_PORT),
            path: path.to_string(),
            query: self.query.map(|query| query.to_string()),
        })
    }
}

/// Turn a user-typed address into a request URL.
///
/// Surrounding whitespace is ignored. Addresses without a scheme are treated as `gemini://`
/// addresses. The scheme is compared exactly as typed, so `GEMINI://host` is rejected.
pub fn normalize(raw: &str) -> Result<RequestURL, GeminiError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains(SCHEME_SEPARATOR) {
        trimmed.to_string()
    } else {
        format!("{SCHEME}{SCHEME_SEPARATOR}{trimmed}")
    };

    let parsed = ::url::Url::parse(&candidate).map_err(|_| GeminiError::URLInvalid(raw.to_string()))?;

    // `url` lowercases the scheme, so look at what was actually typed
    let typed_scheme = candidate.split(SCHEME_SEPARATOR).next().unwrap_or_default();
    if typed_scheme != SCHEME {
        return Err(GeminiError::SchemeInvalid(typed_scheme.to_string()));
    }

    let mut builder = URLBuilder::new().path(parsed.path());
    if let Some(host) = parsed.host_str() {
        builder = builder.hostname(host);
    }
    if let Some(port) = parsed.port() {
        builder = builder.port(port);
    }
    if let Some(query) = parsed.query() {
        builder = builder.query(query);
    }

    builder.build().map_err(|e| match e {
        GeminiError::URLInvalid(_) => GeminiError::URLInvalid(raw.to_string()),
        e => e,
    })
}
