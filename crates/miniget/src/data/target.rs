use std::fmt;

use url::Url;

/// What a request is aimed at: a URL string or an already parsed [`Url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Text(String),
    Url(Url),
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        Target::Text(value.to_owned())
    }
}

impl From<String> for Target {
    fn from(value: String) -> Self {
        Target::Text(value)
    }
}

impl From<Url> for Target {
    fn from(value: Url) -> Self {
        Target::Url(value)
    }
}

impl From<&Url> for Target {
    fn from(value: &Url) -> Self {
        Target::Url(value.clone())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Text(text) => f.write_str(text),
            Target::Url(url) => f.write_str(url.as_str()),
        }
    }
}

/// The normalized destination handed to a transform hook.
///
/// - `protocol`: `"http"` or `"https"` (a trailing `:` is tolerated)
/// - `host`: host name, with `:port` when the port is not the default one
/// - `path`: path plus `?query`
/// - `auth`: `user[:password]` taken from the URL, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    pub protocol: String,
    pub host: String,
    pub path: String,
    pub auth: Option<String>,
}

impl ParsedTarget {
    pub fn from_url(url: &Url) -> Self {
        let mut host = url.host_str().unwrap_or_default().to_owned();
        if let Some(port) = url.port() {
            host.push(':');
            host.push_str(&port.to_string());
        }

        let mut path = url.path().to_owned();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        let auth = (!url.username().is_empty()).then(|| match url.password() {
            Some(password) => format!("{}:{}", url.username(), password),
            None => url.username().to_owned(),
        });

        Self {
            protocol: url.scheme().to_owned(),
            host,
            path,
            auth,
        }
    }

    /// Rebuild a URL, or `None` when the parts do not form an http(s) URL.
    pub fn to_url(&self) -> Option<Url> {
        let protocol = self.protocol.trim_end_matches(':').to_ascii_lowercase();
        if !is_supported_scheme(&protocol) || self.host.is_empty() {
            return None;
        }

        let path = match self.path.as_str() {
            "" => "/",
            path if path.starts_with('/') => path,
            _ => return None,
        };
        let auth = self
            .auth
            .as_deref()
            .map(|auth| format!("{}@", auth))
            .unwrap_or_default();

        let url = Url::parse(&format!("{}://{}{}{}", protocol, auth, self.host, path)).ok()?;
        url.host_str()?;
        Some(url)
    }
}

pub(crate) fn is_supported_scheme(scheme: &str) -> bool {
    matches!(scheme, "http" | "https")
}
