use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Reasons a URL is refused before any request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("credentials in URL not allowed")]
    Credentials,
    #[error("private address not allowed: {0}")]
    PrivateHost(String),
}

/// Which hosts the transport may contact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostPolicy {
    /// Refuse loopback, private and link-local addresses.
    #[default]
    PublicOnly,
    /// Any host; used for local mirrors and test servers.
    AllowPrivate,
}

/// Checks a feed or page URL before it is fetched.
///
/// Only `http` and `https` are accepted, the URL must name a host, and it must
/// not embed credentials. Under [`HostPolicy::PublicOnly`], `localhost` and
/// literal private addresses are refused as well.
///
/// # Examples
///
/// ```
/// use feedpost::util::{validate_url, HostPolicy};
///
/// let url = validate_url("https://example.com/feed.xml", HostPolicy::PublicOnly).unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("file:///etc/passwd", HostPolicy::AllowPrivate).is_err());
/// assert!(validate_url("http://127.0.0.1/rss", HostPolicy::PublicOnly).is_err());
/// assert!(validate_url("http://127.0.0.1/rss", HostPolicy::AllowPrivate).is_ok());
/// ```
pub fn validate_url(url_str: &str, policy: HostPolicy) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let Some(host) = url.host_str() else {
        return Err(UrlValidationError::MissingHost);
    };

    if !url.username().is_empty() || url.password().is_some() {
        return Err(UrlValidationError::Credentials);
    }

    if policy == HostPolicy::PublicOnly {
        if host.eq_ignore_ascii_case("localhost") {
            return Err(UrlValidationError::PrivateHost(host.to_owned()));
        }

        let bare = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if let Ok(ip) = bare.parse::<IpAddr>() {
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateHost(ip.to_string()));
            }
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7
                || (first & 0xfe00) == 0xfc00
                // fe80::/10
                || (first & 0xffc0) == 0xfe80
        }
    }
}
