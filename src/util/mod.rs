//! Small shared helpers.
//!
//! - **URL validation**: scheme and host checks applied before the transport
//!   sends a request.

mod url_validator;

pub use url_validator::{validate_url, HostPolicy, UrlValidationError};
