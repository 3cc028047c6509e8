//! CERN SSO core primitives
//!
//! Network-free building blocks of the SSO login negotiation:
//!
//! - [`AuthEndpointDetector`]: decides whether a URI points at the SSO login endpoint
//! - [`extract_form`]: pulls the action URL and repost fields out of a login page

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod detector;
pub mod form;

pub use detector::{AuthEndpointDetector, DEFAULT_AUTH_PATH_PREFIX, make_absolute};
pub use form::{FormError, LoginForm, extract_form};
