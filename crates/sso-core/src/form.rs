//! Login form extraction
//!
//! The SSO gateway answers with HTML pages carrying a single form: either the
//! username/password page or the auto-submitting page that relays the signed
//! token back to the protected site. Both are reposted the same way, so only
//! the action URL and the input fields are kept.
//!
//! Attribute values are entity-decoded by the HTML tokenizer, so hidden values
//! come back exactly as the server meant them and are never decoded twice.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html};
use thiserror::Error;
use url::Url;

use crate::detector::make_absolute;

/// Form extraction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// The page has no `<form>` element
    #[error("no form found")]
    NoForm,

    /// The form action could not be turned into a URL
    #[error("invalid form action '{action}': {source}")]
    InvalidAction {
        /// Decoded action attribute
        action: String,
        /// Underlying parse failure
        #[source]
        source: url::ParseError,
    },
}

/// A login form ready to be reposted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Absolute URL the form posts to
    pub action: Url,
    /// Field name to value; hidden fields keep their value, visible ones start empty
    pub repost_fields: BTreeMap<String, String>,
}

impl LoginForm {
    /// Set a field, inserting it if the page did not have it
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.repost_fields.insert(name.into(), value.into());
    }

    /// Drop a field from the repost, returning its previous value
    pub fn remove_field(&mut self, name: &str) -> Option<String> {
        self.repost_fields.remove(name)
    }

    /// Current value of a field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.repost_fields.get(name).map(String::as_str)
    }

    /// Fields as name/value pairs for form encoding
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.repost_fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Extract the first form of `html`, resolving a relative action against `base`.
///
/// A form without an `action` attribute posts back to `base`.
pub fn extract_form(html: &str, base: &Url) -> Result<LoginForm, FormError> {
    let document = Html::parse_document(html);

    let form = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "form")
        .ok_or(FormError::NoForm)?;

    let action = match form.value().attr("action").map(str::trim) {
        Some(action) if !action.is_empty() => {
            make_absolute(base, action).map_err(|source| FormError::InvalidAction {
                action: action.to_string(),
                source,
            })?
        }
        _ => base.clone(),
    };

    let mut repost_fields = BTreeMap::new();
    for input in form
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "input")
    {
        let Some(name) = input.value().attr("name") else {
            continue;
        };
        // Missing type defaults to text, as browsers do
        let input_type = input
            .value()
            .attr("type")
            .unwrap_or("text")
            .to_ascii_lowercase();

        match input_type.as_str() {
            "hidden" => {
                let value = input.value().attr("value").unwrap_or_default();
                repost_fields.insert(name.to_string(), value.to_string());
            }
            "password" | "text" | "submit" => {
                repost_fields.insert(name.to_string(), String::new());
            }
            _ => {}
        }
    }

    Ok(LoginForm {
        action,
        repost_fields,
    })
}
