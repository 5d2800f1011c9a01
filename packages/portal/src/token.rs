//! Anti-forgery token extraction.
//!
//! Every HTML page the portal serves to a signed-in (or signing-in) user
//! carries a `<meta name="csrf-token" content="...">` tag. Mutating
//! requests must echo the most recent value, both as the
//! `authenticity_token` form field and as the `X-CSRF-Token` header.

use scraper::{Html, Selector};

use crate::PortalError;

/// `name` attribute of the meta tag holding the token.
pub const TOKEN_META_NAME: &str = "csrf-token";

/// Extracts the anti-forgery token from an HTML document.
///
/// # Errors
///
/// Returns [`PortalError::Parse`] if the document has no `csrf-token` meta
/// tag or the tag has no `content` attribute. Either means the portal
/// served a different page than the flow expected.
pub fn extract_token(html: &str) -> Result<String, PortalError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(&format!(r#"meta[name="{TOKEN_META_NAME}"]"#))
        .map_err(|e| PortalError::Parse(format!("invalid token selector: {e}")))?;

    let meta = document.select(&selector).next().ok_or_else(|| {
        PortalError::Parse(format!("no '{TOKEN_META_NAME}' meta tag in response"))
    })?;

    meta.value()
        .attr("content")
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            PortalError::Parse(format!("'{TOKEN_META_NAME}' meta tag has no content"))
        })
}
