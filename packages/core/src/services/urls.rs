//! Absolute URL Derivation
//!
//! A page's absolute URL is derived from its own `url` field and, when that
//! field is a bare relative segment, from its ancestor chain:
//!
//! - empty -> the empty string (the implicit site root)
//! - starts with `/`, `http://` or `https://` -> used verbatim
//! - quoted (`"name"`) -> resolved through the named-route resolver
//! - anything else -> the parent's absolute URL with its trailing slash
//!   stripped, a `/`, the segment with surrounding slashes stripped, and a
//!   closing `/`
//!
//! Derivation folds over the chain root-to-page, so an absolute or quoted
//! `url` on any ancestor restarts the path from there.

use crate::models::{quoted_route_name, Page, UrlKind, ValidationError};
use crate::services::error::FiberServiceError;
use crate::services::routes::NamedRouteResolver;

/// Derive the absolute URL of the last page in `chain`
///
/// `chain` must be ordered root first and end with the page itself; for
/// pages whose `url` is not relative a single-element chain is enough.
///
/// # Errors
///
/// - `UnresolvedNamedRoute` when a quoted `url` in the chain names a route
///   the resolver does not know
/// - `ValidationFailed` when a relative segment appears with no ancestor to
///   append to (a root page with a bare segment)
pub fn derive_absolute_url<'a>(
    routes: &dyn NamedRouteResolver,
    chain: impl IntoIterator<Item = &'a Page>,
) -> Result<String, FiberServiceError> {
    let mut absolute: Option<String> = None;

    for page in chain {
        let next = match page.url_kind() {
            UrlKind::Empty => String::new(),
            UrlKind::Absolute | UrlKind::External => page.url.clone(),
            UrlKind::NamedRoute => {
                let name = quoted_route_name(&page.url).unwrap_or_default();
                routes
                    .resolve(name)
                    .ok_or_else(|| FiberServiceError::unresolved_named_route(name))?
            }
            UrlKind::Relative => {
                let parent = absolute.take().ok_or_else(|| {
                    FiberServiceError::ValidationFailed(ValidationError::RootRequiresAbsoluteUrl(
                        page.url.clone(),
                    ))
                })?;
                format!(
                    "{}/{}/",
                    parent.trim_end_matches('/'),
                    page.url.trim_matches('/')
                )
            }
        };
        absolute = Some(next);
    }

    Ok(absolute.unwrap_or_default())
}
