//! Per-request layout data.
//!
//! Every full page shows the signed-in user and the cart badge, so handlers
//! take a [`PageContext`] and hand it to their template.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::models::{CurrentUser, session_keys};
use crate::services::cart;
use crate::state::AppState;

/// Data the base layout needs.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub user: Option<CurrentUser>,
    pub cart_count: i64,
    /// Request path, used for `next=` links and nav highlighting.
    pub path: String,
}

impl PageContext {
    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Whether the nav entry for `prefix` is the current section.
    #[must_use]
    pub fn in_section(&self, prefix: &str) -> bool {
        if prefix == "/" {
            self.path == "/"
        } else {
            self.path.starts_with(prefix)
        }
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self {
                path,
                ..Self::default()
            });
        };

        let user = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten();

        // The badge is cosmetic; a failed count should not fail the page.
        let cart_count = match cart::item_count(state.pool(), &session, user.as_ref()).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "failed to count cart items");
                0
            }
        };

        Ok(Self {
            user,
            cart_count,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_matching() {
        let page = PageContext {
            path: "/products/barrier-serum".to_string(),
            ..PageContext::default()
        };
        assert!(page.in_section("/products"));
        assert!(!page.in_section("/"));
        assert!(!page.is_signed_in());

        let home = PageContext {
            path: "/".to_string(),
            ..PageContext::default()
        };
        assert!(home.in_section("/"));
    }
}
