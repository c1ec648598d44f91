//! Per-request layout data for admin pages.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::middleware::auth::{AdminAuthRejection, RequireAdmin};
use crate::models::CurrentAdmin;

/// Data the admin layout needs: who is signed in and where they are.
///
/// Extracting an [`AdminPage`] also enforces sign-in, so page handlers do
/// not need a separate [`RequireAdmin`].
#[derive(Debug, Clone)]
pub struct AdminPage {
    pub admin: CurrentAdmin,
    pub path: String,
}

impl AdminPage {
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

impl<S> FromRequestParts<S> for AdminPage
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAdmin(admin) = RequireAdmin::from_request_parts(parts, state).await?;
        Ok(Self {
            admin,
            path: parts.uri.path().to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use dewy_core::{Email, UserId};

    #[test]
    fn section_matching() {
        let page = AdminPage {
            admin: CurrentAdmin {
                id: UserId::new(1),
                email: Email::parse("ops@dewy.shop").unwrap(),
                name: "Ops".to_string(),
            },
            path: "/orders/42".to_string(),
        };
        assert!(page.in_section("/orders"));
        assert!(!page.in_section("/"));
        assert!(!page.in_section("/products"));
    }
}
