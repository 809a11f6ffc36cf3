//! Caller identity.
//!
//! Authentication happens upstream. Whatever layer resolves the caller stores an
//! [`AuthenticatedUser`] in the request extensions with [`register_authentication`];
//! handlers read it back through the extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::Extensions;

use crate::error::HubError;
use crate::messages::UserId;

/// The identity resolved for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// The authenticated user.
    pub user_id: UserId,
}

/// Attaches a resolved identity to a request.
pub fn register_authentication(extensions: &mut Extensions, user_id: UserId) {
    extensions.insert(AuthenticatedUser { user_id });
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = HubError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .copied()
            .ok_or(HubError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    #[tokio::test]
    async fn test_extracts_registered_user() {
        let user_id = UserId::new(5).expect("non-zero");
        let (mut parts, _) = Request::new(()).into_parts();
        register_authentication(&mut parts.extensions, user_id);

        let user = AuthenticatedUser::from_request_parts(&mut parts, &())
            .await
            .expect("identity");
        assert_eq!(user.user_id, user_id);
    }

    #[tokio::test]
    async fn test_missing_identity_is_rejected() {
        let (mut parts, _) = Request::new(()).into_parts();

        let result = AuthenticatedUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(HubError::Unauthenticated)));
    }
}
