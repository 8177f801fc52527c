//! The acting identity of a request.
//!
//! Authentication happens upstream; by the time a request reaches a service
//! it carries either a user id or nothing. Services receive it explicitly.

use crate::error::{DomainError, ServiceResult};
use crate::ids::UserId;
use crate::store::Store;

/// Request header set by the authentication gateway in front of the API.
pub const IDENTITY_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Actor(Option<UserId>);

impl Actor {
    pub fn user(id: UserId) -> Self {
        Self(Some(id))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }

    /// Builds an actor from a raw header value. Anything that is not a
    /// well-formed user id counts as no identity.
    pub fn from_header(value: Option<&str>) -> Self {
        Self(value.and_then(|raw| UserId::parse(raw).ok()))
    }

    pub fn id(&self) -> Option<UserId> {
        self.0
    }

    /// Returns the user id or fails with `Unauthenticated`.
    pub fn require(&self) -> ServiceResult<UserId> {
        self.0.ok_or_else(DomainError::unauthenticated)
    }

    /// Like [`Actor::require`], but also fails with `Unauthenticated` when the
    /// id names no user row.
    pub async fn resolve(&self, store: &Store) -> ServiceResult<UserId> {
        let user = self.require()?;
        if !store.user_exists(user).await? {
            return Err(DomainError::unauthenticated());
        }
        Ok(user)
    }

    pub fn is(&self, user: UserId) -> bool {
        self.0 == Some(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_actor_is_rejected_by_require() {
        let err = Actor::anonymous().require().unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn header_parsing_ignores_malformed_values() {
        assert_eq!(Actor::from_header(Some("garbage")), Actor::anonymous());
        assert_eq!(Actor::from_header(None), Actor::anonymous());

        let id = UserId::new();
        let actor = Actor::from_header(Some(&id.to_string()));
        assert_eq!(actor.require().unwrap(), id);
        assert!(actor.is(id));
        assert!(!actor.is(UserId::new()));
    }

    #[tokio::test]
    async fn resolve_rejects_ids_without_a_user_row() {
        let ctx = crate::testing::TestContext::new().await;
        let alice = ctx.user("alice").await;

        assert_eq!(Actor::user(alice).resolve(&ctx.store).await.unwrap(), alice);
        let err = Actor::user(UserId::new())
            .resolve(&ctx.store)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
        let err = Actor::anonymous().resolve(&ctx.store).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
