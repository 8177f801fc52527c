use tracing::info;

use crate::error::{DomainError, ServiceResult};
use crate::identity::Actor;
use crate::ids::{TweetId, UserId};
use crate::models::{TWEET_MAX_CHARS, TweetRecord, now};
use crate::pagination::{Page, PageRequest};
use crate::services::non_blank;
use crate::store::Store;

#[derive(Clone)]
pub struct TweetService {
    store: Store,
}

impl TweetService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn create(&self, actor: Actor, content: Option<&str>) -> ServiceResult<TweetRecord> {
        let owner = actor.resolve(&self.store).await?;
        let content = checked_content(content)?;

        let at = now();
        let tweet = TweetRecord {
            id: TweetId::new(),
            owner,
            content: content.to_string(),
            created_at: at,
            updated_at: at,
        };
        self.store.insert_tweet(&tweet).await?;
        info!(tweet_id = %tweet.id, owner = %owner, "tweet created");
        Ok(tweet)
    }

    pub async fn list_mine(&self, actor: Actor, page: PageRequest) -> ServiceResult<Page<TweetRecord>> {
        let owner = actor.resolve(&self.store).await?;
        self.page_for(owner, page).await
    }

    pub async fn list_by_user(
        &self,
        user: UserId,
        page: PageRequest,
    ) -> ServiceResult<Page<TweetRecord>> {
        if !self.store.user_exists(user).await? {
            return Err(DomainError::not_found("User not found"));
        }
        self.page_for(user, page).await
    }

    /// The write is conditional on ownership; a missing tweet and someone
    /// else's tweet are both reported as forbidden.
    pub async fn update(
        &self,
        actor: Actor,
        id: TweetId,
        content: Option<&str>,
    ) -> ServiceResult<TweetRecord> {
        let owner = actor.resolve(&self.store).await?;
        let content = checked_content(content)?;
        let tweet = self
            .store
            .update_owned_tweet(id, owner, content, now())
            .await?
            .ok_or_else(|| DomainError::forbidden("You are not allowed to update this tweet"))?;
        info!(tweet_id = %id, "tweet updated");
        Ok(tweet)
    }

    pub async fn delete(&self, actor: Actor, id: TweetId) -> ServiceResult<()> {
        let owner = actor.resolve(&self.store).await?;
        if !self.store.delete_owned_tweet(id, owner).await? {
            return Err(DomainError::forbidden(
                "You are not allowed to delete this tweet",
            ));
        }
        info!(tweet_id = %id, "tweet deleted");
        Ok(())
    }

    async fn page_for(&self, owner: UserId, page: PageRequest) -> ServiceResult<Page<TweetRecord>> {
        let (items, total) = tokio::try_join!(
            self.store.list_tweets(owner, page),
            self.store.count_tweets(owner),
        )?;
        Ok(Page::new(items, page, total))
    }
}

/// Length is measured on the raw input, before trimming.
fn checked_content(raw: Option<&str>) -> ServiceResult<&str> {
    if raw.is_some_and(|value| value.chars().count() > TWEET_MAX_CHARS) {
        return Err(DomainError::validation(format!(
            "Tweet cannot exceed {TWEET_MAX_CHARS} characters"
        )));
    }
    non_blank(raw).ok_or_else(|| DomainError::validation("Tweet content is required"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use chrono::Duration;

    #[tokio::test]
    async fn create_validates_content() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let tweets = &ctx.services.tweets;

        assert_eq!(
            tweets.create(Actor::anonymous(), Some("hi")).await.unwrap_err().status_code(),
            401
        );
        assert_eq!(
            tweets.create(Actor::user(alice), Some("  ")).await.unwrap_err().status_code(),
            400
        );
        assert_eq!(
            tweets.create(Actor::user(alice), None).await.unwrap_err().status_code(),
            400
        );

        let tweet = tweets.create(Actor::user(alice), Some(" hello ")).await.unwrap();
        assert_eq!(tweet.content, "hello");
    }

    #[tokio::test]
    async fn unknown_user_id_is_unauthenticated() {
        let ctx = TestContext::new().await;
        let ghost = UserId::new();
        let tweets = &ctx.services.tweets;

        let err = tweets.create(Actor::user(ghost), Some("hi")).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(ctx.store.count_tweets(ghost).await.unwrap(), 0);
        let err = tweets
            .list_mine(Actor::user(ghost), PageRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn tweet_pages_are_disjoint_and_newest_first() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let bob = ctx.user("bob").await;
        let base = now();
        let mut expected = Vec::new();
        for n in 0..5 {
            let tweet = ctx
                .tweet_at(alice, &format!("t{n}"), base + Duration::seconds(n))
                .await;
            expected.push(tweet.id);
        }
        ctx.tweet_at(bob, "elsewhere", base + Duration::seconds(20)).await;
        expected.reverse();
        let tweets = &ctx.services.tweets;

        let first = tweets
            .list_mine(Actor::user(alice), PageRequest::new(1, 2))
            .await
            .unwrap();
        let second = tweets
            .list_by_user(alice, PageRequest::new(2, 2))
            .await
            .unwrap();
        assert_eq!(first.pagination.total, 5);
        assert_eq!(second.pagination.total_pages, 3);
        let ids: Vec<_> = first.items.iter().chain(&second.items).map(|t| t.id).collect();
        assert_eq!(ids, expected[..4]);
    }
    #[tokio::test]
    async fn length_limit_counts_characters() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let tweets = &ctx.services.tweets;

        let too_long = "a".repeat(TWEET_MAX_CHARS + 1);
        let err = tweets
            .create(Actor::user(alice), Some(&too_long))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(ctx.store.count_tweets(alice).await.unwrap(), 0);

        let wide = "é".repeat(TWEET_MAX_CHARS);
        tweets.create(Actor::user(alice), Some(&wide)).await.unwrap();
        assert_eq!(ctx.store.count_tweets(alice).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn only_the_owner_can_update_or_delete() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let bob = ctx.user("bob").await;
        let tweets = &ctx.services.tweets;
        let tweet = tweets.create(Actor::user(alice), Some("original")).await.unwrap();

        let err = tweets
            .update(Actor::user(bob), tweet.id, Some("hijacked"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
        let err = tweets.delete(Actor::user(bob), tweet.id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        let err = tweets.delete(Actor::user(alice), TweetId::new()).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let updated = tweets
            .update(Actor::user(alice), tweet.id, Some("edited"))
            .await
            .unwrap();
        assert_eq!(updated.content, "edited");
        assert_eq!(updated.created_at, tweet.created_at);

        tweets.delete(Actor::user(alice), tweet.id).await.unwrap();
        assert!(!ctx.store.tweet_exists(tweet.id).await.unwrap());
    }

    #[tokio::test]
    async fn listings_are_scoped_to_one_user() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let bob = ctx.user("bob").await;
        let tweets = &ctx.services.tweets;
        tweets.create(Actor::user(alice), Some("a1")).await.unwrap();
        tweets.create(Actor::user(alice), Some("a2")).await.unwrap();
        tweets.create(Actor::user(bob), Some("b1")).await.unwrap();

        let mine = tweets
            .list_mine(Actor::user(alice), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(mine.pagination.total, 2);
        assert!(mine.items.iter().all(|t| t.owner == alice));

        let bobs = tweets.list_by_user(bob, PageRequest::default()).await.unwrap();
        assert_eq!(bobs.items.len(), 1);

        let err = tweets
            .list_by_user(UserId::new(), PageRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
