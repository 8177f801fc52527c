//! Like toggles over videos, comments and tweets.
//!
//! A toggle first tries to delete the (user, target) row. If a row went away
//! the target is now unliked; otherwise a row is inserted. The unique indexes
//! on `likes` absorb a concurrent duplicate insert.

use serde::Serialize;
use tracing::info;

use crate::error::{DomainError, ServiceResult};
use crate::identity::Actor;
use crate::ids::{CommentId, LikeId, TweetId, UserId, VideoId};
use crate::models::{LikeTarget, VideoSummary, now};
use crate::pagination::{Page, PageRequest};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub is_liked: bool,
}

#[derive(Clone)]
pub struct LikeService {
    store: Store,
}

impl LikeService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn toggle_video_like(&self, actor: Actor, video: VideoId) -> ServiceResult<LikeToggle> {
        let user = actor.resolve(&self.store).await?;
        if !self.store.video_exists(video).await? {
            return Err(DomainError::not_found("Video not found"));
        }
        self.toggle(user, LikeTarget::Video(video)).await
    }

    pub async fn toggle_comment_like(
        &self,
        actor: Actor,
        comment: CommentId,
    ) -> ServiceResult<LikeToggle> {
        let user = actor.resolve(&self.store).await?;
        if !self.store.comment_exists(comment).await? {
            return Err(DomainError::not_found("Comment not found"));
        }
        self.toggle(user, LikeTarget::Comment(comment)).await
    }

    pub async fn toggle_tweet_like(&self, actor: Actor, tweet: TweetId) -> ServiceResult<LikeToggle> {
        let user = actor.resolve(&self.store).await?;
        if !self.store.tweet_exists(tweet).await? {
            return Err(DomainError::not_found("Tweet not found"));
        }
        self.toggle(user, LikeTarget::Tweet(tweet)).await
    }

    /// Videos the actor liked, most recent like first.
    pub async fn liked_videos(
        &self,
        actor: Actor,
        page: PageRequest,
    ) -> ServiceResult<Page<VideoSummary>> {
        let user = actor.resolve(&self.store).await?;
        let (items, total) = tokio::try_join!(
            self.store.list_liked_videos(user, page),
            self.store.count_liked_videos(user),
        )?;
        Ok(Page::new(items, page, total))
    }

    async fn toggle(&self, user: UserId, target: LikeTarget) -> ServiceResult<LikeToggle> {
        if self.store.delete_like(user, target).await? {
            info!(user_id = %user, target = %target.id_text(), kind = target.column(), "like removed");
            return Ok(LikeToggle { is_liked: false });
        }
        self.store
            .insert_like(LikeId::new(), user, target, now())
            .await?;
        info!(user_id = %user, target = %target.id_text(), kind = target.column(), "like added");
        Ok(LikeToggle { is_liked: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use chrono::Duration;

    #[tokio::test]
    async fn toggling_twice_restores_the_original_state() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let bob = ctx.user("bob").await;
        let video = ctx.video(alice, "clip", true).await;
        let likes = &ctx.services.likes;
        let target = LikeTarget::Video(video.id);

        assert!(!ctx.store.like_exists(bob, target).await.unwrap());
        let first = likes.toggle_video_like(Actor::user(bob), video.id).await.unwrap();
        assert!(first.is_liked);
        assert!(ctx.store.like_exists(bob, target).await.unwrap());
        let second = likes.toggle_video_like(Actor::user(bob), video.id).await.unwrap();
        assert!(!second.is_liked);
        assert!(!ctx.store.like_exists(bob, target).await.unwrap());
    }

    #[tokio::test]
    async fn toggles_require_actor_and_existing_target() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let likes = &ctx.services.likes;

        let err = likes
            .toggle_video_like(Actor::anonymous(), VideoId::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(
            likes
                .toggle_video_like(Actor::user(alice), VideoId::new())
                .await
                .unwrap_err()
                .status_code(),
            404
        );
        assert_eq!(
            likes
                .toggle_comment_like(Actor::user(alice), CommentId::new())
                .await
                .unwrap_err()
                .status_code(),
            404
        );
        assert_eq!(
            likes
                .toggle_tweet_like(Actor::user(alice), TweetId::new())
                .await
                .unwrap_err()
                .status_code(),
            404
        );
    }

    #[tokio::test]
    async fn comment_and_tweet_likes_toggle_independently() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let video = ctx.video(alice, "clip", true).await;
        let comment = ctx
            .services
            .comments
            .add(Actor::user(alice), video.id, Some("first"))
            .await
            .unwrap();
        let tweet = ctx
            .services
            .tweets
            .create(Actor::user(alice), Some("hello"))
            .await
            .unwrap();
        let likes = &ctx.services.likes;

        assert!(likes.toggle_comment_like(Actor::user(alice), comment.id).await.unwrap().is_liked);
        assert!(likes.toggle_tweet_like(Actor::user(alice), tweet.id).await.unwrap().is_liked);
        assert!(likes.toggle_video_like(Actor::user(alice), video.id).await.unwrap().is_liked);
        assert!(!likes.toggle_comment_like(Actor::user(alice), comment.id).await.unwrap().is_liked);
        assert!(ctx.store.like_exists(alice, LikeTarget::Tweet(tweet.id)).await.unwrap());
        assert!(ctx.store.like_exists(alice, LikeTarget::Video(video.id)).await.unwrap());
    }

    #[tokio::test]
    async fn like_unlike_scenario_drives_liked_videos() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let bob = ctx.user("bob").await;
        let video = ctx.video(alice, "clip", true).await;
        let likes = &ctx.services.likes;

        likes.toggle_video_like(Actor::user(bob), video.id).await.unwrap();
        let liked = likes
            .liked_videos(Actor::user(bob), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(liked.pagination.total, 1);
        assert_eq!(liked.items[0].id, video.id);
        assert_eq!(liked.items[0].title, "clip");
        assert_eq!(liked.items[0].owner, alice);

        likes.toggle_video_like(Actor::user(bob), video.id).await.unwrap();
        let liked = likes
            .liked_videos(Actor::user(bob), PageRequest::default())
            .await
            .unwrap();
        assert!(liked.items.is_empty());
        assert_eq!(liked.pagination.total, 0);
    }

    #[tokio::test]
    async fn deleting_a_video_drops_its_likes() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let bob = ctx.user("bob").await;
        let video = ctx.video(alice, "clip", true).await;
        let likes = &ctx.services.likes;

        likes.toggle_video_like(Actor::user(bob), video.id).await.unwrap();
        ctx.services
            .videos
            .delete_video(Actor::user(alice), video.id)
            .await
            .unwrap();

        assert!(!ctx.store.like_exists(bob, LikeTarget::Video(video.id)).await.unwrap());
        let liked = likes
            .liked_videos(Actor::user(bob), PageRequest::default())
            .await
            .unwrap();
        assert!(liked.items.is_empty());
    }

    #[tokio::test]
    async fn liked_video_pages_follow_like_order() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let bob = ctx.user("bob").await;
        let base = now();
        let mut expected = Vec::new();
        for n in 0..5 {
            // Videos are created newest first so like order differs from upload order.
            let video = ctx
                .video_at(alice, &format!("v{n}"), true, base - Duration::seconds(n))
                .await;
            ctx.store
                .insert_like(
                    LikeId::new(),
                    bob,
                    LikeTarget::Video(video.id),
                    base + Duration::seconds(n),
                )
                .await
                .unwrap();
            expected.push(video.id);
        }
        expected.reverse();
        let likes = &ctx.services.likes;

        let first = likes
            .liked_videos(Actor::user(bob), PageRequest::new(1, 2))
            .await
            .unwrap();
        let second = likes
            .liked_videos(Actor::user(bob), PageRequest::new(2, 2))
            .await
            .unwrap();
        assert_eq!(first.pagination.total, 5);
        let ids: Vec<_> = first.items.iter().chain(&second.items).map(|v| v.id).collect();
        assert_eq!(ids, expected[..4]);
    }

    #[tokio::test]
    async fn unknown_user_cannot_like() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let video = ctx.video(alice, "clip", true).await;
        let ghost = UserId::new();

        let err = ctx
            .services
            .likes
            .toggle_video_like(Actor::user(ghost), video.id)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert!(!ctx.store.like_exists(ghost, LikeTarget::Video(video.id)).await.unwrap());
    }
}
