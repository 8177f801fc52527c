use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{DomainError, ServiceResult};
use crate::identity::Actor;
use crate::ids::{CommentId, VideoId};
use crate::models::{CommentRecord, now};
use crate::pagination::{Page, PageRequest};
use crate::services::non_blank;
use crate::store::Store;

const COMMENT_NOT_FOUND: &str = "Comment not found or you are not the owner";

/// What an edit returns: just the fields that changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentEdit {
    pub id: CommentId,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CommentService {
    store: Store,
}

impl CommentService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn list(
        &self,
        video: VideoId,
        page: PageRequest,
    ) -> ServiceResult<Page<CommentRecord>> {
        self.require_video(video).await?;
        let (items, total) = tokio::try_join!(
            self.store.list_comments(video, page),
            self.store.count_comments(video),
        )?;
        Ok(Page::new(items, page, total))
    }

    pub async fn add(
        &self,
        actor: Actor,
        video: VideoId,
        content: Option<&str>,
    ) -> ServiceResult<CommentRecord> {
        let owner = actor.resolve(&self.store).await?;
        self.require_video(video).await?;
        let content = non_blank(content)
            .ok_or_else(|| DomainError::validation("Comment content is required"))?;

        let at = now();
        let comment = CommentRecord {
            id: CommentId::new(),
            video,
            owner,
            content: content.to_string(),
            created_at: at,
            updated_at: at,
        };
        self.store.insert_comment(&comment).await?;
        info!(comment_id = %comment.id, video_id = %video, owner = %owner, "comment added");
        Ok(comment)
    }

    pub async fn update(
        &self,
        actor: Actor,
        id: CommentId,
        content: Option<&str>,
    ) -> ServiceResult<CommentEdit> {
        self.owned_comment(actor, id).await?;
        let content = non_blank(content)
            .ok_or_else(|| DomainError::validation("Comment content is required"))?;

        let updated = self
            .store
            .update_comment_content(id, content, now())
            .await?
            .ok_or_else(|| DomainError::not_found(COMMENT_NOT_FOUND))?;
        info!(comment_id = %id, "comment updated");
        Ok(CommentEdit {
            id: updated.id,
            content: updated.content,
            updated_at: updated.updated_at,
        })
    }

    pub async fn delete(&self, actor: Actor, id: CommentId) -> ServiceResult<()> {
        self.owned_comment(actor, id).await?;
        if !self.store.delete_comment(id).await? {
            return Err(DomainError::not_found(COMMENT_NOT_FOUND));
        }
        info!(comment_id = %id, "comment deleted");
        Ok(())
    }

    async fn require_video(&self, video: VideoId) -> ServiceResult<()> {
        if self.store.video_exists(video).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("Video not found"))
        }
    }

    async fn owned_comment(&self, actor: Actor, id: CommentId) -> ServiceResult<CommentRecord> {
        let owner = actor.resolve(&self.store).await?;
        match self.store.get_comment(id).await? {
            Some(comment) if comment.owner == owner => Ok(comment),
            _ => Err(DomainError::not_found(COMMENT_NOT_FOUND)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::testing::TestContext;

    #[tokio::test]
    async fn add_requires_actor_video_and_content() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let video = ctx.video(alice, "clip", true).await;
        let comments = &ctx.services.comments;

        let err = comments
            .add(Actor::anonymous(), video.id, Some("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);

        let err = comments
            .add(Actor::user(alice), VideoId::new(), Some("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);

        let err = comments
            .add(Actor::user(alice), video.id, Some("   "))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let comment = comments
            .add(Actor::user(alice), video.id, Some("  nice  "))
            .await
            .unwrap();
        assert_eq!(comment.content, "nice");
        assert_eq!(ctx.store.get_comment(comment.id).await.unwrap(), Some(comment));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paginated() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let video = ctx.video(alice, "clip", true).await;
        let base = now();
        for n in 0..3 {
            ctx.store
                .insert_comment(&CommentRecord {
                    id: CommentId::new(),
                    video: video.id,
                    owner: alice,
                    content: format!("c{n}"),
                    created_at: base + Duration::seconds(n),
                    updated_at: base + Duration::seconds(n),
                })
                .await
                .unwrap();
        }

        let comments = &ctx.services.comments;
        let first = comments.list(video.id, PageRequest::new(1, 2)).await.unwrap();
        let second = comments.list(video.id, PageRequest::new(2, 2)).await.unwrap();
        let contents: Vec<_> = first
            .items
            .iter()
            .chain(&second.items)
            .map(|c| c.content.as_str())
            .collect();
        assert_eq!(contents, ["c2", "c1", "c0"]);
        assert_eq!(first.pagination.total, 3);
        assert_eq!(second.pagination.total_pages, 2);

        let err = comments
            .list(VideoId::new(), PageRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn non_owner_sees_the_same_404_as_a_missing_comment() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let bob = ctx.user("bob").await;
        let video = ctx.video(alice, "clip", true).await;
        let comments = &ctx.services.comments;
        let comment = comments
            .add(Actor::user(alice), video.id, Some("mine"))
            .await
            .unwrap();

        let foreign = comments
            .update(Actor::user(bob), comment.id, Some("edited"))
            .await
            .unwrap_err();
        let missing = comments
            .update(Actor::user(bob), CommentId::new(), Some("edited"))
            .await
            .unwrap_err();
        assert_eq!(foreign.status_code(), 404);
        assert_eq!(foreign.to_string(), missing.to_string());

        let err = comments.delete(Actor::user(bob), comment.id).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert!(ctx.store.comment_exists(comment.id).await.unwrap());
    }

    #[tokio::test]
    async fn owner_can_edit_and_delete() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let video = ctx.video(alice, "clip", true).await;
        let comments = &ctx.services.comments;
        let comment = comments
            .add(Actor::user(alice), video.id, Some("first"))
            .await
            .unwrap();

        let err = comments
            .update(Actor::user(alice), comment.id, Some(""))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let edit = comments
            .update(Actor::user(alice), comment.id, Some(" second "))
            .await
            .unwrap();
        assert_eq!(edit.id, comment.id);
        assert_eq!(edit.content, "second");
        assert!(edit.updated_at >= comment.updated_at);

        comments.delete(Actor::user(alice), comment.id).await.unwrap();
        assert!(!ctx.store.comment_exists(comment.id).await.unwrap());
    }
}
