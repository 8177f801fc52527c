use crate::error::ServiceResult;
use crate::identity::Actor;
use crate::ids::ChannelId;
use crate::models::{ChannelStats, VideoFilter, VideoRecord, VideoSort};
use crate::pagination::{Page, PageRequest};
use crate::store::Store;

#[derive(Clone)]
pub struct DashboardService {
    store: Store,
}

impl DashboardService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Aggregates for the actor's channel. The four queries run concurrently
    /// and any failure fails the whole call.
    pub async fn channel_stats(&self, actor: Actor) -> ServiceResult<ChannelStats> {
        let owner = actor.resolve(&self.store).await?;
        let own_videos = VideoFilter {
            owner: Some(owner),
            ..VideoFilter::default()
        };
        let (total_videos, total_subscribers, total_views, total_likes) = tokio::try_join!(
            self.store.count_videos(&own_videos),
            self.store.count_subscribers(ChannelId::from(*owner.as_uuid())),
            self.store.total_views(owner),
            self.store.count_video_likes_for_owner(owner),
        )?;
        Ok(ChannelStats {
            total_videos,
            total_subscribers,
            total_views,
            total_likes,
        })
    }

    /// The actor's own videos, unpublished ones included.
    pub async fn channel_videos(
        &self,
        actor: Actor,
        page: PageRequest,
    ) -> ServiceResult<Page<VideoRecord>> {
        let owner = actor.resolve(&self.store).await?;
        let filter = VideoFilter {
            owner: Some(owner),
            ..VideoFilter::default()
        };
        let (items, total) = tokio::try_join!(
            self.store.list_videos(&filter, VideoSort::default(), page),
            self.store.count_videos(&filter),
        )?;
        Ok(Page::new(items, page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::now;
    use crate::testing::TestContext;
    use chrono::Duration;

    #[tokio::test]
    async fn empty_channel_reports_zeroes() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;

        let stats = ctx
            .services
            .dashboard
            .channel_stats(Actor::user(alice))
            .await
            .unwrap();
        assert_eq!(
            stats,
            ChannelStats {
                total_videos: 0,
                total_subscribers: 0,
                total_views: 0,
                total_likes: 0,
            }
        );
    }

    #[tokio::test]
    async fn stats_aggregate_the_channel() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let bob = ctx.user("bob").await;
        let carol = ctx.user("carol").await;
        let s = &ctx.services;
        let public = ctx.video(alice, "public", true).await;
        let hidden = ctx.video(alice, "hidden", false).await;
        let other = ctx.video(bob, "elsewhere", true).await;

        s.videos.get_video(Actor::user(bob), public.id).await.unwrap();
        s.videos.get_video(Actor::user(carol), public.id).await.unwrap();
        s.videos.get_video(Actor::user(alice), other.id).await.unwrap();
        s.likes.toggle_video_like(Actor::user(bob), public.id).await.unwrap();
        s.likes.toggle_video_like(Actor::user(alice), hidden.id).await.unwrap();
        s.likes.toggle_video_like(Actor::user(alice), other.id).await.unwrap();
        let alice_channel = ChannelId::from(*alice.as_uuid());
        s.subscriptions.toggle(Actor::user(bob), alice_channel).await.unwrap();
        s.subscriptions.toggle(Actor::user(carol), alice_channel).await.unwrap();

        let stats = s.dashboard.channel_stats(Actor::user(alice)).await.unwrap();
        assert_eq!(stats.total_videos, 2);
        assert_eq!(stats.total_subscribers, 2);
        assert_eq!(stats.total_views, 2);
        assert_eq!(stats.total_likes, 2);
    }

    #[tokio::test]
    async fn channel_videos_include_unpublished_and_require_actor() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let bob = ctx.user("bob").await;
        ctx.video(alice, "public", true).await;
        ctx.video(alice, "hidden", false).await;
        ctx.video(bob, "other", true).await;
        let dashboard = &ctx.services.dashboard;

        let page = dashboard
            .channel_videos(Actor::user(alice), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 2);
        assert!(page.items.iter().all(|v| v.owner == alice));

        let err = dashboard
            .channel_videos(Actor::anonymous(), PageRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
        let err = dashboard.channel_stats(Actor::anonymous()).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn channel_video_pages_are_disjoint_and_newest_first() {
        let ctx = TestContext::new().await;
        let alice = ctx.user("alice").await;
        let bob = ctx.user("bob").await;
        let base = now();
        let mut expected = Vec::new();
        for n in 0..5 {
            let video = ctx
                .video_at(alice, &format!("v{n}"), n % 2 == 0, base + Duration::seconds(n))
                .await;
            expected.push(video.id);
        }
        ctx.video_at(bob, "other", true, base + Duration::seconds(30)).await;
        expected.reverse();
        let dashboard = &ctx.services.dashboard;

        let first = dashboard
            .channel_videos(Actor::user(alice), PageRequest::new(1, 2))
            .await
            .unwrap();
        let second = dashboard
            .channel_videos(Actor::user(alice), PageRequest::new(2, 2))
            .await
            .unwrap();
        assert_eq!(first.pagination.total, 5);
        let ids: Vec<_> = first.items.iter().chain(&second.items).map(|v| v.id).collect();
        assert_eq!(ids, expected[..4]);
    }
}
