//! Domain services, one per entity family.
//!
//! Each service owns a handle to the [`Store`] and takes the acting identity
//! as an explicit [`Actor`](crate::identity::Actor) argument.

use std::sync::Arc;

use crate::assets::AssetStore;
use crate::store::Store;

pub mod comment;
pub mod dashboard;
pub mod like;
pub mod subscription;
pub mod tweet;
pub mod video;

pub use comment::CommentService;
pub use dashboard::DashboardService;
pub use like::{LikeService, LikeToggle};
pub use subscription::{SubscriptionService, SubscriptionToggle};
pub use tweet::TweetService;
pub use video::{VideoChanges, VideoDraft, VideoService};

/// Every service wired against the same store.
#[derive(Clone)]
pub struct Services {
    pub videos: VideoService,
    pub comments: CommentService,
    pub tweets: TweetService,
    pub likes: LikeService,
    pub subscriptions: SubscriptionService,
    pub dashboard: DashboardService,
}

impl Services {
    pub fn new(store: Store, assets: Arc<dyn AssetStore>) -> Self {
        Self {
            videos: VideoService::new(store.clone(), assets),
            comments: CommentService::new(store.clone()),
            tweets: TweetService::new(store.clone()),
            likes: LikeService::new(store.clone()),
            subscriptions: SubscriptionService::new(store.clone()),
            dashboard: DashboardService::new(store),
        }
    }
}

/// Trims user text and drops it when nothing is left.
pub fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}
