use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::assets::{AssetKind, AssetStore};
use crate::error::{DomainError, ServiceResult};
use crate::identity::Actor;
use crate::ids::VideoId;
use crate::models::{VideoFilter, VideoRecord, VideoSort, now};
use crate::pagination::{Page, PageRequest};
use crate::services::non_blank;
use crate::store::Store;

const VIDEO_NOT_FOUND: &str = "Video not found";

/// Fields of a new upload. The files are already staged on local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct VideoDraft<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub video_file: Option<&'a Path>,
    pub thumbnail: Option<&'a Path>,
}

/// Partial update. Blank text counts as "not supplied".
#[derive(Debug, Default, Clone, Copy)]
pub struct VideoChanges<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub thumbnail: Option<&'a Path>,
}

#[derive(Clone)]
pub struct VideoService {
    store: Store,
    assets: Arc<dyn AssetStore>,
}

impl VideoService {
    pub fn new(store: Store, assets: Arc<dyn AssetStore>) -> Self {
        Self { store, assets }
    }

    /// Lists published videos. The `published` field of `filter` is ignored.
    pub async fn list_videos(
        &self,
        filter: VideoFilter,
        sort: VideoSort,
        page: PageRequest,
    ) -> ServiceResult<Page<VideoRecord>> {
        if let (Some(min), Some(max)) = (filter.duration.min, filter.duration.max) {
            if min > max {
                return Err(DomainError::validation(
                    "minDuration cannot be greater than maxDuration",
                ));
            }
        }
        let filter = VideoFilter {
            published: Some(true),
            ..filter
        };
        let (items, total) = tokio::try_join!(
            self.store.list_videos(&filter, sort, page),
            self.store.count_videos(&filter),
        )?;
        Ok(Page::new(items, page, total))
    }

    pub async fn publish_video(
        &self,
        actor: Actor,
        draft: VideoDraft<'_>,
    ) -> ServiceResult<VideoRecord> {
        let owner = actor.resolve(&self.store).await?;
        let (Some(video_path), Some(thumbnail_path)) = (draft.video_file, draft.thumbnail) else {
            return Err(DomainError::validation(
                "Video file and thumbnail are required",
            ));
        };
        let (Some(title), Some(description)) =
            (non_blank(draft.title), non_blank(draft.description))
        else {
            return Err(DomainError::validation("Title and description are required"));
        };

        let uploaded = tokio::try_join!(
            self.assets.upload(video_path, AssetKind::Video),
            self.assets.upload(thumbnail_path, AssetKind::Thumbnail),
        );
        let (video_asset, thumbnail_asset) = match uploaded {
            Ok(assets) => assets,
            Err(err) => {
                warn!(owner = %owner, error = %err, "asset upload failed");
                return Err(DomainError::validation(
                    "Failed to upload video and thumbnail",
                ));
            }
        };

        let at = now();
        let video = VideoRecord {
            id: VideoId::new(),
            owner,
            video_file: video_asset.url,
            thumbnail: thumbnail_asset.url,
            title: title.to_string(),
            description: description.to_string(),
            duration: video_asset.duration.unwrap_or(0.0),
            views: 0,
            is_published: true,
            created_at: at,
            updated_at: at,
        };
        self.store.insert_video(&video).await?;
        info!(video_id = %video.id, owner = %owner, "video published");
        Ok(video)
    }

    /// Fetches one video. An authenticated viewer other than the owner counts
    /// as one view.
    pub async fn get_video(&self, actor: Actor, id: VideoId) -> ServiceResult<VideoRecord> {
        let mut video = self
            .store
            .get_video(id)
            .await?
            .ok_or_else(|| DomainError::not_found(VIDEO_NOT_FOUND))?;

        if !video.is_published && !actor.is(video.owner) {
            return Err(DomainError::not_found(VIDEO_NOT_FOUND));
        }

        if video.is_published && actor.id().is_some_and(|viewer| viewer != video.owner) {
            video.views = self
                .store
                .increment_views(id)
                .await?
                .ok_or_else(|| DomainError::not_found(VIDEO_NOT_FOUND))?;
        }
        Ok(video)
    }

    pub async fn update_video(
        &self,
        actor: Actor,
        id: VideoId,
        changes: VideoChanges<'_>,
    ) -> ServiceResult<VideoRecord> {
        self.owned_video(actor, id).await?;

        let title = non_blank(changes.title);
        let description = non_blank(changes.description);
        if title.is_none() && description.is_none() && changes.thumbnail.is_none() {
            return Err(DomainError::validation(
                "At least one field is required to update",
            ));
        }

        let thumbnail = match changes.thumbnail {
            Some(path) => {
                let asset = self
                    .assets
                    .upload(path, AssetKind::Thumbnail)
                    .await
                    .inspect_err(|err| warn!(video_id = %id, error = %err, "thumbnail upload failed"))
                    .context("uploading replacement thumbnail")?;
                Some(asset.url)
            }
            None => None,
        };

        let updated = self
            .store
            .update_video_details(id, title, description, thumbnail.as_deref(), now())
            .await?
            .ok_or_else(|| DomainError::not_found(VIDEO_NOT_FOUND))?;
        info!(video_id = %id, "video updated");
        Ok(updated)
    }

    pub async fn delete_video(&self, actor: Actor, id: VideoId) -> ServiceResult<()> {
        self.owned_video(actor, id).await?;
        if !self.store.delete_video(id).await? {
            return Err(DomainError::not_found(VIDEO_NOT_FOUND));
        }
        info!(video_id = %id, "video deleted");
        Ok(())
    }

    pub async fn toggle_publish(&self, actor: Actor, id: VideoId) -> ServiceResult<VideoRecord> {
        self.owned_video(actor, id).await?;
        let video = self
            .store
            .toggle_published(id, now())
            .await?
            .ok_or_else(|| DomainError::not_found(VIDEO_NOT_FOUND))?;
        info!(video_id = %id, published = video.is_published, "publish status toggled");
        Ok(video)
    }

    /// Loads a video the actor owns. Someone else's video reads as absent.
    async fn owned_video(&self, actor: Actor, id: VideoId) -> ServiceResult<VideoRecord> {
        let owner = actor.resolve(&self.store).await?;
        match self.store.get_video(id).await? {
            Some(video) if video.owner == owner => Ok(video),
            _ => Err(DomainError::not_found(VIDEO_NOT_FOUND)),
        }
    }
}
