//! Fixtures shared by the service test suites.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use crate::assets::{AssetKind, AssetStore, StoredAsset};
use crate::ids::{TweetId, UserId, VideoId};
use crate::models::{TweetRecord, UserRecord, VideoRecord, now};
use crate::services::Services;
use crate::store::Store;

pub(crate) const FAKE_DURATION: f64 = 42.5;

/// In-memory asset store that can be switched into a failing mode.
#[derive(Default)]
pub(crate) struct FakeAssets {
    fail_videos: AtomicBool,
    fail_thumbnails: AtomicBool,
    uploads: AtomicUsize,
}

impl FakeAssets {
    fn switch(&self, kind: AssetKind) -> &AtomicBool {
        match kind {
            AssetKind::Video => &self.fail_videos,
            AssetKind::Thumbnail => &self.fail_thumbnails,
        }
    }

    pub(crate) fn fail(&self, kind: AssetKind) {
        self.switch(kind).store(true, Ordering::SeqCst);
    }

    pub(crate) fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetStore for FakeAssets {
    async fn upload(&self, local_path: &Path, kind: AssetKind) -> Result<StoredAsset> {
        if self.switch(kind).load(Ordering::SeqCst) {
            bail!("upload of {} rejected", local_path.display());
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(StoredAsset {
            url: format!("https://assets.test/{}/{n}", kind.slug()),
            duration: match kind {
                AssetKind::Video => Some(FAKE_DURATION),
                AssetKind::Thumbnail => None,
            },
        })
    }
}

pub(crate) struct TestContext {
    temp: TempDir,
    pub store: Store,
    pub assets: Arc<FakeAssets>,
    pub services: Services,
}

impl TestContext {
    pub(crate) async fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Store::open(&temp.path().join("vidtube.db"))
            .await
            .expect("store opens");
        let assets = Arc::new(FakeAssets::default());
        let services = Services::new(store.clone(), assets.clone());
        Self {
            temp,
            store,
            assets,
            services,
        }
    }

    /// Writes a small file that stands in for a multipart upload.
    pub(crate) fn staged(&self, name: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        std::fs::write(&path, b"payload").expect("staged file written");
        path
    }

    pub(crate) async fn user(&self, username: &str) -> UserId {
        let user = UserRecord {
            id: UserId::new(),
            username: username.to_string(),
            full_name: format!("{username} Tester"),
            avatar: None,
            created_at: now(),
        };
        self.store.insert_user(&user).await.expect("user inserted");
        user.id
    }

    pub(crate) async fn video(&self, owner: UserId, title: &str, published: bool) -> VideoRecord {
        self.video_at(owner, title, published, now()).await
    }

    /// Inserts a video directly with a fixed creation time, for ordering tests.
    pub(crate) async fn video_at(
        &self,
        owner: UserId,
        title: &str,
        published: bool,
        at: DateTime<Utc>,
    ) -> VideoRecord {
        let video = VideoRecord {
            id: VideoId::new(),
            owner,
            video_file: format!("https://assets.test/videos/{title}"),
            thumbnail: format!("https://assets.test/thumbnails/{title}"),
            title: title.to_string(),
            description: format!("{title} description"),
            duration: 10.0,
            views: 0,
            is_published: published,
            created_at: at,
            updated_at: at,
        };
        self.store.insert_video(&video).await.expect("video inserted");
        video
    }

    pub(crate) async fn tweet_at(&self, owner: UserId, content: &str, at: DateTime<Utc>) -> TweetRecord {
        let tweet = TweetRecord {
            id: TweetId::new(),
            owner,
            content: content.to_string(),
            created_at: at,
            updated_at: at,
        };
        self.store.insert_tweet(&tweet).await.expect("tweet inserted");
        tweet
    }
}
