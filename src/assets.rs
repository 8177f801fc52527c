//! Asset storage for uploaded videos and thumbnails.
//!
//! The services only see the [`AssetStore`] trait: hand it a staged local
//! file, get back a durable URL plus whatever metadata could be derived.
//! [`LocalAssetStore`] keeps files under an asset root on disk and the
//! backend binary streams them back out.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use uuid::Uuid;

const VIDEOS_SUBDIR: &str = "videos";
const THUMBNAILS_SUBDIR: &str = "thumbnails";
const STAGING_SUBDIR: &str = "staging";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Video,
    Thumbnail,
}

impl AssetKind {
    pub fn slug(self) -> &'static str {
        match self {
            Self::Video => VIDEOS_SUBDIR,
            Self::Thumbnail => THUMBNAILS_SUBDIR,
        }
    }

    pub fn from_slug(value: &str) -> Option<Self> {
        match value {
            VIDEOS_SUBDIR => Some(Self::Video),
            THUMBNAILS_SUBDIR => Some(Self::Thumbnail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredAsset {
    pub url: String,
    /// Playback length in seconds, when the asset is a video and it could be
    /// probed.
    pub duration: Option<f64>,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Moves a staged local file into durable storage.
    async fn upload(&self, local_path: &Path, kind: AssetKind) -> Result<StoredAsset>;
}

/// Disk-backed asset store.
///
/// Files land in `<root>/<kind>/<uuid>.<ext>` and are addressed as
/// `<public_base_url>/assets/<kind>/<uuid>.<ext>`.
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
    public_base_url: String,
    ffprobe: Option<PathBuf>,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            ffprobe: Some(PathBuf::from("ffprobe")),
        }
    }

    /// Disables (or redirects) duration probing.
    pub fn with_ffprobe(mut self, binary: Option<PathBuf>) -> Self {
        self.ffprobe = binary;
        self
    }

    /// Where multipart bodies are written before they are uploaded.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_SUBDIR)
    }

    /// Creates the directory layout. Called once at startup.
    pub async fn prepare(&self) -> Result<()> {
        for dir in [
            self.root.join(VIDEOS_SUBDIR),
            self.root.join(THUMBNAILS_SUBDIR),
            self.staging_dir(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }

    /// Resolves `<kind>/<file>` to a path inside the asset root, refusing
    /// anything that could escape it.
    pub fn resolve(&self, kind: AssetKind, file: &str) -> Option<PathBuf> {
        if !is_safe_segment(file) {
            return None;
        }
        Some(self.root.join(kind.slug()).join(file))
    }

    async fn probe_duration(&self, path: &Path) -> Option<f64> {
        let binary = self.ffprobe.as_ref()?;
        let output = Command::new(binary)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(path)
            .output()
            .await;
        match output {
            Ok(output) if output.status.success() => {
                parse_probe_output(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                tracing::warn!(path = %path.display(), status = %output.status, "ffprobe failed");
                None
            }
            Err(err) => {
                tracing::debug!(error = %err, "ffprobe unavailable, duration unknown");
                None
            }
        }
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn upload(&self, local_path: &Path, kind: AssetKind) -> Result<StoredAsset> {
        let metadata = tokio::fs::metadata(local_path)
            .await
            .with_context(|| format!("reading staged asset {}", local_path.display()))?;
        if !metadata.is_file() || metadata.len() == 0 {
            bail!("staged asset {} is empty", local_path.display());
        }

        let ext = local_path
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase());
        let name = match ext {
            Some(ext) => format!("{}.{ext}", Uuid::now_v7()),
            None => Uuid::now_v7().to_string(),
        };
        let target = self.root.join(kind.slug()).join(&name);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::copy(local_path, &target)
            .await
            .with_context(|| format!("storing asset {}", target.display()))?;

        let duration = match kind {
            AssetKind::Video => self.probe_duration(&target).await,
            AssetKind::Thumbnail => None,
        };

        tracing::info!(kind = kind.slug(), file = %name, bytes = metadata.len(), "asset stored");
        Ok(StoredAsset {
            url: format!("{}/assets/{}/{name}", self.public_base_url, kind.slug()),
            duration,
        })
    }
}

/// Validates that a single dynamic path segment never escapes its base folder.
pub fn is_safe_segment(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn parse_probe_output(raw: &str) -> Option<f64> {
    raw.lines()
        .find_map(|line| line.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
}
