//! Records persisted by the store and returned by the services.
//!
//! All structs serialize to the camelCase JSON exposed by the API.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{CommentId, TweetId, UserId, VideoId};

pub const TWEET_MAX_CHARS: usize = 280;

/// Current time at the precision the store keeps (microseconds), so a record
/// built in memory compares equal to the same record read back.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Public projection of a user, used for subscriber and channel lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: VideoId,
    pub owner: UserId,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    /// Seconds, as reported by the asset store. Zero when unknown.
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape of the liked-videos listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: VideoId,
    pub owner: UserId,
    pub title: String,
    pub thumbnail: String,
    pub duration: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: CommentId,
    pub video: VideoId,
    pub owner: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetRecord {
    pub id: TweetId,
    pub owner: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The single target of a like row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Video(VideoId),
    Comment(CommentId),
    Tweet(TweetId),
}

impl LikeTarget {
    /// Column holding this kind of target in the `likes` table.
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Video(_) => "video_id",
            Self::Comment(_) => "comment_id",
            Self::Tweet(_) => "tweet_id",
        }
    }

    pub(crate) fn id_text(&self) -> String {
        match self {
            Self::Video(id) => id.to_string(),
            Self::Comment(id) => id.to_string(),
            Self::Tweet(id) => id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub total_videos: u64,
    pub total_subscribers: u64,
    pub total_views: i64,
    pub total_likes: u64,
}

/// Lowercased copy of a searchable field. SQLite `LIKE` only folds ASCII,
/// so both sides of a text match are folded here instead.
pub(crate) fn search_key(value: &str) -> String {
    value.to_lowercase()
}

/// Free-text match over title and description, case-insensitive substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMatch(String);

impl TextMatch {
    /// Blank queries match everything and are dropped.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(search_key(trimmed)))
        }
    }

    /// `LIKE` pattern with `%`, `_` and the escape character escaped.
    pub(crate) fn like_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.0.len() + 2);
        pattern.push('%');
        for ch in self.0.chars() {
            if matches!(ch, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(ch);
        }
        pattern.push('%');
        pattern
    }
}

/// Inclusive bounds on video duration, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DurationRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Every supported video filter field together with its matching mode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoFilter {
    /// Exact match on the owner.
    pub owner: Option<UserId>,
    /// Substring match on title or description.
    pub text: Option<TextMatch>,
    /// Range match on duration.
    pub duration: DurationRange,
    /// Exact match on the publish flag.
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoSortField {
    #[default]
    CreatedAt,
    Views,
    Duration,
    Title,
}

impl VideoSortField {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim() {
            "createdAt" | "created_at" => Ok(Self::CreatedAt),
            "views" | "view" => Ok(Self::Views),
            "duration" => Ok(Self::Duration),
            "title" => Ok(Self::Title),
            other => Err(DomainError::validation(format!(
                "Unsupported sort field: {other}"
            ))),
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Views => "views",
            Self::Duration => "duration",
            Self::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Only an explicit `asc` sorts ascending.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    pub(crate) fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoSort {
    pub field: VideoSortField,
    pub order: SortOrder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_match_escapes_like_wildcards() {
        let text = TextMatch::new("  50%_off\\ ").unwrap();
        assert_eq!(text.like_pattern(), "%50\\%\\_off\\\\%");
        assert!(TextMatch::new("   ").is_none());
    }

    #[test]
    fn sort_field_parsing() {
        assert_eq!(VideoSortField::parse("views").unwrap(), VideoSortField::Views);
        assert_eq!(
            VideoSortField::parse("createdAt").unwrap(),
            VideoSortField::CreatedAt
        );
        assert_eq!(VideoSortField::parse("owner; DROP").unwrap_err().status_code(), 400);
    }

    #[test]
    fn sort_order_defaults_to_descending() {
        assert_eq!(SortOrder::parse("ASC"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("whatever"), SortOrder::Desc);
    }

    #[test]
    fn video_record_serializes_camel_case() {
        let now = Utc::now();
        let record = VideoRecord {
            id: VideoId::new(),
            owner: UserId::new(),
            video_file: "http://assets/v.mp4".into(),
            thumbnail: "http://assets/t.png".into(),
            title: "T".into(),
            description: "D".into(),
            duration: 12.5,
            views: 0,
            is_published: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["isPublished"], true);
        assert_eq!(json["videoFile"], "http://assets/v.mp4");
        assert_eq!(json["id"], record.id.to_string());
    }
}
