//! Persistence layer for VidTube.
//!
//! A single SQLite database (through libsql) holds users, videos, comments,
//! tweets, likes and subscriptions. Uniqueness of relation rows is enforced
//! by the schema, so concurrent toggles never produce duplicates.
//!
//! Timestamps are stored as fixed-width RFC3339 text (microsecond precision,
//! `Z` suffix) so lexical order equals chronological order.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Builder, Connection, Row, Value, params, params::Params};

use crate::ids::{self, ChannelId, CommentId, LikeId, SubscriptionId, TweetId, UserId, VideoId};
use crate::models::{
    CommentRecord, LikeTarget, TweetRecord, UserRecord, UserSummary, VideoFilter, VideoRecord,
    VideoSort, VideoSummary, search_key,
};
use crate::pagination::PageRequest;

const VIDEO_COLUMNS: &str = "id, owner_id, video_file, thumbnail, title, description, \
     duration, views, is_published, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, video_id, owner_id, content, created_at, updated_at";
const TWEET_COLUMNS: &str = "id, owner_id, content, created_at, updated_at";

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;
        "#,
    )
    .await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL DEFAULT '',
            avatar TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS videos (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL REFERENCES users(id),
            video_file TEXT NOT NULL,
            thumbnail TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            duration REAL NOT NULL DEFAULT 0,
            views INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0),
            is_published INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            title_search TEXT NOT NULL DEFAULT '',
            description_search TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_videos_owner ON videos(owner_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_videos_published ON videos(is_published, created_at);

        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
            owner_id TEXT NOT NULL REFERENCES users(id),
            content TEXT NOT NULL CHECK (length(trim(content)) > 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_video ON comments(video_id, created_at);

        CREATE TABLE IF NOT EXISTS tweets (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL REFERENCES users(id),
            content TEXT NOT NULL CHECK (length(trim(content)) > 0 AND length(content) <= 280),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tweets_owner ON tweets(owner_id, created_at);

        CREATE TABLE IF NOT EXISTS likes (
            id TEXT PRIMARY KEY,
            liked_by TEXT NOT NULL REFERENCES users(id),
            video_id TEXT REFERENCES videos(id) ON DELETE CASCADE,
            comment_id TEXT REFERENCES comments(id) ON DELETE CASCADE,
            tweet_id TEXT REFERENCES tweets(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            CHECK (
                (video_id IS NOT NULL) + (comment_id IS NOT NULL) + (tweet_id IS NOT NULL) = 1
            )
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_likes_user_video
            ON likes(liked_by, video_id) WHERE video_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_likes_user_comment
            ON likes(liked_by, comment_id) WHERE comment_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_likes_user_tweet
            ON likes(liked_by, tweet_id) WHERE tweet_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_likes_video ON likes(video_id);
        CREATE INDEX IF NOT EXISTS idx_likes_comment ON likes(comment_id);
        CREATE INDEX IF NOT EXISTS idx_likes_tweet ON likes(tweet_id);

        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            subscriber_id TEXT NOT NULL REFERENCES users(id),
            channel_id TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL,
            CHECK (subscriber_id <> channel_id),
            UNIQUE (subscriber_id, channel_id)
        );

        CREATE INDEX IF NOT EXISTS idx_subscriptions_channel
            ON subscriptions(channel_id, created_at);
        "#,
    )
    .await?;

    Ok(())
}

/// Formats a timestamp the way every `*_at` column stores it.
fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("parsing stored timestamp {raw:?}"))?
        .with_timezone(&Utc))
}

/// Wrapper around the SQLite-compatible connection that performs every read
/// and write the services need.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (and if necessary creates) the database and ensures the expected
    /// schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening database {}", path.display()))?;

        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn).await?;
        Ok(Self { conn })
    }

    // ---- users -------------------------------------------------------------

    /// Users are provisioned by the account service; the core only reads them.
    pub async fn insert_user(&self, user: &UserRecord) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO users (id, username, full_name, avatar, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    user.id.to_string(),
                    user.username.as_str(),
                    user.full_name.as_str(),
                    user.avatar.as_deref(),
                    timestamp(&user.created_at),
                ],
            )
            .await
            .with_context(|| format!("inserting user {}", user.username))?;
        Ok(())
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, username, full_name, avatar, created_at FROM users WHERE id = ?1",
                params![id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(UserRecord {
                id: ids::stored(&row.get::<String>(0)?)?,
                username: row.get(1)?,
                full_name: row.get(2)?,
                avatar: row.get(3)?,
                created_at: parse_timestamp(&row.get::<String>(4)?)?,
            })),
            None => Ok(None),
        }
    }

    pub async fn user_exists(&self, id: UserId) -> Result<bool> {
        self.exists("users", &id.to_string()).await
    }

    // ---- videos ------------------------------------------------------------

    pub async fn insert_video(&self, video: &VideoRecord) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO videos ({VIDEO_COLUMNS}, title_search, description_search) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    video.id.to_string(),
                    video.owner.to_string(),
                    video.video_file.as_str(),
                    video.thumbnail.as_str(),
                    video.title.as_str(),
                    video.description.as_str(),
                    video.duration,
                    video.views,
                    video.is_published as i64,
                    timestamp(&video.created_at),
                    timestamp(&video.updated_at),
                    search_key(&video.title),
                    search_key(&video.description),
                ],
            )
            .await
            .with_context(|| format!("inserting video {}", video.id))?;
        Ok(())
    }

    pub async fn get_video(&self, id: VideoId) -> Result<Option<VideoRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"),
                params![id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_video(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn video_exists(&self, id: VideoId) -> Result<bool> {
        self.exists("videos", &id.to_string()).await
    }

    pub async fn list_videos(
        &self,
        filter: &VideoFilter,
        sort: VideoSort,
        page: PageRequest,
    ) -> Result<Vec<VideoRecord>> {
        let (clause, mut values) = video_where(filter);
        let direction = sort.order.keyword();
        let sql = format!(
            "SELECT {VIDEO_COLUMNS} FROM videos {clause} \
             ORDER BY {column} {direction}, id {direction} LIMIT ? OFFSET ?",
            column = sort.field.column(),
        );
        values.push(Value::Integer(i64::from(page.limit())));
        values.push(Value::Integer(page.offset()));

        let mut rows = self.conn.query(&sql, Params::Positional(values)).await?;
        let mut videos = Vec::new();
        while let Some(row) = rows.next().await? {
            videos.push(row_to_video(&row)?);
        }
        Ok(videos)
    }

    pub async fn count_videos(&self, filter: &VideoFilter) -> Result<u64> {
        let (clause, values) = video_where(filter);
        let sql = format!("SELECT COUNT(*) FROM videos {clause}");
        self.count(&sql, Params::Positional(values)).await
    }

    /// Atomically bumps the view counter and returns the new value, or `None`
    /// when the video no longer exists.
    pub async fn increment_views(&self, id: VideoId) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "UPDATE videos SET views = views + 1 WHERE id = ?1 RETURNING views",
                params![id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Partial update: `None` leaves the column untouched.
    pub async fn update_video_details(
        &self,
        id: VideoId,
        title: Option<&str>,
        description: Option<&str>,
        thumbnail: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<VideoRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    r#"
                    UPDATE videos SET
                        title = COALESCE(?1, title),
                        description = COALESCE(?2, description),
                        thumbnail = COALESCE(?3, thumbnail),
                        updated_at = ?4,
                        title_search = COALESCE(?6, title_search),
                        description_search = COALESCE(?7, description_search)
                    WHERE id = ?5
                    RETURNING {VIDEO_COLUMNS}
                    "#
                ),
                params![
                    title,
                    description,
                    thumbnail,
                    timestamp(&updated_at),
                    id.to_string(),
                    title.map(search_key),
                    description.map(search_key),
                ],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_video(&row)?)),
            None => Ok(None),
        }
    }

    /// Flips the publish flag in a single statement.
    pub async fn toggle_published(
        &self,
        id: VideoId,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<VideoRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    r#"
                    UPDATE videos SET is_published = NOT is_published, updated_at = ?1
                    WHERE id = ?2
                    RETURNING {VIDEO_COLUMNS}
                    "#
                ),
                params![timestamp(&updated_at), id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_video(&row)?)),
            None => Ok(None),
        }
    }

    /// Removes the video; comments and likes go with it through the
    /// `ON DELETE CASCADE` foreign keys.
    pub async fn delete_video(&self, id: VideoId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM videos WHERE id = ?1", params![id.to_string()])
            .await?;
        Ok(changed > 0)
    }

    pub async fn total_views(&self, owner: UserId) -> Result<i64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COALESCE(SUM(views), 0) FROM videos WHERE owner_id = ?1",
                params![owner.to_string()],
            )
            .await?;
        let row = rows.next().await?.context("missing views aggregate row")?;
        Ok(row.get(0)?)
    }

    // ---- comments ----------------------------------------------------------

    pub async fn insert_comment(&self, comment: &CommentRecord) -> Result<()> {
        self.conn
            .execute(
                &format!("INSERT INTO comments ({COMMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    comment.id.to_string(),
                    comment.video.to_string(),
                    comment.owner.to_string(),
                    comment.content.as_str(),
                    timestamp(&comment.created_at),
                    timestamp(&comment.updated_at),
                ],
            )
            .await
            .with_context(|| format!("inserting comment {}", comment.id))?;
        Ok(())
    }

    pub async fn get_comment(&self, id: CommentId) -> Result<Option<CommentRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
                params![id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_comment(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn comment_exists(&self, id: CommentId) -> Result<bool> {
        self.exists("comments", &id.to_string()).await
    }

    pub async fn list_comments(
        &self,
        video: VideoId,
        page: PageRequest,
    ) -> Result<Vec<CommentRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {COMMENT_COLUMNS} FROM comments WHERE video_id = ?1 \
                     ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
                ),
                params![
                    video.to_string(),
                    i64::from(page.limit()),
                    page.offset()
                ],
            )
            .await?;
        let mut comments = Vec::new();
        while let Some(row) = rows.next().await? {
            comments.push(row_to_comment(&row)?);
        }
        Ok(comments)
    }

    pub async fn count_comments(&self, video: VideoId) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM comments WHERE video_id = ?1",
            params![video.to_string()],
        )
        .await
    }

    pub async fn update_comment_content(
        &self,
        id: CommentId,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<CommentRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "UPDATE comments SET content = ?1, updated_at = ?2 WHERE id = ?3 \
                     RETURNING {COMMENT_COLUMNS}"
                ),
                params![content, timestamp(&updated_at), id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_comment(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_comment(&self, id: CommentId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM comments WHERE id = ?1", params![id.to_string()])
            .await?;
        Ok(changed > 0)
    }

    // ---- tweets ------------------------------------------------------------

    pub async fn insert_tweet(&self, tweet: &TweetRecord) -> Result<()> {
        self.conn
            .execute(
                &format!("INSERT INTO tweets ({TWEET_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                params![
                    tweet.id.to_string(),
                    tweet.owner.to_string(),
                    tweet.content.as_str(),
                    timestamp(&tweet.created_at),
                    timestamp(&tweet.updated_at),
                ],
            )
            .await
            .with_context(|| format!("inserting tweet {}", tweet.id))?;
        Ok(())
    }

    pub async fn tweet_exists(&self, id: TweetId) -> Result<bool> {
        self.exists("tweets", &id.to_string()).await
    }

    pub async fn list_tweets(&self, owner: UserId, page: PageRequest) -> Result<Vec<TweetRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {TWEET_COLUMNS} FROM tweets WHERE owner_id = ?1 \
                     ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
                ),
                params![
                    owner.to_string(),
                    i64::from(page.limit()),
                    page.offset()
                ],
            )
            .await?;
        let mut tweets = Vec::new();
        while let Some(row) = rows.next().await? {
            tweets.push(row_to_tweet(&row)?);
        }
        Ok(tweets)
    }

    pub async fn count_tweets(&self, owner: UserId) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM tweets WHERE owner_id = ?1",
            params![owner.to_string()],
        )
        .await
    }

    /// Conditional write: only touches the row when both id and owner match.
    pub async fn update_owned_tweet(
        &self,
        id: TweetId,
        owner: UserId,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<TweetRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "UPDATE tweets SET content = ?1, updated_at = ?2 \
                     WHERE id = ?3 AND owner_id = ?4 RETURNING {TWEET_COLUMNS}"
                ),
                params![
                    content,
                    timestamp(&updated_at),
                    id.to_string(),
                    owner.to_string()
                ],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_tweet(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_owned_tweet(&self, id: TweetId, owner: UserId) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM tweets WHERE id = ?1 AND owner_id = ?2",
                params![id.to_string(), owner.to_string()],
            )
            .await?;
        Ok(changed > 0)
    }

    // ---- likes -------------------------------------------------------------

    /// Atomic find-and-delete of the (user, target) relation row.
    pub async fn delete_like(&self, user: UserId, target: LikeTarget) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                &format!(
                    "DELETE FROM likes WHERE liked_by = ?1 AND {} = ?2",
                    target.column()
                ),
                params![user.to_string(), target.id_text()],
            )
            .await?;
        Ok(changed > 0)
    }

    /// Inserts the relation row. A concurrent duplicate is absorbed by the
    /// unique index; the return value says whether this call wrote the row.
    pub async fn insert_like(
        &self,
        id: LikeId,
        user: UserId,
        target: LikeTarget,
        created_at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO likes (id, liked_by, {}, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    target.column()
                ),
                params![
                    id.to_string(),
                    user.to_string(),
                    target.id_text(),
                    timestamp(&created_at),
                ],
            )
            .await?;
        Ok(changed > 0)
    }

    pub async fn like_exists(&self, user: UserId, target: LikeTarget) -> Result<bool> {
        let total = self
            .count(
                &format!(
                    "SELECT COUNT(*) FROM likes WHERE liked_by = ?1 AND {} = ?2",
                    target.column()
                ),
                params![user.to_string(), target.id_text()],
            )
            .await?;
        Ok(total > 0)
    }

    /// Videos liked by `user`, most recent like first. Videos unpublished
    /// since the like was made stay hidden unless `user` owns them.
    pub async fn list_liked_videos(
        &self,
        user: UserId,
        page: PageRequest,
    ) -> Result<Vec<VideoSummary>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT v.id, v.owner_id, v.title, v.thumbnail, v.duration, v.created_at
                FROM likes l
                JOIN videos v ON v.id = l.video_id
                WHERE l.liked_by = ?1
                  AND (v.is_published = 1 OR v.owner_id = ?1)
                ORDER BY l.created_at DESC, l.id DESC
                LIMIT ?2 OFFSET ?3
                "#,
                params![user.to_string(), i64::from(page.limit()), page.offset()],
            )
            .await?;
        let mut videos = Vec::new();
        while let Some(row) = rows.next().await? {
            videos.push(VideoSummary {
                id: ids::stored(&row.get::<String>(0)?)?,
                owner: ids::stored(&row.get::<String>(1)?)?,
                title: row.get(2)?,
                thumbnail: row.get(3)?,
                duration: row.get(4)?,
                created_at: parse_timestamp(&row.get::<String>(5)?)?,
            });
        }
        Ok(videos)
    }

    pub async fn count_liked_videos(&self, user: UserId) -> Result<u64> {
        self.count(
            r#"
            SELECT COUNT(*)
            FROM likes l
            JOIN videos v ON v.id = l.video_id
            WHERE l.liked_by = ?1
              AND (v.is_published = 1 OR v.owner_id = ?1)
            "#,
            params![user.to_string()],
        )
        .await
    }

    /// Likes received across every video owned by `owner`.
    pub async fn count_video_likes_for_owner(&self, owner: UserId) -> Result<u64> {
        self.count(
            r#"
            SELECT COUNT(*)
            FROM likes l
            JOIN videos v ON v.id = l.video_id
            WHERE v.owner_id = ?1
            "#,
            params![owner.to_string()],
        )
        .await
    }

    // ---- subscriptions -----------------------------------------------------

    pub async fn delete_subscription(&self, subscriber: UserId, channel: ChannelId) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2",
                params![subscriber.to_string(), channel.to_string()],
            )
            .await?;
        Ok(changed > 0)
    }

    pub async fn insert_subscription(
        &self,
        id: SubscriptionId,
        subscriber: UserId,
        channel: ChannelId,
        created_at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                r#"
                INSERT OR IGNORE INTO subscriptions (id, subscriber_id, channel_id, created_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    id.to_string(),
                    subscriber.to_string(),
                    channel.to_string(),
                    timestamp(&created_at),
                ],
            )
            .await?;
        Ok(changed > 0)
    }

    pub async fn subscription_exists(&self, subscriber: UserId, channel: ChannelId) -> Result<bool> {
        let total = self
            .count(
                "SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2",
                params![subscriber.to_string(), channel.to_string()],
            )
            .await?;
        Ok(total > 0)
    }

    pub async fn list_subscribers(
        &self,
        channel: ChannelId,
        page: PageRequest,
    ) -> Result<Vec<UserSummary>> {
        self.list_related_users(
            r#"
            SELECT u.id, u.username, u.full_name, u.avatar
            FROM subscriptions s
            JOIN users u ON u.id = s.subscriber_id
            WHERE s.channel_id = ?1
            ORDER BY s.created_at DESC, s.id DESC
            LIMIT ?2 OFFSET ?3
            "#,
            &channel.to_string(),
            page,
        )
        .await
    }

    pub async fn count_subscribers(&self, channel: ChannelId) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?1",
            params![channel.to_string()],
        )
        .await
    }

    pub async fn list_subscriptions(
        &self,
        subscriber: UserId,
        page: PageRequest,
    ) -> Result<Vec<UserSummary>> {
        self.list_related_users(
            r#"
            SELECT u.id, u.username, u.full_name, u.avatar
            FROM subscriptions s
            JOIN users u ON u.id = s.channel_id
            WHERE s.subscriber_id = ?1
            ORDER BY s.created_at DESC, s.id DESC
            LIMIT ?2 OFFSET ?3
            "#,
            &subscriber.to_string(),
            page,
        )
        .await
    }

    pub async fn count_subscriptions(&self, subscriber: UserId) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = ?1",
            params![subscriber.to_string()],
        )
        .await
    }

    // ---- helpers -----------------------------------------------------------

    async fn list_related_users(
        &self,
        sql: &str,
        key: &str,
        page: PageRequest,
    ) -> Result<Vec<UserSummary>> {
        let mut rows = self
            .conn
            .query(sql, params![key, i64::from(page.limit()), page.offset()])
            .await?;
        let mut users = Vec::new();
        while let Some(row) = rows.next().await? {
            users.push(UserSummary {
                id: ids::stored(&row.get::<String>(0)?)?,
                username: row.get(1)?,
                full_name: row.get(2)?,
                avatar: row.get(3)?,
            });
        }
        Ok(users)
    }

    async fn exists(&self, table: &str, id: &str) -> Result<bool> {
        let total = self
            .count(
                &format!("SELECT COUNT(*) FROM {table} WHERE id = ?1"),
                params![id],
            )
            .await?;
        Ok(total > 0)
    }

    async fn count(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<u64> {
        let mut rows = self.conn.query(sql, params).await?;
        let row = rows.next().await?.context("missing COUNT row")?;
        let total: i64 = row.get(0)?;
        Ok(total.max(0) as u64)
    }
}

/// Builds the `WHERE` clause for a video filter together with its positional
/// parameters, in order.
fn video_where(filter: &VideoFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(owner) = filter.owner {
        clauses.push("owner_id = ?");
        values.push(Value::Text(owner.to_string()));
    }
    if let Some(published) = filter.published {
        clauses.push("is_published = ?");
        values.push(Value::Integer(published as i64));
    }
    if let Some(text) = &filter.text {
        let pattern = text.like_pattern();
        clauses.push(
            "(title_search LIKE ? ESCAPE '\\' OR description_search LIKE ? ESCAPE '\\')",
        );
        values.push(Value::Text(pattern.clone()));
        values.push(Value::Text(pattern));
    }
    if let Some(min) = filter.duration.min {
        clauses.push("duration >= ?");
        values.push(Value::Real(min));
    }
    if let Some(max) = filter.duration.max {
        clauses.push("duration <= ?");
        values.push(Value::Real(max));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}

/// Column order must match `VIDEO_COLUMNS`.
fn row_to_video(row: &Row) -> Result<VideoRecord> {
    Ok(VideoRecord {
        id: ids::stored(&row.get::<String>(0)?)?,
        owner: ids::stored(&row.get::<String>(1)?)?,
        video_file: row.get(2)?,
        thumbnail: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        duration: row.get(6)?,
        views: row.get(7)?,
        is_published: row.get::<i64>(8).map(|value| value != 0)?,
        created_at: parse_timestamp(&row.get::<String>(9)?)?,
        updated_at: parse_timestamp(&row.get::<String>(10)?)?,
    })
}

fn row_to_comment(row: &Row) -> Result<CommentRecord> {
    Ok(CommentRecord {
        id: ids::stored(&row.get::<String>(0)?)?,
        video: ids::stored(&row.get::<String>(1)?)?,
        owner: ids::stored(&row.get::<String>(2)?)?,
        content: row.get(3)?,
        created_at: parse_timestamp(&row.get::<String>(4)?)?,
        updated_at: parse_timestamp(&row.get::<String>(5)?)?,
    })
}

fn row_to_tweet(row: &Row) -> Result<TweetRecord> {
    Ok(TweetRecord {
        id: ids::stored(&row.get::<String>(0)?)?,
        owner: ids::stored(&row.get::<String>(1)?)?,
        content: row.get(2)?,
        created_at: parse_timestamp(&row.get::<String>(3)?)?,
        updated_at: parse_timestamp(&row.get::<String>(4)?)?,
    })
}
