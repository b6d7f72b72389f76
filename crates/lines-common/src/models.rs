use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── Field normalizers ─────────────────────────────────────────────────

/// Ids arrive as numbers from some endpoints and strings from others.
fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Num(i64),
        Str(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Num(n) => n.to_string(),
        RawId::Str(s) => s,
    })
}

/// Authors are either a bare name or a user object.
fn author_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAuthor {
        Name(String),
        Object {
            #[serde(alias = "fullName", alias = "username")]
            name: Option<String>,
        },
    }

    Ok(match Option::<RawAuthor>::deserialize(deserializer)? {
        Some(RawAuthor::Name(name)) => Some(name),
        Some(RawAuthor::Object { name }) => name,
        None => None,
    })
}

/// Key points are a `|`-separated string on older records and an array on
/// newer ones.
fn key_points<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPoints {
        Joined(String),
        List(Vec<String>),
    }

    let points = match Option::<RawPoints>::deserialize(deserializer)? {
        Some(RawPoints::Joined(s)) => s.split('|').map(str::to_string).collect(),
        Some(RawPoints::List(list)) => list,
        None => Vec::new(),
    };
    Ok(points
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect())
}

// ── Content records ───────────────────────────────────────────────────

/// Canonical article record for the general articles feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(alias = "headline")]
    pub title: String,
    #[serde(default, alias = "excerpt", alias = "briefContent")]
    pub summary: Option<String>,
    #[serde(default, alias = "fullContent")]
    pub content: Option<String>,
    #[serde(default, alias = "featuredImage")]
    pub image_url: Option<String>,
    #[serde(default, alias = "categoryDisplayName")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "author_name")]
    pub author: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub share_count: u64,
    /// Estimated read time in minutes.
    #[serde(default)]
    pub read_time: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub is_trending: bool,
    #[serde(default, alias = "isFavorited", alias = "favorited")]
    pub is_favorite: bool,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Canonical record for the AI/ML news vertical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiArticle {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(alias = "headline")]
    pub title: String,
    #[serde(default, alias = "excerpt", alias = "briefContent")]
    pub summary: Option<String>,
    #[serde(default, alias = "fullContent")]
    pub content: Option<String>,
    #[serde(default, alias = "featuredImage")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "author_name")]
    pub author: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub share_count: u64,
    #[serde(default)]
    pub read_time: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ai_model: Option<String>,
    #[serde(default)]
    pub company_mentioned: Option<String>,
    #[serde(default)]
    pub technology_type: Option<String>,
    #[serde(default)]
    pub relevance_score: Option<f64>,
    #[serde(default)]
    pub is_trending: bool,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Reference from a digest item back to the full story it summarizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedRef {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(default, alias = "headline")]
    pub title: Option<String>,
}

/// Canonical record for the Time Saver digest feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSaverItem {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(alias = "headline")]
    pub title: String,
    #[serde(default, alias = "briefContent")]
    pub summary: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "contentType")]
    pub content_group: Option<String>,
    #[serde(default, deserialize_with = "key_points")]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub read_time_seconds: Option<u32>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub is_priority: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub linked_article: Option<LinkedRef>,
    #[serde(default)]
    pub linked_ai_article: Option<LinkedRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, alias = "count")]
    pub article_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    #[serde(alias = "topic")]
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

/// Counters shown on the Time Saver dashboard strip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSaverStats {
    pub today_new_count: u64,
    pub critical_count: u64,
    pub weekly_count: u64,
    pub viral_buzz_count: u64,
    pub changing_norms_count: u64,
    pub monthly_count: u64,
    pub stories_count: u64,
    pub updates_count: u64,
    pub breaking_count: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

// ── Users and sessions ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[default]
    User,
    Editor,
    AdManager,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Editor => "EDITOR",
            Self::AdManager => "AD_MANAGER",
            Self::Admin => "ADMIN",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Self::User),
            "EDITOR" => Ok(Self::Editor),
            "AD_MANAGER" => Ok(Self::AdManager),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(alias = "name")]
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub preferences: serde_json::Value,
}

/// Access/refresh token pair as persisted on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(alias = "token")]
    pub access_token: String,
    pub refresh_token: String,
}

/// Payload of a successful login or OTP-verified registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub user: UserProfile,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Server acknowledgement of an OTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpChallenge {
    #[serde(default)]
    pub email: String,
    /// How long the emailed code stays valid, as communicated by the server.
    #[serde(default = "default_otp_validity", alias = "expiresIn")]
    pub expires_in_secs: u64,
}

fn default_otp_validity() -> u64 {
    600
}

// ── Favorites, history, notifications ─────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    #[serde(default, deserialize_with = "id_from_any")]
    pub id: String,
    pub article: Article,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FavoritesStats {
    #[serde(alias = "totalFavorites")]
    pub total: u64,
    pub categories: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStatus {
    #[serde(alias = "isFavorited")]
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingHistoryEntry {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(default)]
    pub article: Option<Article>,
    /// Percentage read, 0-100.
    #[serde(default)]
    pub read_progress: u8,
    /// Seconds spent reading.
    #[serde(default)]
    pub time_spent: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of a reading-progress update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgress {
    pub progress: u8,
    pub time_spent: u64,
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub articles_read: u64,
    /// Seconds.
    pub total_reading_time: u64,
    pub streak_days: u32,
    pub favorites_count: u64,
    pub recent_activity: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    ArticleRejected,
    SecurityAlert,
    ArticleApproved,
    ArticlePublished,
    AccountUpdate,
    SystemAnnouncement,
    Promotional,
    #[serde(other)]
    Other,
}

impl NotificationType {
    /// Whether the notification reports something the user should act on.
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::ArticleRejected | Self::SecurityAlert)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default = "default_notification_type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_notification_type() -> NotificationType {
    NotificationType::Other
}

/// Interaction kinds reported by the tracking endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Like,
    Share,
    Bookmark,
    Click,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_normalizes_headline_and_excerpt() {
        let json = r#"{"id":42,"headline":"Rust 2024","excerpt":"New edition",
            "featuredImage":"https://img/x.png","author":{"fullName":"Ada"}}"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.id, "42");
        assert_eq!(article.title, "Rust 2024");
        assert_eq!(article.summary.as_deref(), Some("New edition"));
        assert_eq!(article.image_url.as_deref(), Some("https://img/x.png"));
        assert_eq!(article.author.as_deref(), Some("Ada"));
        assert!(!article.is_favorite);
    }

    #[test]
    fn test_article_accepts_string_author_and_string_id() {
        let json = r#"{"id":"a-1","title":"T","author":"Grace","isFavorited":true}"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.id, "a-1");
        assert_eq!(article.author.as_deref(), Some("Grace"));
        assert!(article.is_favorite);
    }

    #[test]
    fn test_time_saver_key_points_from_joined_string() {
        let json = r#"{"id":1,"title":"Digest","keyPoints":"one| two ||three"}"#;
        let item: TimeSaverItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.key_points, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_time_saver_key_points_from_list() {
        let json = r#"{"id":1,"title":"Digest","keyPoints":["a","b"],
            "linkedAiArticle":{"id":9,"headline":"Model launch"}}"#;
        let item: TimeSaverItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.key_points, vec!["a", "b"]);
        assert_eq!(item.linked_ai_article.unwrap().id, "9");
    }

    #[test]
    fn test_auth_payload_flattens_tokens() {
        let json = r#"{"user":{"id":1,"fullName":"Demo","email":"d@x.io","role":"EDITOR"},
            "accessToken":"a","refreshToken":"r"}"#;
        let payload: AuthPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.user.role, UserRole::Editor);
        assert_eq!(payload.tokens.access_token, "a");
        assert_eq!(payload.tokens.refresh_token, "r");
    }

    #[test]
    fn test_unknown_notification_type_maps_to_other() {
        let json = r#"{"id":3,"title":"Hi","type":"SOMETHING_NEW"}"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.kind, NotificationType::Other);
        assert!(!n.kind.is_alert());
    }

    #[test]
    fn test_user_role_round_trips_through_str() {
        for role in [UserRole::User, UserRole::Editor, UserRole::AdManager, UserRole::Admin] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
        assert!("ROOT".parse::<UserRole>().is_err());
    }
}
