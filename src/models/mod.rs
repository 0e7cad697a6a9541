use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_PRICE_MIN: f64 = 0.0;
pub const DEFAULT_PRICE_MAX: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    View,
    Like,
    Share,
    Order,
    Comment,
}

impl InteractionType {
    /// Likes and orders are the positive feedback the retrainer learns from.
    pub fn is_positive_feedback(&self) -> bool {
        matches!(self, InteractionType::Like | InteractionType::Order)
    }

    pub fn is_endorsement(&self) -> bool {
        matches!(self, InteractionType::Like | InteractionType::Share)
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InteractionType::View => "view",
            InteractionType::Like => "like",
            InteractionType::Share => "share",
            InteractionType::Order => "order",
            InteractionType::Comment => "comment",
        };
        f.write_str(name)
    }
}

impl FromStr for InteractionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "view" => Ok(InteractionType::View),
            "like" => Ok(InteractionType::Like),
            "share" => Ok(InteractionType::Share),
            "order" => Ok(InteractionType::Order),
            "comment" => Ok(InteractionType::Comment),
            other => Err(format!("unknown interaction type: {other}")),
        }
    }
}

/// Append-only engagement record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub creator_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    pub watch_time_seconds: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub session_id: String,
}

impl InteractionEvent {
    pub fn new(user_id: Uuid, video_id: Uuid, interaction_type: InteractionType) -> Self {
        Self {
            user_id,
            video_id,
            creator_id: None,
            interaction_type,
            watch_time_seconds: None,
            tags: Vec::new(),
            timestamp: Utc::now(),
            device_type: String::new(),
            session_id: String::new(),
        }
    }

    pub fn with_creator(mut self, creator_id: Uuid) -> Self {
        self.creator_id = Some(creator_id);
        self
    }

    pub fn with_watch_time(mut self, seconds: f64) -> Self {
        self.watch_time_seconds = Some(seconds);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Optional payload accompanying a tracked interaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionValue {
    pub watch_time_seconds: Option<f64>,
    pub device_type: Option<String>,
    pub session_id: Option<String>,
}

impl InteractionValue {
    pub fn watch_time(seconds: f64) -> Self {
        Self {
            watch_time_seconds: Some(seconds),
            ..Default::default()
        }
    }
}

/// Content item supplied by the external catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub duration_seconds: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub order_count: u64,
}

impl Candidate {
    pub fn new(id: Uuid, creator_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id,
            creator_id,
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            duration_seconds: 0.0,
            created_at: Utc::now(),
            views: 0,
            likes: 0,
            order_count: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn with_engagement(mut self, views: u64, likes: u64, order_count: u64) -> Self {
        self.views = views;
        self.likes = likes;
        self.order_count = order_count;
        self
    }

    pub fn created(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateFilter {
    #[serde(default)]
    pub exclude_ids: Vec<Uuid>,
    pub created_after: Option<DateTime<Utc>>,
}

impl CandidateFilter {
    pub fn matches(&self, candidate: &Candidate) -> bool {
        if self.exclude_ids.contains(&candidate.id) {
            return false;
        }
        match self.created_after {
            Some(after) => candidate.created_at > after,
            None => true,
        }
    }
}

/// Read-only order record from the order history store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub user_id: Uuid,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_PRICE_MIN,
            max: DEFAULT_PRICE_MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakTime {
    Morning,
    Afternoon,
    Evening,
}

impl PeakTime {
    pub fn from_hour(hour: u32) -> Self {
        if hour < 12 {
            PeakTime::Morning
        } else if hour < 17 {
            PeakTime::Afternoon
        } else {
            PeakTime::Evening
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub cuisines: Vec<String>,
    pub price_range: PriceRange,
    pub dietary_restrictions: BTreeSet<String>,
    pub spice_level: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Behaviors {
    pub avg_watch_time: f64,
    pub order_frequency: f64,
    pub favorite_creators: Vec<Uuid>,
    pub peak_times: Vec<PeakTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub preferences: Preferences,
    pub behaviors: Behaviors,
    pub last_updated: DateTime<Utc>,
    pub interaction_count: u64,
}

impl UserProfile {
    /// Profile for a user with no history: empty collections, default price range.
    pub fn empty(user_id: Uuid, spice_level: u8) -> Self {
        Self {
            user_id,
            preferences: Preferences {
                cuisines: Vec::new(),
                price_range: PriceRange::default(),
                dietary_restrictions: BTreeSet::new(),
                spice_level,
            },
            behaviors: Behaviors::default(),
            last_updated: Utc::now(),
            interaction_count: 0,
        }
    }

    pub fn with_cuisines(mut self, cuisines: Vec<String>) -> Self {
        self.preferences.cuisines = cuisines;
        self
    }

    pub fn with_avg_watch_time(mut self, seconds: f64) -> Self {
        self.behaviors.avg_watch_time = seconds;
        self
    }

    pub fn with_favorite_creators(mut self, creators: Vec<Uuid>) -> Self {
        self.behaviors.favorite_creators = creators;
        self
    }

    /// Folds a new watch time into the cached average as `(old + value) / 2`.
    pub fn fold_watch_time(&mut self, seconds: f64) {
        self.behaviors.avg_watch_time = (self.behaviors.avg_watch_time + seconds) / 2.0;
        self.last_updated = Utc::now();
    }

    pub fn has_history(&self) -> bool {
        self.interaction_count > 0
    }
}

/// Per (user, candidate) signal values, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreVector {
    pub content_similarity: f64,
    pub behavior_match: f64,
    pub popularity: f64,
    pub time_relevance: f64,
    pub location_relevance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub candidate_id: Uuid,
    pub final_score: f64,
}

/// Serialized state used to seed the in-memory stores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub events: Vec<InteractionEvent>,
    #[serde(default)]
    pub orders: Vec<Order>,
}
