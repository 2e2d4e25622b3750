//! `twinsync-types` – the shared data model.
//!
//! Closed enums for check status, spot type and feedback voice, the persisted
//! [`Spot`] and [`CheckRecord`] shapes, and the workspace-wide [`SpotError`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on flagged items carried by a single check.
pub const MAX_ITEMS_TO_SORT: usize = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a single spot check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotStatus {
    /// The spot matches its target description.
    Pass,
    /// The spot does not match its target description.
    Fail,
    /// The check could not be completed (missing key, API or parse error).
    Unknown,
}

impl SpotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpotStatus::Pass => "pass",
            SpotStatus::Fail => "fail",
            SpotStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpotStatus {
    type Err = SpotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(SpotStatus::Pass),
            "fail" => Ok(SpotStatus::Fail),
            "unknown" => Ok(SpotStatus::Unknown),
            other => Err(SpotError::invalid("status", other)),
        }
    }
}

/// Kind of location being monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotType {
    Counter,
    Sink,
    Table,
    Floor,
    Shelf,
    Desk,
    Custom,
}

impl SpotType {
    /// Every spot type in display order.
    pub const ALL: [SpotType; 7] = [
        SpotType::Counter,
        SpotType::Sink,
        SpotType::Table,
        SpotType::Floor,
        SpotType::Shelf,
        SpotType::Desk,
        SpotType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpotType::Counter => "counter",
            SpotType::Sink => "sink",
            SpotType::Table => "table",
            SpotType::Floor => "floor",
            SpotType::Shelf => "shelf",
            SpotType::Desk => "desk",
            SpotType::Custom => "custom",
        }
    }

    /// Default name and target description for this type.
    ///
    /// [`SpotType::Custom`] has no template.
    pub fn template(&self) -> Option<SpotTemplate> {
        let (name, description) = match self {
            SpotType::Counter => (
                "Kitchen Counter",
                "Clear counter with no dishes, clutter, or food items",
            ),
            SpotType::Sink => ("Kitchen Sink", "Empty sink with no dirty dishes"),
            SpotType::Table => ("Dining Table", "Clean table surface with no clutter"),
            SpotType::Floor => ("Floor Space", "Clear floor with no items or clutter"),
            SpotType::Shelf => ("Storage Shelf", "Organized shelf with items neatly arranged"),
            SpotType::Desk => ("Work Desk", "Clean desk ready for work"),
            SpotType::Custom => return None,
        };
        Some(SpotTemplate {
            name,
            description,
            spot_type: *self,
        })
    }
}

impl fmt::Display for SpotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpotType {
    type Err = SpotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpotType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SpotError::invalid("spot type", s))
    }
}

/// Preset name and description offered when creating a spot of a given type.
#[derive(Debug, Clone, Serialize)]
pub struct SpotTemplate {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub spot_type: SpotType,
}

/// Feedback personality used when phrasing check results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Voice {
    #[default]
    Direct,
    Supportive,
    Analytical,
    Minimal,
    GentleNudge,
    Custom,
}

impl Voice {
    pub const ALL: [Voice; 6] = [
        Voice::Direct,
        Voice::Supportive,
        Voice::Analytical,
        Voice::Minimal,
        Voice::GentleNudge,
        Voice::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Direct => "direct",
            Voice::Supportive => "supportive",
            Voice::Analytical => "analytical",
            Voice::Minimal => "minimal",
            Voice::GentleNudge => "gentle_nudge",
            Voice::Custom => "custom",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Voice {
    type Err = SpotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Voice::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| SpotError::invalid("voice", s))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Check records
// ─────────────────────────────────────────────────────────────────────────────

/// An item the model flagged as out of place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ToSortItem {
    /// What the item is, e.g. `"sponge"`.
    pub name: String,
    /// Where in the frame it was seen.
    pub location: String,
    /// What to do with it.
    pub suggestion: String,
}

/// One observed check outcome.
///
/// Immutable once produced by the analyzer; the store persists it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub timestamp: DateTime<Utc>,
    pub status: SpotStatus,
    /// Match score in `0..=100`.
    pub score: u8,
    pub feedback: String,
    #[serde(default)]
    pub items_to_sort: Vec<ToSortItem>,
}

/// A check as returned by the analysis step, before it is persisted.
pub type CheckResult = CheckRecord;

impl CheckRecord {
    /// Build a score-0 [`SpotStatus::Unknown`] result carrying `feedback` as
    /// the diagnostic text.
    pub fn unknown(feedback: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            status: SpotStatus::Unknown,
            score: 0,
            feedback: feedback.into(),
            items_to_sort: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == SpotStatus::Pass
    }
}

/// A persisted check together with its row identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCheck {
    pub id: i64,
    pub spot_id: i64,
    #[serde(flatten)]
    pub record: CheckRecord,
}

// ─────────────────────────────────────────────────────────────────────────────
// Spots
// ─────────────────────────────────────────────────────────────────────────────

/// A monitored location and its target state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub id: i64,
    pub name: String,
    /// The target state the camera image is judged against.
    pub description: String,
    pub camera_entity_id: String,
    pub spot_type: SpotType,
    #[serde(rename = "voice_id")]
    pub voice: Voice,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub snoozed_until: Option<DateTime<Utc>>,
}

impl Spot {
    /// `true` while the spot is snoozed past `now`.
    pub fn is_snoozed_at(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| until > now)
    }
}

/// Fields required to create a spot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSpot {
    pub name: String,
    pub description: String,
    pub camera_entity_id: String,
    pub spot_type: SpotType,
    #[serde(rename = "voice_id")]
    pub voice: Voice,
}

/// Partial spot update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub camera_entity_id: Option<String>,
    pub spot_type: Option<SpotType>,
    #[serde(rename = "voice_id")]
    pub voice: Option<Voice>,
}

impl SpotUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.camera_entity_id.is_none()
            && self.spot_type.is_none()
            && self.voice.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type for spot lookups, request validation and the
/// check pipeline's external collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpotError {
    #[error("Spot not found: {0}")]
    NotFound(i64),

    #[error("Invalid {kind}: {value}")]
    InvalidValue { kind: &'static str, value: String },

    #[error("Spot is snoozed until {0}")]
    Snoozed(DateTime<Utc>),

    #[error("Failed to get camera snapshot")]
    SnapshotUnavailable,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SpotError {
    fn invalid(kind: &'static str, value: &str) -> Self {
        SpotError::InvalidValue {
            kind,
            value: value.to_string(),
        }
    }
}
