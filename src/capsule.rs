//! Core data structures for the timecaps application.
//!
//! This module contains the capsule entity itself plus the closed mood and
//! color tag sets. Field names serialize in camelCase so the on-disk file
//! and the remote `/capsules` service share one wire format.
use chrono::{DateTime, NaiveDate, Utc};
use console::Style;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a capsule. Millisecond-timestamp based when
/// assigned locally; the remote service may assign its own.
pub type CapsuleId = i64;

/// Represents a single sealed (or opened) time capsule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capsule {
    /// Unique identifier, assigned at creation, never reused
    pub id: CapsuleId,
    /// Capsule title
    pub title: String,
    /// The sealed message
    pub message: String,
    /// Calendar date after which the capsule may be opened
    pub open_date: NaiveDate,
    /// When the capsule was created
    pub created_at: DateTime<Utc>,
    /// Whether the capsule is still locked; derived from `open_date` at
    /// creation, cleared by the open operation
    pub is_locked: bool,
    /// Mood tag chosen at creation
    pub mood: Mood,
    /// Color tag chosen at creation
    pub color: CapsuleColor,
    /// When the capsule was opened; absent until the open operation stamps it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<DateTime<Utc>>,
}

impl Capsule {
    /// Creates a new capsule from validated fields. `sealed` is the
    /// creation-time lock decision (see `lifecycle::sealed_at_creation`).
    pub fn new(
        id: CapsuleId,
        title: String,
        message: String,
        open_date: NaiveDate,
        mood: Mood,
        color: CapsuleColor,
        sealed: bool,
    ) -> Self {
        Capsule {
            id,
            title,
            message,
            open_date,
            created_at: Utc::now(),
            is_locked: sealed,
            mood,
            color,
            opened_at: None,
        }
    }
}

/// The user-supplied fields of a capsule before the store assigns it an
/// identity. `open_date` stays a raw string until validation parses it.
#[derive(Debug, Clone)]
pub struct CapsuleDraft {
    pub title: String,
    pub message: String,
    pub open_date: String,
    pub mood: Mood,
    pub color: CapsuleColor,
}

/// Mood tag for a capsule. Parsing is total: unknown values fall back to
/// `Hopeful` instead of failing, so records from older files or a lenient
/// service always load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Mood {
    #[default]
    Hopeful,
    Grateful,
    Excited,
    Nostalgic,
    Dreamy,
    Happy,
    Sad,
}

impl Mood {
    /// Parses a mood tag, falling back to the default for unknown values.
    pub fn parse(value: &str) -> Self {
        match value {
            "hopeful" => Mood::Hopeful,
            "grateful" => Mood::Grateful,
            "excited" => Mood::Excited,
            "nostalgic" => Mood::Nostalgic,
            "dreamy" => Mood::Dreamy,
            "happy" => Mood::Happy,
            "sad" => Mood::Sad,
            _ => Mood::default(),
        }
    }

    /// The wire-format name of this mood.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Hopeful => "hopeful",
            Mood::Grateful => "grateful",
            Mood::Excited => "excited",
            Mood::Nostalgic => "nostalgic",
            Mood::Dreamy => "dreamy",
            Mood::Happy => "happy",
            Mood::Sad => "sad",
        }
    }

    /// Emoji glyph shown next to the title in listings.
    pub fn emoji(&self) -> &'static str {
        match self {
            Mood::Hopeful => "🌟",
            Mood::Grateful => "💖",
            Mood::Excited => "🎉",
            Mood::Nostalgic => "🌙",
            Mood::Dreamy => "✨",
            Mood::Happy => "😊",
            Mood::Sad => "😢",
        }
    }
}

impl From<String> for Mood {
    fn from(value: String) -> Self {
        Mood::parse(&value)
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Color tag for a capsule. Parsing is total with a `Blue` fallback, same
/// rule as `Mood`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum CapsuleColor {
    #[default]
    Blue,
    Pink,
    Green,
    Orange,
    Purple,
}

impl CapsuleColor {
    /// Parses a color tag, falling back to the default for unknown values.
    pub fn parse(value: &str) -> Self {
        match value {
            "blue" => CapsuleColor::Blue,
            "pink" => CapsuleColor::Pink,
            "green" => CapsuleColor::Green,
            "orange" => CapsuleColor::Orange,
            "purple" => CapsuleColor::Purple,
            _ => CapsuleColor::default(),
        }
    }

    /// The wire-format name of this color.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapsuleColor::Blue => "blue",
            CapsuleColor::Pink => "pink",
            CapsuleColor::Green => "green",
            CapsuleColor::Orange => "orange",
            CapsuleColor::Purple => "purple",
        }
    }

    /// Terminal style used when rendering this capsule's title.
    pub fn style(&self) -> Style {
        match self {
            CapsuleColor::Blue => Style::new().blue(),
            CapsuleColor::Pink => Style::new().color256(205),
            CapsuleColor::Green => Style::new().green(),
            CapsuleColor::Orange => Style::new().color256(208),
            CapsuleColor::Purple => Style::new().color256(135),
        }
    }
}

impl From<String> for CapsuleColor {
    fn from(value: String) -> Self {
        CapsuleColor::parse(&value)
    }
}

impl fmt::Display for CapsuleColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_capsule() -> Capsule {
        Capsule::new(
            1735689600000,
            "To future me".to_string(),
            "Remember this year.".to_string(),
            NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            Mood::Nostalgic,
            CapsuleColor::Purple,
            true,
        )
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let capsule = sample_capsule();
        let json = serde_json::to_value(&capsule).unwrap();

        assert_eq!(json["id"], 1735689600000i64);
        assert_eq!(json["openDate"], "2030-06-01");
        assert_eq!(json["isLocked"], true);
        assert_eq!(json["mood"], "nostalgic");
        assert_eq!(json["color"], "purple");
        assert!(json.get("createdAt").is_some());
        // openedAt is omitted entirely while unset
        assert!(json.get("openedAt").is_none());
    }

    #[test]
    fn round_trips_through_json() {
        let mut capsule = sample_capsule();
        capsule.is_locked = false;
        capsule.opened_at = Some(Utc::now());

        let json = serde_json::to_string(&capsule).unwrap();
        let back: Capsule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, capsule);
    }

    #[test]
    fn deserializes_record_without_opened_at() {
        let json = r#"{
            "id": 42,
            "title": "Hello",
            "message": "World",
            "openDate": "2099-01-01",
            "createdAt": "2025-01-01T00:00:00Z",
            "isLocked": true,
            "mood": "excited",
            "color": "green"
        }"#;
        let capsule: Capsule = serde_json::from_str(json).unwrap();
        assert_eq!(capsule.id, 42);
        assert_eq!(capsule.mood, Mood::Excited);
        assert_eq!(capsule.color, CapsuleColor::Green);
        assert!(capsule.opened_at.is_none());
    }

    #[test]
    fn unknown_mood_falls_back_to_default() {
        let mood: Mood = serde_json::from_str(r#""melancholic""#).unwrap();
        assert_eq!(mood, Mood::Hopeful);
        assert_eq!(Mood::parse("???"), Mood::Hopeful);
    }

    #[test]
    fn unknown_color_falls_back_to_default() {
        let color: CapsuleColor = serde_json::from_str(r#""chartreuse""#).unwrap();
        assert_eq!(color, CapsuleColor::Blue);
        assert_eq!(CapsuleColor::parse(""), CapsuleColor::Blue);
    }

    #[test]
    fn known_tags_parse_and_print_consistently() {
        for name in [
            "hopeful",
            "grateful",
            "excited",
            "nostalgic",
            "dreamy",
            "happy",
            "sad",
        ] {
            assert_eq!(Mood::parse(name).as_str(), name);
        }
        for name in ["blue", "pink", "green", "orange", "purple"] {
            assert_eq!(CapsuleColor::parse(name).as_str(), name);
        }
    }

    #[test]
    fn every_mood_has_an_emoji() {
        for mood in [
            Mood::Hopeful,
            Mood::Grateful,
            Mood::Excited,
            Mood::Nostalgic,
            Mood::Dreamy,
            Mood::Happy,
            Mood::Sad,
        ] {
            assert!(!mood.emoji().is_empty());
        }
    }
}
