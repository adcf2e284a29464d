//! # Show Data
//!
//! Serde model of the program handed to the engine. Only track URLs drive
//! playback; everything else is kept so hosts can read it back through
//! [`GaplessEngine::current_track`](crate::GaplessEngine::current_track).

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};

/// One recorded program: an ordered list of tracks plus optional metadata.
///
/// ```rust
/// use core_playback::ShowData;
///
/// let show = ShowData::from_json(r#"{
///     "date": "1977-05-08",
///     "venue": "Barton Hall",
///     "tracks": [
///         { "title": "Minglewood Blues", "mp3": "https://example.org/d1t01.mp3" },
///         { "title": "Loser", "url": "https://example.org/d1t02.mp3" }
///     ]
/// }"#).unwrap();
///
/// assert_eq!(show.urls().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowData {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    pub tracks: Vec<TrackDescriptor>,
}

/// A playable track and whatever metadata came with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Location of the compressed audio.
    #[serde(rename = "mp3", alias = "url")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TrackDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl ShowData {
    pub fn new(tracks: Vec<TrackDescriptor>) -> Self {
        Self {
            date: None,
            venue: None,
            tracks,
        }
    }

    /// Parse a show from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidConfig`] for malformed input or a
    /// track without a URL.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PlaybackError::InvalidConfig(format!("invalid show data: {}", e)))
    }

    /// Track URLs in play order.
    pub fn urls(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.url.clone()).collect()
    }
}
