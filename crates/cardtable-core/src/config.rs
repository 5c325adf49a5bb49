//! Board configuration shared by every peer in a session.

use serde::{Deserialize, Serialize};

/// Distance under which a dragged card snaps onto another card.
pub const CARD_DROP_TARGET_DISTANCE: f64 = 30.0;
/// Card width in board units.
pub const CARD_WIDTH: f64 = 100.0;
/// Card height in board units.
pub const CARD_HEIGHT: f64 = 150.0;

/// Tunables that affect reducer outcomes.
///
/// These travel with the board state so that every peer resolves drop
/// targets and area selections against the same numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Maximum center-to-center distance for a drop target.
    pub drop_target_distance: f64,
    /// Width of a card footprint.
    pub card_width: f64,
    /// Height of a card footprint.
    pub card_height: f64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            drop_target_distance: CARD_DROP_TARGET_DISTANCE,
            card_width: CARD_WIDTH,
            card_height: CARD_HEIGHT,
        }
    }
}

impl BoardConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
