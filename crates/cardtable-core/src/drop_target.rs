//! Drop-target resolution during a drag.

use crate::card::{CardEntity, CardId};
use crate::geometry::distance;
use crate::peer::PeerId;
use serde::{Deserialize, Serialize};

/// Live drop target of one peer's drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTarget {
    /// Peer performing the drag.
    pub peer: PeerId,
    /// Card under that peer's pointer.
    pub primary: CardId,
    /// Card the group would merge onto.
    pub card: CardId,
}

/// Find the card the dragged group would merge onto if released now.
///
/// `primary` is the card under the pointer and `moving` is the whole
/// dragged group. Every other card whose anchor lies strictly within
/// `max_distance` of the primary card's anchor is a candidate. The nearest
/// wins; equal distances resolve to the card that comes first in z-order.
pub fn resolve_drop_target(
    cards: &[CardEntity],
    primary: CardId,
    moving: &[CardId],
    max_distance: f64,
) -> Option<CardId> {
    let anchor = cards.iter().find(|card| card.id == primary)?.anchor();

    let mut candidates: Vec<(f64, CardId)> = cards
        .iter()
        .filter(|card| card.id != primary && !moving.contains(&card.id))
        .map(|card| (distance(card.anchor(), anchor), card.id))
        .filter(|(d, _)| *d < max_distance)
        .collect();

    // Stable, so ties keep z-order.
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
    candidates.first().map(|&(_, id)| id)
}
