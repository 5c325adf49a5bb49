//! Area selection.
//!
//! A rectangle drawn on empty board space selects every card whose
//! footprint it overlaps. The gesture only produces an action once the
//! pointer actually moved, so a plain click on the board does not select
//! anything.

use crate::action::CardAction;
use crate::card::CardId;
use crate::geometry::{box_intersects, normalize_rect};
use crate::state::CardsState;
use kurbo::{Point, Rect, Vec2};
use log::debug;

/// Ids of every card whose footprint overlaps `rect`, in z-order.
pub fn cards_in_rect(state: &CardsState, rect: Rect) -> Vec<CardId> {
    state
        .cards
        .iter()
        .filter(|card| box_intersects(rect, card.footprint(&state.config)))
        .map(|card| card.id)
        .collect()
}

/// Rectangle spanned by two touch points.
pub fn rect_from_touches(a: Point, b: Point) -> Rect {
    normalize_rect(a, b - a)
}

/// An in-progress rectangle selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaSelection {
    /// Board point where the pointer went down.
    pub start: Point,
    /// Signed extent from `start` to the pointer.
    pub size: Vec2,
    drew_rect: bool,
}

impl AreaSelection {
    /// Start a selection at the pointer-down point.
    pub fn begin(start: Point) -> Self {
        Self {
            start,
            size: Vec2::ZERO,
            drew_rect: false,
        }
    }

    /// Follow the pointer.
    pub fn update(&mut self, pointer: Point) {
        self.size = pointer - self.start;
        self.drew_rect = true;
    }

    /// Whether the pointer moved since the selection began.
    pub fn drew_rect(&self) -> bool {
        self.drew_rect
    }

    /// The selection rectangle with positive extents.
    pub fn rect(&self) -> Rect {
        normalize_rect(self.start, self.size)
    }

    /// Release the pointer and produce the selection action, if any.
    pub fn finish(self, state: &CardsState) -> Option<CardAction> {
        if !self.drew_rect {
            return None;
        }
        let ids = cards_in_rect(state, self.rect());
        debug!("area selection over {:?} caught {} card(s)", self.rect(), ids.len());
        Some(CardAction::SelectMultipleCards { ids })
    }
}
