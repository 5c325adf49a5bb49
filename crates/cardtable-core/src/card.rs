//! Card entities and stack entries.

use crate::config::BoardConfig;
use crate::geometry::card_footprint;
use crate::peer::PeerId;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Identity of one physical card.
pub type CardId = u32;

/// Catalog reference. Several physical copies may share one.
pub type JsonId = String;

/// Identity of a card that lies beneath the visible card of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardDetails {
    pub id: CardId,
    pub json_id: JsonId,
}

impl CardDetails {
    pub fn new(id: CardId, json_id: impl Into<JsonId>) -> Self {
        Self {
            id,
            json_id: json_id.into(),
        }
    }
}

/// A card or the visible head of a stack.
///
/// The entity's own `id`/`json_id` always describe the top card. The cards
/// beneath it live in `card_stack`, index 0 being directly under the top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardEntity {
    pub id: CardId,
    pub json_id: JsonId,
    /// Center of the card on the board.
    pub position: Point,
    pub selected: bool,
    /// Peer holding the selection, if any.
    #[serde(default)]
    pub controlled_by: Option<PeerId>,
    pub dragging: bool,
    /// Rotated 90 degrees.
    pub exhausted: bool,
    pub faceup: bool,
    #[serde(default)]
    pub card_stack: Vec<CardDetails>,
}

impl CardEntity {
    /// Create a single face-up card at the given position.
    pub fn new(id: CardId, json_id: impl Into<JsonId>, position: Point) -> Self {
        Self {
            id,
            json_id: json_id.into(),
            position,
            selected: false,
            controlled_by: None,
            dragging: false,
            exhausted: false,
            faceup: true,
            card_stack: Vec::new(),
        }
    }

    /// Builder-style helper to place cards beneath this one.
    pub fn with_stack(mut self, card_stack: Vec<CardDetails>) -> Self {
        self.card_stack = card_stack;
        self
    }

    /// Builder-style helper to set the face.
    pub fn with_faceup(mut self, faceup: bool) -> Self {
        self.faceup = faceup;
        self
    }

    /// Identity of the visible card.
    pub fn details(&self) -> CardDetails {
        CardDetails::new(self.id, self.json_id.clone())
    }

    /// Number of physical cards this entity represents.
    pub fn stack_size(&self) -> usize {
        1 + self.card_stack.len()
    }

    /// Every card of the stack, top first.
    pub fn stack_details(&self) -> Vec<CardDetails> {
        std::iter::once(self.details())
            .chain(self.card_stack.iter().cloned())
            .collect()
    }

    /// Ids of every card of the stack, top first.
    pub fn stack_ids(&self) -> Vec<CardId> {
        std::iter::once(self.id)
            .chain(self.card_stack.iter().map(|card| card.id))
            .collect()
    }

    /// Replace the whole stack, top first. An empty list is ignored.
    pub(crate) fn restack(&mut self, mut cards: Vec<CardDetails>) {
        if cards.is_empty() {
            return;
        }
        let top = cards.remove(0);
        self.id = top.id;
        self.json_id = top.json_id;
        self.card_stack = cards;
    }

    /// Point used for center-to-center distance checks.
    pub fn anchor(&self) -> Point {
        self.position
    }

    /// Board footprint used for area selection.
    pub fn footprint(&self, config: &BoardConfig) -> Rect {
        card_footprint(self.position, config)
    }

    /// Whether `peer` currently holds this card in its selection.
    pub fn is_selected_by(&self, peer: &PeerId) -> bool {
        self.selected && self.controlled_by.as_ref() == Some(peer)
    }

    pub(crate) fn select_for(&mut self, peer: PeerId) {
        self.selected = true;
        self.controlled_by = Some(peer);
    }

    pub(crate) fn deselect(&mut self) {
        self.selected = false;
        self.controlled_by = None;
    }

    pub(crate) fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }
}
