//! Board mutations.
//!
//! Each variant is one atomic transition of [`CardsState`](crate::state::CardsState).
//! On the wire an action is a `(type, payload)` pair, so peers can route on the
//! kind without understanding the payload.

use crate::card::{CardEntity, CardId};
use crate::replication::ActionKind;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// A mutation of the card board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum CardAction {
    /// Toggle the selection of one card.
    SelectCard(CardId),
    /// Toggle exhaustion of a card and of the whole current selection.
    ExhaustCard(CardId),
    /// Turn every selected card over.
    FlipCards,
    /// Begin dragging a card, optionally peeling its top card off the stack.
    #[serde(rename_all = "camelCase")]
    StartCardMove { id: CardId, split_top_card: bool },
    /// Translate the dragged group by a delta.
    CardMove { id: CardId, dx: f64, dy: f64 },
    /// Release the drag, merging onto the drop target if there is one.
    EndCardMove(CardId),
    /// Add cards to the selection.
    SelectMultipleCards { ids: Vec<CardId> },
    UnselectAllCards,
    HoverCard(CardId),
    HoverLeaveCard,
    TogglePanMode,
    ToggleMultiselectMode,
    /// Remove every selected stack from the board.
    DeleteCardStack,
    /// Reorder a stack. `order` lists every card of the stack, top first.
    ShuffleStack { id: CardId, order: Vec<CardId> },
    /// Peel the top `count` cards off a stack into a new stack beside it.
    DrawCardsOutOfCardStack { id: CardId, count: usize },
}

impl CardAction {
    /// Classification key used by the replication filter.
    pub fn kind(&self) -> ActionKind {
        match self {
            CardAction::SelectCard(_) => ActionKind::SelectCard,
            CardAction::ExhaustCard(_) => ActionKind::ExhaustCard,
            CardAction::FlipCards => ActionKind::FlipCards,
            CardAction::StartCardMove { .. } => ActionKind::StartCardMove,
            CardAction::CardMove { .. } => ActionKind::CardMove,
            CardAction::EndCardMove(_) => ActionKind::EndCardMove,
            CardAction::SelectMultipleCards { .. } => ActionKind::SelectMultipleCards,
            CardAction::UnselectAllCards => ActionKind::UnselectAllCards,
            CardAction::HoverCard(_) => ActionKind::HoverCard,
            CardAction::HoverLeaveCard => ActionKind::HoverLeaveCard,
            CardAction::TogglePanMode => ActionKind::TogglePanMode,
            CardAction::ToggleMultiselectMode => ActionKind::ToggleMultiselectMode,
            CardAction::DeleteCardStack => ActionKind::DeleteCardStack,
            CardAction::ShuffleStack { .. } => ActionKind::ShuffleStack,
            CardAction::DrawCardsOutOfCardStack { .. } => ActionKind::DrawCardsOutOfCardStack,
        }
    }

    /// Shuffle `stack` with the dispatching peer's randomness.
    ///
    /// The resulting order is carried in the action, so applying it is
    /// deterministic on every peer.
    pub fn shuffle_stack<R: Rng + ?Sized>(stack: &CardEntity, rng: &mut R) -> Self {
        let mut order = stack.stack_ids();
        order.shuffle(rng);
        CardAction::ShuffleStack {
            id: stack.id,
            order,
        }
    }
}
