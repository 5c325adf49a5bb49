//! Card board state and its reducers.

use crate::action::CardAction;
use crate::card::{CardDetails, CardEntity, CardId};
use crate::config::BoardConfig;
use crate::drop_target::{DropTarget, resolve_drop_target};
use crate::peer::PeerId;
use kurbo::Vec2;
use log::{debug, error, trace, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store errors.
///
/// Missing ids are not errors; they come from stale input queues and are
/// ignored. Only broken internal invariants and payloads that cannot be
/// applied are reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardsError {
    #[error("Card {0} must exist to split its stack")]
    SplitCardMissing(CardId),
    #[error("Shuffle order for stack {0} is not a permutation of its cards")]
    ShuffleMismatch(CardId),
}

/// Result type for store operations.
pub type CardsResult<T> = Result<T, CardsError>;

/// The authoritative card board.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CardsState {
    /// Card entities in z-order (back to front).
    pub cards: Vec<CardEntity>,
    /// Stay-behind snapshots for in-progress drags. A snapshot keeps the
    /// `controlled_by` of the peer dragging it.
    #[serde(default)]
    pub ghost_cards: Vec<CardEntity>,
    #[serde(default)]
    pub preview_card: Option<CardId>,
    /// At most one entry per dragging peer.
    #[serde(default)]
    pub drop_targets: Vec<DropTarget>,
    /// Drag gestures pan the camera instead of moving cards.
    #[serde(default)]
    pub pan_mode: bool,
    /// Clicks add to the selection instead of replacing it.
    #[serde(default)]
    pub multiselect_mode: bool,
    #[serde(default)]
    pub config: BoardConfig,
}

fn in_move_group(card: &CardEntity, id: CardId, actor: &PeerId) -> bool {
    card.id == id || card.is_selected_by(actor)
}

impl CardsState {
    /// Create an empty board.
    pub fn new(config: BoardConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Create a board from already placed cards.
    pub fn with_cards(cards: Vec<CardEntity>) -> Self {
        Self {
            cards,
            ..Self::default()
        }
    }

    /// Place a card on top of the board.
    pub fn add_card(&mut self, card: CardEntity) {
        self.cards.push(card);
    }

    pub fn card(&self, id: CardId) -> Option<&CardEntity> {
        self.cards.iter().find(|card| card.id == id)
    }

    pub fn card_mut(&mut self, id: CardId) -> Option<&mut CardEntity> {
        self.cards.iter_mut().find(|card| card.id == id)
    }

    fn index_of(&self, id: CardId) -> Option<usize> {
        self.cards.iter().position(|card| card.id == id)
    }

    /// Ids of the cards `peer` has selected, in z-order.
    pub fn selected_ids(&self, peer: &PeerId) -> Vec<CardId> {
        self.cards
            .iter()
            .filter(|card| card.is_selected_by(peer))
            .map(|card| card.id)
            .collect()
    }

    /// Card `peer`'s current drag would merge onto.
    pub fn drop_target_for(&self, peer: &PeerId) -> Option<CardId> {
        self.drop_targets
            .iter()
            .find(|entry| entry.peer == *peer)
            .map(|entry| entry.card)
    }

    /// Ghost snapshots left by `peer`'s current drag.
    pub fn ghosts_of<'a>(&'a self, peer: &'a PeerId) -> impl Iterator<Item = &'a CardEntity> {
        self.ghost_cards
            .iter()
            .filter(move |ghost| ghost.controlled_by.as_ref() == Some(peer))
    }

    fn take_drop_target(&mut self, peer: &PeerId) -> Option<DropTarget> {
        let index = self.drop_targets.iter().position(|entry| entry.peer == *peer)?;
        Some(self.drop_targets.remove(index))
    }

    fn clear_drag(&mut self, peer: &PeerId) {
        self.ghost_cards
            .retain(|ghost| ghost.controlled_by.as_ref() != Some(peer));
        self.drop_targets.retain(|entry| entry.peer != *peer);
    }

    /// Follow a stack whose visible card changed from `from` to `to`.
    fn rename_references(&mut self, from: CardId, to: CardId) {
        if from == to {
            return;
        }
        if self.preview_card == Some(from) {
            self.preview_card = Some(to);
        }
        for entry in self.drop_targets.iter_mut().filter(|entry| entry.card == from) {
            entry.card = to;
        }
    }

    fn forget_stale_preview(&mut self) {
        if let Some(preview) = self.preview_card {
            if self.card(preview).is_none() {
                self.preview_card = None;
            }
        }
    }

    /// Total number of physical cards on the board, stacks included.
    pub fn physical_card_count(&self) -> usize {
        self.cards.iter().map(CardEntity::stack_size).sum()
    }

    /// Apply one action on behalf of `actor` as a single transition.
    pub fn apply(&mut self, actor: PeerId, action: &CardAction) -> CardsResult<()> {
        match action {
            CardAction::SelectCard(id) => self.select_card(actor, *id),
            CardAction::ExhaustCard(id) => self.exhaust_card(actor, *id),
            CardAction::FlipCards => self.flip_cards(actor),
            CardAction::StartCardMove { id, split_top_card } => {
                self.start_card_move(actor, *id, *split_top_card)?
            }
            CardAction::CardMove { id, dx, dy } => self.card_move(actor, *id, Vec2::new(*dx, *dy)),
            CardAction::EndCardMove(id) => self.end_card_move(actor, *id),
            CardAction::SelectMultipleCards { ids } => self.select_multiple_cards(actor, ids),
            CardAction::UnselectAllCards => self.unselect_all_cards(actor),
            CardAction::HoverCard(id) => self.hover_card(*id),
            CardAction::HoverLeaveCard => self.hover_leave_card(),
            CardAction::TogglePanMode => self.pan_mode = !self.pan_mode,
            CardAction::ToggleMultiselectMode => self.multiselect_mode = !self.multiselect_mode,
            CardAction::DeleteCardStack => self.delete_card_stack(actor),
            CardAction::ShuffleStack { id, order } => self.shuffle_stack(*id, order)?,
            CardAction::DrawCardsOutOfCardStack { id, count } => {
                self.draw_cards_out_of_card_stack(*id, *count)
            }
        }
        Ok(())
    }

    /// Toggle selection of a card. A card held by another peer is claimed.
    pub fn select_card(&mut self, actor: PeerId, id: CardId) {
        let Some(card) = self.card_mut(id) else {
            trace!("select_card: no card {id}");
            return;
        };
        if card.is_selected_by(&actor) {
            card.deselect();
        } else {
            card.select_for(actor);
        }
    }

    /// Toggle exhaustion of `id` and every card `actor` has selected.
    pub fn exhaust_card(&mut self, actor: PeerId, id: CardId) {
        self.cards
            .iter_mut()
            .filter(|card| in_move_group(card, id, &actor))
            .for_each(|card| card.exhausted = !card.exhausted);
    }

    /// Turn over every card `actor` has selected.
    pub fn flip_cards(&mut self, actor: PeerId) {
        self.cards
            .iter_mut()
            .filter(|card| card.is_selected_by(&actor))
            .for_each(|card| card.faceup = !card.faceup);
    }

    /// Begin a drag.
    ///
    /// Dragging an unselected card replaces the selection with that card.
    /// With `split_top_card`, the dragged entity keeps only its visible card
    /// and the rest of its stack stays behind as a new entity headed by the
    /// card that was directly underneath.
    pub fn start_card_move(
        &mut self,
        actor: PeerId,
        id: CardId,
        split_top_card: bool,
    ) -> CardsResult<()> {
        let index = self.index_of(id);
        if split_top_card && index.is_none() {
            error!("start_card_move: split requested for missing card {id}");
            return Err(CardsError::SplitCardMissing(id));
        }

        if let Some(index) = index {
            if !self.cards[index].is_selected_by(&actor) {
                for card in &mut self.cards {
                    if card.id == id {
                        card.select_for(actor);
                    } else if card.is_selected_by(&actor) {
                        card.deselect();
                    }
                }
            }
        }

        let split = match index {
            Some(index) if split_top_card => self.split_stack(index),
            _ => false,
        };

        self.clear_drag(&actor);
        if !split {
            for card in self.cards.iter_mut().filter(|card| card.is_selected_by(&actor)) {
                card.dragging = true;
                self.ghost_cards.push(card.clone());
            }
        }
        Ok(())
    }

    /// Peel the visible card at `index` off its stack. Returns whether a
    /// split happened.
    fn split_stack(&mut self, index: usize) -> bool {
        let card = &mut self.cards[index];
        if card.card_stack.is_empty() {
            debug!("split_stack: card {} has nothing beneath it", card.id);
            return false;
        }

        let mut remainder = std::mem::take(&mut card.card_stack);
        let beneath = remainder.remove(0);
        let mut left_behind = card.clone();
        left_behind.id = beneath.id;
        left_behind.json_id = beneath.json_id;
        left_behind.card_stack = remainder;
        left_behind.dragging = false;
        left_behind.deselect();

        debug!(
            "split_stack: card {} leaves stack headed by {}",
            card.id, left_behind.id
        );
        self.cards.push(left_behind);
        true
    }

    /// Translate the dragged group and track the nearest drop target.
    pub fn card_move(&mut self, actor: PeerId, id: CardId, delta: Vec2) {
        let mut moved = Vec::new();
        for card in self
            .cards
            .iter_mut()
            .filter(|card| in_move_group(card, id, &actor))
        {
            card.translate(delta);
            moved.push(card.id);
        }

        let target = resolve_drop_target(
            &self.cards,
            id,
            &moved,
            self.config.drop_target_distance,
        );
        let previous = self.take_drop_target(&actor).map(|entry| entry.card);
        if target != previous {
            trace!("card_move: drop target of {actor} {previous:?} -> {target:?}");
        }
        if let Some(card) = target {
            self.drop_targets.push(DropTarget {
                peer: actor,
                primary: id,
                card,
            });
        }

        self.raise_to_top(&moved);
    }

    /// Move the given cards to the top of the z-order, keeping their
    /// relative order.
    pub fn raise_to_top(&mut self, ids: &[CardId]) {
        if ids.is_empty() {
            return;
        }
        let (mut raised, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.cards)
            .into_iter()
            .partition(|card| ids.contains(&card.id));
        self.cards = rest;
        self.cards.append(&mut raised);
    }

    /// Finish a drag, merging the dragged group onto the drop target.
    ///
    /// Only the target recorded by this peer's drag of `id` is used. Other
    /// peers' drags are left untouched.
    pub fn end_card_move(&mut self, actor: PeerId, id: CardId) {
        for card in self
            .cards
            .iter_mut()
            .filter(|card| in_move_group(card, id, &actor))
        {
            card.dragging = false;
        }

        match self.take_drop_target(&actor) {
            Some(entry) if entry.primary == id => self.merge_onto(actor, id, entry.card),
            Some(entry) => debug!(
                "end_card_move: target of {actor} was recorded for card {}, not {id}",
                entry.primary
            ),
            None => {}
        }

        self.clear_drag(&actor);
    }

    fn merge_onto(&mut self, actor: PeerId, id: CardId, target_id: CardId) {
        match self.card(target_id) {
            Some(target) if !in_move_group(target, id, &actor) => {}
            _ => {
                warn!("merge_onto: drop target {target_id} is gone, leaving cards in place");
                return;
            }
        }

        let mut moved_ids = Vec::new();
        let mut incoming: Vec<CardDetails> = Vec::new();
        for card in self
            .cards
            .iter()
            .filter(|card| in_move_group(card, id, &actor))
        {
            moved_ids.push(card.id);
            incoming.push(card.details());
            incoming.extend(card.card_stack.iter().cloned());
        }
        if incoming.is_empty() {
            return;
        }

        self.cards.retain(|card| !moved_ids.contains(&card.id));

        let Some(target) = self.card_mut(target_id) else {
            return;
        };
        incoming.extend(target.stack_details());
        target.restack(incoming);
        let (new_id, depth) = (target.id, target.stack_size());

        debug!(
            "merge_onto: {} card(s) dropped onto {target_id}, stack now {depth} deep",
            moved_ids.len()
        );
        self.rename_references(target_id, new_id);
        self.forget_stale_preview();
    }

    /// Add cards to `actor`'s selection without clearing anything.
    pub fn select_multiple_cards(&mut self, actor: PeerId, ids: &[CardId]) {
        for &id in ids {
            match self.card_mut(id) {
                Some(card) => card.select_for(actor),
                None => trace!("select_multiple_cards: no card {id}"),
            }
        }
    }

    /// Clear `actor`'s selection.
    pub fn unselect_all_cards(&mut self, actor: PeerId) {
        self.cards
            .iter_mut()
            .filter(|card| card.is_selected_by(&actor))
            .for_each(CardEntity::deselect);
    }

    /// Preview a card. Face-down cards cannot be previewed.
    pub fn hover_card(&mut self, id: CardId) {
        if self.card(id).is_some_and(|card| card.faceup) {
            self.preview_card = Some(id);
        }
    }

    pub fn hover_leave_card(&mut self) {
        self.preview_card = None;
    }

    /// Remove every stack `actor` has selected.
    pub fn delete_card_stack(&mut self, actor: PeerId) {
        let before = self.cards.len();
        self.cards.retain(|card| !card.is_selected_by(&actor));
        if self.cards.len() != before {
            debug!("delete_card_stack: removed {} stack(s)", before - self.cards.len());
        }
        self.forget_stale_preview();
    }

    /// Reorder the cards of stack `id`. `order` lists every card of the
    /// stack exactly once, top first.
    ///
    /// The permutation travels in the action so every peer reaches the same
    /// order.
    pub fn shuffle_stack(&mut self, id: CardId, order: &[CardId]) -> CardsResult<()> {
        let Some(card) = self.card_mut(id) else {
            trace!("shuffle_stack: no card {id}");
            return Ok(());
        };

        let mut expected = card.stack_ids();
        let mut given = order.to_vec();
        expected.sort_unstable();
        given.sort_unstable();
        if expected != given {
            warn!("shuffle_stack: order {order:?} does not match stack {id}");
            return Err(CardsError::ShuffleMismatch(id));
        }

        let mut remaining = card.stack_details();
        let mut shuffled = Vec::with_capacity(remaining.len());
        for card_id in order {
            if let Some(index) = remaining.iter().position(|details| details.id == *card_id) {
                shuffled.push(remaining.swap_remove(index));
            }
        }
        card.restack(shuffled);
        let new_id = card.id;

        debug!("shuffle_stack: stack {id} now headed by {new_id}");
        self.rename_references(id, new_id);
        Ok(())
    }

    /// Peel the top `count` cards of stack `id` into a new stack placed one
    /// card width to the right.
    ///
    /// At least one card always stays behind, so drawing from a single card
    /// does nothing. The drawn stack keeps the top card's id and sits on top
    /// of the z-order.
    pub fn draw_cards_out_of_card_stack(&mut self, id: CardId, count: usize) {
        let offset = Vec2::new(self.config.card_width, 0.0);
        let Some(source) = self.card_mut(id) else {
            trace!("draw_cards_out_of_card_stack: no card {id}");
            return;
        };
        let count = count.min(source.stack_size() - 1);
        if count == 0 {
            debug!("draw_cards_out_of_card_stack: nothing to draw from {id}");
            return;
        }

        let mut drawn = source.stack_details();
        let remaining = drawn.split_off(count);
        source.restack(remaining);

        let mut drawn_stack = source.clone();
        drawn_stack.restack(drawn);
        drawn_stack.translate(offset);
        drawn_stack.exhausted = false;
        drawn_stack.dragging = false;
        drawn_stack.deselect();

        debug!(
            "draw_cards_out_of_card_stack: {count} card(s) from {id}, {} left under {}",
            source.stack_size(),
            source.id
        );
        self.cards.push(drawn_stack);
    }

    /// End any drag `peer` left unfinished, committing the positions it
    /// reached without merging, and release its selection.
    pub fn release_peer(&mut self, peer: &PeerId) {
        let mut abandoned = false;
        for card in self
            .cards
            .iter_mut()
            .filter(|card| card.controlled_by.as_ref() == Some(peer))
        {
            abandoned |= card.dragging;
            card.dragging = false;
            card.deselect();
        }
        if abandoned {
            debug!("release_peer: abandoned drag by {peer}");
        }
        self.clear_drag(peer);
    }

    /// Replace the shared board with a remote copy while keeping this
    /// peer's local view state.
    pub fn adopt_remote(&mut self, remote: CardsState) {
        let preview_card = self.preview_card;
        let pan_mode = self.pan_mode;
        let multiselect_mode = self.multiselect_mode;
        *self = remote;
        self.pan_mode = pan_mode;
        self.multiselect_mode = multiselect_mode;
        self.preview_card = preview_card.filter(|&id| self.card(id).is_some());
    }

    /// Serialize the board to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a board from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
