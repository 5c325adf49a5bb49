//! Multiplayer session bookkeeping.
//!
//! A [`Session`] owns the local board and sits between the input adapter and
//! the transport. Local actions are applied immediately and, when the
//! replication filter allows it, queued as outgoing messages. Messages from
//! peers are applied under the sender's identity.
//!
//! Peers apply each other's streams in arrival order. Two peers dragging the
//! same stack at once therefore resolve by whichever message lands last;
//! nothing here reconciles divergent interleavings.

use crate::action::CardAction;
use crate::peer::PeerId;
use crate::replication::{PeerMessage, ReplicationError, ReplicationResult};
use crate::state::CardsState;
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Smallest positive player number not already taken.
///
/// Numbers start at 1. With no gap the next number after the highest
/// contiguous one is returned.
pub fn missing_player_number(assigned: &[u32]) -> u32 {
    let mut sorted = assigned.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut expected = 1;
    for number in sorted {
        if number == expected {
            expected += 1;
        } else if number > expected {
            break;
        }
    }
    expected
}

/// Player numbers handed out to the peers of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerSlots {
    slots: BTreeMap<PeerId, u32>,
}

impl PlayerSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `peer` the smallest free number. A peer that already has a
    /// number keeps it.
    pub fn assign(&mut self, peer: PeerId) -> u32 {
        if let Some(&number) = self.slots.get(&peer) {
            return number;
        }
        let taken: Vec<u32> = self.slots.values().copied().collect();
        let number = missing_player_number(&taken);
        self.slots.insert(peer, number);
        number
    }

    /// Free the number held by `peer`.
    pub fn release(&mut self, peer: &PeerId) -> Option<u32> {
        self.slots.remove(peer)
    }

    pub fn get(&self, peer: &PeerId) -> Option<u32> {
        self.slots.get(peer).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// The local end of a multiplayer game.
pub struct Session {
    peer_id: PeerId,
    state: CardsState,
    players: PlayerSlots,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
}

impl Session {
    /// Create a session for the local peer around an initial board.
    pub fn new(peer_id: PeerId, state: CardsState) -> Self {
        let mut players = PlayerSlots::new();
        players.assign(peer_id);
        Self {
            peer_id,
            state,
            players,
            outgoing: Vec::new(),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn state(&self) -> &CardsState {
        &self.state
    }

    pub fn players(&self) -> &PlayerSlots {
        &self.players
    }

    /// Apply a local action and queue it for peers if it is shared.
    pub fn dispatch(&mut self, action: CardAction) -> ReplicationResult<()> {
        self.state.apply(self.peer_id, &action)?;

        let kind = action.kind();
        if kind.should_replicate() {
            let message = PeerMessage::Action {
                from: self.peer_id,
                action,
            };
            self.outgoing.push(message.to_json()?);
        } else {
            debug!("dispatch: {kind} kept local");
        }
        Ok(())
    }

    /// Apply a message received from a peer.
    pub fn receive(&mut self, json: &str) -> ReplicationResult<()> {
        match PeerMessage::from_json(json)? {
            PeerMessage::Action { from, .. } if from == self.peer_id => {
                debug!("receive: ignoring echo of own action");
            }
            PeerMessage::Action { from, action } => {
                let kind = action.kind();
                if kind.is_local_only() {
                    warn!("receive: peer {from} sent local-only action {kind}");
                    return Err(ReplicationError::LocalOnlyAction { from, kind });
                }
                self.state.apply(from, &action)?;
            }
            PeerMessage::RequestResync { from } => {
                if from != self.peer_id {
                    info!("receive: sending board to {from}");
                    self.players.assign(from);
                    let reply = PeerMessage::Resync {
                        from: self.peer_id,
                        to: from,
                        state: self.state.clone(),
                    };
                    self.outgoing.push(reply.to_json()?);
                }
            }
            PeerMessage::Resync { from, to, state } => {
                if to == self.peer_id {
                    info!("receive: adopting board from {from}");
                    self.players.assign(from);
                    self.state.adopt_remote(state);
                }
            }
        }
        Ok(())
    }

    /// Ask peers for the full board, after joining or on suspected drift.
    pub fn request_resync(&mut self) -> ReplicationResult<()> {
        let message = PeerMessage::RequestResync { from: self.peer_id };
        self.outgoing.push(message.to_json()?);
        Ok(())
    }

    /// Record a newly connected peer and return its player number.
    pub fn peer_joined(&mut self, peer: PeerId) -> u32 {
        let number = self.players.assign(peer);
        info!("peer {peer} joined as player {number}");
        number
    }

    /// Forget a disconnected peer. Any drag it left open is ended where it
    /// stood, without merging.
    pub fn peer_left(&mut self, peer: &PeerId) {
        if let Some(number) = self.players.release(peer) {
            info!("peer {peer} (player {number}) left");
        }
        self.state.release_peer(peer);
    }

    /// Drain pending outgoing messages.
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardDetails, CardEntity};
    use crate::replication::ActionKind;
    use kurbo::Point;

    const ALICE: PeerId = PeerId::from_u128(1);
    const BOB: PeerId = PeerId::from_u128(2);
    const CAROL: PeerId = PeerId::from_u128(3);

    fn board() -> CardsState {
        CardsState::with_cards(vec![
            CardEntity::new(1, "01001a", Point::new(0.0, 0.0)),
            CardEntity::new(2, "01002", Point::new(200.0, 0.0)),
            CardEntity::new(3, "01003", Point::new(400.0, 0.0))
                .with_stack(vec![CardDetails::new(4, "01004")]),
        ])
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn pump(from: &mut Session, to: &mut Session) {
        for message in from.take_outgoing() {
            to.receive(&message).unwrap();
        }
    }

    #[test]
    fn test_missing_player_number() {
        assert_eq!(missing_player_number(&[]), 1);
        assert_eq!(missing_player_number(&[1, 2, 3]), 4);
        assert_eq!(missing_player_number(&[1, 3]), 2);
        assert_eq!(missing_player_number(&[3, 1, 4]), 2);
        assert_eq!(missing_player_number(&[2, 3]), 1);
    }

    #[test]
    fn test_missing_player_number_sorts_numerically() {
        // A lexicographic sort would put 10 before 2.
        assert_eq!(missing_player_number(&[10, 1, 2]), 3);
        assert_eq!(missing_player_number(&[1, 1, 2]), 3);
    }

    #[test]
    fn test_player_slots_reuse_gaps() {
        let mut slots = PlayerSlots::new();
        assert_eq!(slots.assign(ALICE), 1);
        assert_eq!(slots.assign(BOB), 2);
        assert_eq!(slots.assign(ALICE), 1);
        assert_eq!(slots.release(&ALICE), Some(1));
        assert_eq!(slots.assign(CAROL), 1);
        assert_eq!(slots.get(&BOB), Some(2));
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn test_local_only_actions_are_not_queued() {
        let mut session = Session::new(ALICE, board());
        session.dispatch(CardAction::HoverCard(1)).unwrap();
        session.dispatch(CardAction::TogglePanMode).unwrap();
        session.dispatch(CardAction::ToggleMultiselectMode).unwrap();
        assert!(session.take_outgoing().is_empty());
        assert_eq!(session.state().preview_card, Some(1));
        assert!(session.state().pan_mode);
    }

    #[test]
    fn test_shared_actions_are_queued() {
        let mut session = Session::new(ALICE, board());
        session.dispatch(CardAction::ExhaustCard(2)).unwrap();
        session
            .dispatch(CardAction::CardMove { id: 2, dx: 1.0, dy: 1.0 })
            .unwrap();
        let outgoing = session.take_outgoing();
        assert_eq!(outgoing.len(), 2);
        for json in &outgoing {
            match PeerMessage::from_json(json).unwrap() {
                PeerMessage::Action { from, action } => {
                    assert_eq!(from, ALICE);
                    assert!(action.kind().should_replicate());
                }
                other => panic!("unexpected message {other:?}"),
            }
        }
        assert!(session.take_outgoing().is_empty());
    }

    #[test]
    fn test_failed_action_is_not_queued() {
        let mut session = Session::new(ALICE, board());
        let err = session
            .dispatch(CardAction::StartCardMove { id: 99, split_top_card: true })
            .unwrap_err();
        assert!(matches!(err, ReplicationError::Cards(_)));
        assert!(session.take_outgoing().is_empty());
    }

    #[test]
    fn test_two_peers_converge_on_shared_state() {
        init_logging();
        let mut alice = Session::new(ALICE, board());
        let mut bob = Session::new(BOB, board());

        alice.dispatch(CardAction::HoverCard(1)).unwrap();
        alice
            .dispatch(CardAction::StartCardMove { id: 1, split_top_card: false })
            .unwrap();
        alice
            .dispatch(CardAction::CardMove { id: 1, dx: 195.0, dy: 2.0 })
            .unwrap();
        alice.dispatch(CardAction::EndCardMove(1)).unwrap();
        pump(&mut alice, &mut bob);

        bob.dispatch(CardAction::SelectCard(3)).unwrap();
        bob.dispatch(CardAction::StartCardMove { id: 3, split_top_card: true })
            .unwrap();
        bob.dispatch(CardAction::ExhaustCard(3)).unwrap();
        pump(&mut bob, &mut alice);

        assert_eq!(alice.state().cards, bob.state().cards);
        assert_eq!(alice.state().physical_card_count(), 4);
        assert_eq!(alice.state().preview_card, Some(1));
        assert_eq!(bob.state().preview_card, None);
    }

    #[test]
    fn test_remote_local_only_action_rejected() {
        init_logging();
        let mut session = Session::new(ALICE, board());
        let json = PeerMessage::Action {
            from: BOB,
            action: CardAction::TogglePanMode,
        }
        .to_json()
        .unwrap();
        let err = session.receive(&json).unwrap_err();
        match err {
            ReplicationError::LocalOnlyAction { from, kind } => {
                assert_eq!(from, BOB);
                assert_eq!(kind, ActionKind::TogglePanMode);
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(!session.state().pan_mode);
    }

    #[test]
    fn test_echo_is_ignored() {
        let mut session = Session::new(ALICE, board());
        session.dispatch(CardAction::ExhaustCard(1)).unwrap();
        let echoed = session.take_outgoing();
        for json in &echoed {
            session.receive(json).unwrap();
        }
        assert!(session.state().card(1).unwrap().exhausted);
    }

    #[test]
    fn test_resync_for_new_peer() {
        init_logging();
        let mut host = Session::new(ALICE, board());
        host.dispatch(CardAction::ExhaustCard(2)).unwrap();
        host.take_outgoing();

        let mut joiner = Session::new(BOB, CardsState::default());
        joiner.dispatch(CardAction::TogglePanMode).unwrap();
        joiner.request_resync().unwrap();
        pump(&mut joiner, &mut host);
        assert_eq!(host.players().get(&BOB), Some(2));

        let replies = host.take_outgoing();
        assert_eq!(replies.len(), 1);

        // A third peer sees the broadcast reply but it is not addressed to it.
        let mut bystander = Session::new(CAROL, CardsState::default());
        bystander.receive(&replies[0]).unwrap();
        assert!(bystander.state().cards.is_empty());

        joiner.receive(&replies[0]).unwrap();
        assert_eq!(joiner.state().cards, host.state().cards);
        assert!(joiner.state().card(2).unwrap().exhausted);
        assert!(joiner.state().pan_mode);
    }

    #[test]
    fn test_peer_left_ends_its_drag() {
        init_logging();
        let mut alice = Session::new(ALICE, board());
        let mut bob = Session::new(BOB, board());
        bob.dispatch(CardAction::StartCardMove { id: 1, split_top_card: false })
            .unwrap();
        bob.dispatch(CardAction::CardMove { id: 1, dx: 198.0, dy: 0.0 })
            .unwrap();
        assert_eq!(alice.peer_joined(BOB), 2);
        pump(&mut bob, &mut alice);
        assert_eq!(alice.state().drop_target_for(&BOB), Some(2));

        alice.peer_left(&BOB);
        let state = alice.state();
        assert!(state.ghost_cards.is_empty());
        assert!(state.drop_targets.is_empty());
        assert_eq!(state.cards.len(), 3);
        assert!(!state.card(1).unwrap().dragging);
        assert!(alice.players().get(&BOB).is_none());
    }

    #[test]
    fn test_actions_do_not_assign_player_slots() {
        let mut alice = Session::new(ALICE, board());
        let mut bob = Session::new(BOB, board());
        bob.dispatch(CardAction::ExhaustCard(2)).unwrap();
        pump(&mut bob, &mut alice);
        assert!(alice.players().get(&BOB).is_none());
        assert_eq!(alice.players().len(), 1);

        assert_eq!(alice.peer_joined(BOB), 2);
        alice.peer_left(&BOB);

        // Still in flight when the peer disconnected.
        bob.dispatch(CardAction::ExhaustCard(1)).unwrap();
        pump(&mut bob, &mut alice);
        assert!(alice.state().card(1).unwrap().exhausted);
        assert!(alice.players().get(&BOB).is_none());
        assert_eq!(alice.peer_joined(CAROL), 2);
    }

    #[test]
    fn test_shuffle_and_draw_converge() {
        use rand::SeedableRng;
        use rand_chacha::ChaCha8Rng;

        let mut alice = Session::new(ALICE, board());
        let mut bob = Session::new(BOB, board());
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let shuffle = CardAction::shuffle_stack(alice.state().card(3).unwrap(), &mut rng);
        alice.dispatch(shuffle).unwrap();
        pump(&mut alice, &mut bob);

        let top = alice.state().cards[2].id;
        alice
            .dispatch(CardAction::DrawCardsOutOfCardStack { id: top, count: 1 })
            .unwrap();
        pump(&mut alice, &mut bob);

        assert_eq!(alice.state().cards, bob.state().cards);
        assert_eq!(bob.state().cards.len(), 4);
        assert_eq!(bob.state().physical_card_count(), 4);
    }

    #[test]
    fn test_malformed_input() {
        let mut session = Session::new(ALICE, board());
        assert!(matches!(
            session.receive("{\"type\":\"nonsense\"}"),
            Err(ReplicationError::Malformed(_))
        ));
    }
}
