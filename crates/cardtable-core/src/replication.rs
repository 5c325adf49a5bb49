//! Replication filter and peer wire protocol.
//!
//! Every action the application dispatches is classified here as either a
//! shared game fact, which is broadcast to peers, or local-only interaction
//! state, which is not. The table is a block-list: any kind not marked
//! local-only is replicated. This fails open, so a forgotten entry shows up
//! as over-sharing rather than as peers silently drifting apart.

use crate::action::CardAction;
use crate::peer::PeerId;
use crate::state::{CardsError, CardsState};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Every action kind the application can dispatch.
///
/// Card-board kinds are applied by this crate through
/// [`CardAction`]. The others belong to collaborators (player hands, camera,
/// catalog, notifications, connection handling) and are listed so that their
/// replication policy lives in one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    // Card board
    SelectCard,
    ExhaustCard,
    FlipCards,
    StartCardMove,
    CardMove,
    EndCardMove,
    SelectMultipleCards,
    UnselectAllCards,
    HoverCard,
    HoverLeaveCard,
    TogglePanMode,
    ToggleMultiselectMode,
    DeleteCardStack,
    ShuffleStack,
    DrawCardsOutOfCardStack,

    // Hand interaction
    AddToPlayerHand,
    StartDraggingCardFromHand,
    StopDraggingCardFromHand,
    CardFromHandMoveWithSnap,
    ToggleDrawCardsIntoHand,
    SetVisiblePlayerHandNumber,

    // Camera and view
    UpdatePosition,
    UpdateZoom,
    SetPreviewCardId,
    ClearPreviewCard,
    SetMenuPreviewCardJsonId,
    ClearMenuPreviewCardJsonId,
    ToggleSnapCardsToGrid,
    ToggleNotes,

    // Catalog loading
    LoadCardsData,
    LoadCardsDataForPack,
    LoadCardsForEncounterSet,
    BulkLoadCardsDataForPack,
    BulkLoadCardsForEncounterSet,
    DoneLoadingJson,
    ShowSpecificCardLoader,

    // Session and connection
    ConnectToRemoteGame,
    CreateNewMultiplayerGame,
    SetMultiplayerGameName,
    ReceiveRemoteGameState,
    RequestResync,
    RemovePlayer,

    // Notifications
    SendNotification,
    ClearNotification,
}

impl ActionKind {
    /// All kinds, for exhaustive checks.
    pub const ALL: [ActionKind; 44] = [
        ActionKind::SelectCard,
        ActionKind::ExhaustCard,
        ActionKind::FlipCards,
        ActionKind::StartCardMove,
        ActionKind::CardMove,
        ActionKind::EndCardMove,
        ActionKind::SelectMultipleCards,
        ActionKind::UnselectAllCards,
        ActionKind::HoverCard,
        ActionKind::HoverLeaveCard,
        ActionKind::TogglePanMode,
        ActionKind::ToggleMultiselectMode,
        ActionKind::DeleteCardStack,
        ActionKind::ShuffleStack,
        ActionKind::DrawCardsOutOfCardStack,
        ActionKind::AddToPlayerHand,
        ActionKind::StartDraggingCardFromHand,
        ActionKind::StopDraggingCardFromHand,
        ActionKind::CardFromHandMoveWithSnap,
        ActionKind::ToggleDrawCardsIntoHand,
        ActionKind::SetVisiblePlayerHandNumber,
        ActionKind::UpdatePosition,
        ActionKind::UpdateZoom,
        ActionKind::SetPreviewCardId,
        ActionKind::ClearPreviewCard,
        ActionKind::SetMenuPreviewCardJsonId,
        ActionKind::ClearMenuPreviewCardJsonId,
        ActionKind::ToggleSnapCardsToGrid,
        ActionKind::ToggleNotes,
        ActionKind::LoadCardsData,
        ActionKind::LoadCardsDataForPack,
        ActionKind::LoadCardsForEncounterSet,
        ActionKind::BulkLoadCardsDataForPack,
        ActionKind::BulkLoadCardsForEncounterSet,
        ActionKind::DoneLoadingJson,
        ActionKind::ShowSpecificCardLoader,
        ActionKind::ConnectToRemoteGame,
        ActionKind::CreateNewMultiplayerGame,
        ActionKind::SetMultiplayerGameName,
        ActionKind::ReceiveRemoteGameState,
        ActionKind::RequestResync,
        ActionKind::RemovePlayer,
        ActionKind::SendNotification,
        ActionKind::ClearNotification,
    ];

    /// The block-list. `true` means the action must never leave this peer.
    pub const fn is_local_only(self) -> bool {
        match self {
            ActionKind::SelectCard
            | ActionKind::ExhaustCard
            | ActionKind::FlipCards
            | ActionKind::StartCardMove
            | ActionKind::CardMove
            | ActionKind::EndCardMove
            | ActionKind::SelectMultipleCards
            | ActionKind::UnselectAllCards
            | ActionKind::DeleteCardStack
            | ActionKind::ShuffleStack
            | ActionKind::DrawCardsOutOfCardStack => false,

            // Hand contents are shared even though hands live outside the board.
            ActionKind::AddToPlayerHand => false,

            // Hover and preview only drive this player's preview pane.
            ActionKind::HoverCard
            | ActionKind::HoverLeaveCard
            | ActionKind::SetPreviewCardId
            | ActionKind::ClearPreviewCard
            | ActionKind::SetMenuPreviewCardJsonId
            | ActionKind::ClearMenuPreviewCardJsonId => true,

            // Local input modes and view.
            ActionKind::TogglePanMode
            | ActionKind::ToggleMultiselectMode
            | ActionKind::ToggleDrawCardsIntoHand
            | ActionKind::ToggleSnapCardsToGrid
            | ActionKind::SetVisiblePlayerHandNumber
            | ActionKind::ToggleNotes
            | ActionKind::UpdatePosition
            | ActionKind::UpdateZoom => true,

            // Transient hand drag signals.
            ActionKind::StartDraggingCardFromHand
            | ActionKind::StopDraggingCardFromHand
            | ActionKind::CardFromHandMoveWithSnap => true,

            // Each peer loads its own catalog.
            ActionKind::LoadCardsData
            | ActionKind::LoadCardsDataForPack
            | ActionKind::LoadCardsForEncounterSet
            | ActionKind::BulkLoadCardsDataForPack
            | ActionKind::BulkLoadCardsForEncounterSet
            | ActionKind::DoneLoadingJson
            | ActionKind::ShowSpecificCardLoader => true,

            // Connection lifecycle is transport business, not game state.
            ActionKind::ConnectToRemoteGame
            | ActionKind::CreateNewMultiplayerGame
            | ActionKind::SetMultiplayerGameName
            | ActionKind::ReceiveRemoteGameState
            | ActionKind::RequestResync
            | ActionKind::RemovePlayer => true,

            ActionKind::SendNotification | ActionKind::ClearNotification => true,
        }
    }

    /// Whether the action must be broadcast to peers.
    pub const fn should_replicate(self) -> bool {
        !self.is_local_only()
    }

    /// Wire name of the kind.
    pub const fn name(self) -> &'static str {
        match self {
            ActionKind::SelectCard => "selectCard",
            ActionKind::ExhaustCard => "exhaustCard",
            ActionKind::FlipCards => "flipCards",
            ActionKind::StartCardMove => "startCardMove",
            ActionKind::CardMove => "cardMove",
            ActionKind::EndCardMove => "endCardMove",
            ActionKind::SelectMultipleCards => "selectMultipleCards",
            ActionKind::UnselectAllCards => "unselectAllCards",
            ActionKind::HoverCard => "hoverCard",
            ActionKind::HoverLeaveCard => "hoverLeaveCard",
            ActionKind::TogglePanMode => "togglePanMode",
            ActionKind::ToggleMultiselectMode => "toggleMultiselectMode",
            ActionKind::DeleteCardStack => "deleteCardStack",
            ActionKind::ShuffleStack => "shuffleStack",
            ActionKind::DrawCardsOutOfCardStack => "drawCardsOutOfCardStack",
            ActionKind::AddToPlayerHand => "addToPlayerHand",
            ActionKind::StartDraggingCardFromHand => "startDraggingCardFromHand",
            ActionKind::StopDraggingCardFromHand => "stopDraggingCardFromHand",
            ActionKind::CardFromHandMoveWithSnap => "cardFromHandMoveWithSnap",
            ActionKind::ToggleDrawCardsIntoHand => "toggleDrawCardsIntoHand",
            ActionKind::SetVisiblePlayerHandNumber => "setVisiblePlayerHandNumber",
            ActionKind::UpdatePosition => "updatePosition",
            ActionKind::UpdateZoom => "updateZoom",
            ActionKind::SetPreviewCardId => "setPreviewCardId",
            ActionKind::ClearPreviewCard => "clearPreviewCard",
            ActionKind::SetMenuPreviewCardJsonId => "setMenuPreviewCardJsonId",
            ActionKind::ClearMenuPreviewCardJsonId => "clearMenuPreviewCardJsonId",
            ActionKind::ToggleSnapCardsToGrid => "toggleSnapCardsToGrid",
            ActionKind::ToggleNotes => "toggleNotes",
            ActionKind::LoadCardsData => "loadCardsData",
            ActionKind::LoadCardsDataForPack => "loadCardsDataForPack",
            ActionKind::LoadCardsForEncounterSet => "loadCardsForEncounterSet",
            ActionKind::BulkLoadCardsDataForPack => "bulkLoadCardsDataForPack",
            ActionKind::BulkLoadCardsForEncounterSet => "bulkLoadCardsForEncounterSet",
            ActionKind::DoneLoadingJson => "doneLoadingJson",
            ActionKind::ShowSpecificCardLoader => "showSpecificCardLoader",
            ActionKind::ConnectToRemoteGame => "connectToRemoteGame",
            ActionKind::CreateNewMultiplayerGame => "createNewMultiplayerGame",
            ActionKind::SetMultiplayerGameName => "setMultiplayerGameName",
            ActionKind::ReceiveRemoteGameState => "receiveRemoteGameState",
            ActionKind::RequestResync => "requestResync",
            ActionKind::RemovePlayer => "removePlayer",
            ActionKind::SendNotification => "sendNotification",
            ActionKind::ClearNotification => "clearNotification",
        }
    }

    /// Kinds that are broadcast.
    pub fn replicated() -> impl Iterator<Item = ActionKind> {
        Self::ALL.into_iter().filter(|kind| kind.should_replicate())
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Messages exchanged between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    /// A shared mutation performed by `from`.
    Action { from: PeerId, action: CardAction },
    /// A newly joined peer asks for the full board.
    RequestResync { from: PeerId },
    /// Full board sent by `from` in answer to `to`'s request.
    Resync {
        from: PeerId,
        to: PeerId,
        state: CardsState,
    },
}

impl PeerMessage {
    pub fn to_json(&self) -> ReplicationResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> ReplicationResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Replication errors.
#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("Malformed peer message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Peer {from} sent local-only action {kind}")]
    LocalOnlyAction { from: PeerId, kind: ActionKind },
    #[error(transparent)]
    Cards(#[from] CardsError),
}

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_all_is_exhaustive_and_unique() {
        let unique: HashSet<_> = ActionKind::ALL.iter().copied().collect();
        assert_eq!(unique.len(), ActionKind::ALL.len());
        let names: HashSet<_> = ActionKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names.len(), ActionKind::ALL.len());
    }

    #[test]
    fn test_name_matches_serde() {
        for kind in ActionKind::ALL {
            let value = serde_json::to_value(kind).unwrap();
            assert_eq!(value, kind.name(), "serde name differs for {kind:?}");
        }
    }

    #[test]
    fn test_card_board_mutations_replicate() {
        for kind in [
            ActionKind::SelectCard,
            ActionKind::ExhaustCard,
            ActionKind::FlipCards,
            ActionKind::StartCardMove,
            ActionKind::CardMove,
            ActionKind::EndCardMove,
            ActionKind::SelectMultipleCards,
            ActionKind::UnselectAllCards,
            ActionKind::DeleteCardStack,
            ActionKind::ShuffleStack,
            ActionKind::DrawCardsOutOfCardStack,
        ] {
            assert!(kind.should_replicate(), "{kind} should replicate");
        }
    }

    #[test]
    fn test_every_board_action_has_a_kind_in_the_table() {
        let actions = [
            CardAction::ExhaustCard(1),
            CardAction::DeleteCardStack,
            CardAction::ShuffleStack { id: 1, order: vec![1] },
            CardAction::DrawCardsOutOfCardStack { id: 1, count: 1 },
        ];
        for action in actions {
            assert!(ActionKind::ALL.contains(&action.kind()));
            assert!(action.kind().should_replicate());
        }
    }

    #[test]
    fn test_hand_contents_replicate() {
        assert!(ActionKind::AddToPlayerHand.should_replicate());
    }

    #[test]
    fn test_view_state_is_local() {
        for kind in [
            ActionKind::UpdateZoom,
            ActionKind::UpdatePosition,
            ActionKind::SetPreviewCardId,
            ActionKind::ClearPreviewCard,
            ActionKind::SetMenuPreviewCardJsonId,
            ActionKind::ClearMenuPreviewCardJsonId,
            ActionKind::HoverCard,
            ActionKind::HoverLeaveCard,
        ] {
            assert!(kind.is_local_only(), "{kind} should stay local");
        }
    }

    #[test]
    fn test_local_modes_are_local() {
        for kind in [
            ActionKind::TogglePanMode,
            ActionKind::ToggleMultiselectMode,
            ActionKind::ToggleDrawCardsIntoHand,
            ActionKind::ToggleSnapCardsToGrid,
            ActionKind::SetVisiblePlayerHandNumber,
            ActionKind::ToggleNotes,
        ] {
            assert!(kind.is_local_only(), "{kind} should stay local");
        }
    }

    #[test]
    fn test_hand_drag_signals_are_local() {
        assert!(ActionKind::StartDraggingCardFromHand.is_local_only());
        assert!(ActionKind::StopDraggingCardFromHand.is_local_only());
        assert!(ActionKind::CardFromHandMoveWithSnap.is_local_only());
    }

    #[test]
    fn test_catalog_loading_is_local() {
        for kind in [
            ActionKind::LoadCardsData,
            ActionKind::LoadCardsDataForPack,
            ActionKind::LoadCardsForEncounterSet,
            ActionKind::BulkLoadCardsDataForPack,
            ActionKind::BulkLoadCardsForEncounterSet,
            ActionKind::DoneLoadingJson,
            ActionKind::ShowSpecificCardLoader,
        ] {
            assert!(kind.is_local_only(), "{kind} should stay local");
        }
    }

    #[test]
    fn test_connection_lifecycle_is_local() {
        for kind in [
            ActionKind::ConnectToRemoteGame,
            ActionKind::CreateNewMultiplayerGame,
            ActionKind::SetMultiplayerGameName,
            ActionKind::ReceiveRemoteGameState,
            ActionKind::RequestResync,
            ActionKind::RemovePlayer,
            ActionKind::SendNotification,
            ActionKind::ClearNotification,
        ] {
            assert!(kind.is_local_only(), "{kind} should stay local");
        }
    }

    #[test]
    fn test_replicated_set() {
        let replicated: HashSet<_> = ActionKind::replicated().collect();
        assert_eq!(replicated.len(), 12);
        assert!(replicated.contains(&ActionKind::ExhaustCard));
        assert!(replicated.contains(&ActionKind::CardMove));
        assert!(replicated.contains(&ActionKind::ShuffleStack));
        assert!(replicated.contains(&ActionKind::DrawCardsOutOfCardStack));
        assert!(!replicated.contains(&ActionKind::UpdateZoom));
        assert!(!replicated.contains(&ActionKind::SetPreviewCardId));
    }

    #[test]
    fn test_peer_message_roundtrip() {
        let from = PeerId::from_u128(9);
        let message = PeerMessage::Action {
            from,
            action: CardAction::CardMove {
                id: 4,
                dx: 2.5,
                dy: -1.0,
            },
        };
        let json = message.to_json().unwrap();
        assert!(json.contains(r#""type":"action""#));
        assert!(json.contains(r#""type":"cardMove""#));
        assert_eq!(PeerMessage::from_json(&json).unwrap(), message);
    }

    #[test]
    fn test_malformed_message() {
        let err = PeerMessage::from_json("{not json").unwrap_err();
        assert!(matches!(err, ReplicationError::Malformed(_)));
    }
}
