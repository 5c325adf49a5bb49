//! Cardtable Core Library
//!
//! Card-stack state machine for a shared virtual tabletop: card entities and
//! stacks, group drag with drop-target merging, area selection, and the
//! filter deciding which mutations are replicated to other players.

pub mod action;
pub mod card;
pub mod config;
pub mod drop_target;
pub mod geometry;
pub mod peer;
pub mod replication;
pub mod selection;
pub mod session;
pub mod state;

pub use action::CardAction;
pub use card::{CardDetails, CardEntity, CardId, JsonId};
pub use config::{BoardConfig, CARD_DROP_TARGET_DISTANCE, CARD_HEIGHT, CARD_WIDTH};
pub use drop_target::{DropTarget, resolve_drop_target};
pub use peer::PeerId;
pub use replication::{ActionKind, PeerMessage, ReplicationError, ReplicationResult};
pub use selection::{AreaSelection, cards_in_rect, rect_from_touches};
pub use session::{PlayerSlots, Session, missing_player_number};
pub use state::{CardsError, CardsResult, CardsState};
