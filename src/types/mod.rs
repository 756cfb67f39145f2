pub mod constants;
pub mod error;
pub mod model;

pub use constants::*;
pub use error::{ChatError, Result};
pub use model::{
    LastMessage, Member, MembershipId, Message, MessageId, PharmacyId, Room, RoomId, RoomKind,
    UserId,
};
