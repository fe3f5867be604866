//! Protocol module containing wire event types and the JSON codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_client_event, decode_host_event, encode_client_event, encode_host_event, ProtocolError,
};
pub use messages::*;
