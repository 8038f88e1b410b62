//! Client-side Diameter base protocol engine
//!
//! Implements the pieces of RFC 6733 a client needs to talk to a Diameter
//! server: the AVP and message binary codecs, a JSON-backed dictionary for
//! typed decoding, stream framing over TCP, and a peer session state machine
//! that handles capability exchange, watchdogs and reconnection.
//!
//! Typical use:
//! - load a [`dictionary::Dictionary`] describing the AVPs of interest
//! - build a [`config::PeerConfig`] and call [`peer::Peer::connect`]
//! - wait for [`peer::PeerEvent::CeaReceived`] on the event channel
//! - exchange [`message::Message`]s over the peer's send side and the
//!   incoming channel

pub mod common;
pub mod error;
pub mod dictionary;
pub mod avp;
pub mod message;
pub mod framer;
pub mod config;
pub mod peer;

pub use avp::{Avp, AvpValue};
pub use config::PeerConfig;
pub use dictionary::{AvpDef, AvpType, Dictionary};
pub use error::{DiameterError, DiameterResult, ResultCode};
pub use framer::Framer;
pub use message::{Header, Message};
pub use peer::{Peer, PeerChannels, PeerEvent};

/// Diameter protocol version
pub const DIAMETER_VERSION: u8 = 1;

/// Default Diameter port
pub const DIAMETER_PORT: u16 = 3868;
