//! Gateway wire protocol: the `{op, d, s, t}` envelope, opcodes, and the
//! typed payloads the session engine reads and writes.
//!
//! Everything here is pure.  [`decode`] turns a text frame into a
//! [`Frame`]; [`encode`] turns an opcode plus payload back into text.

mod frame;
mod payload;

pub use frame::{decode, encode, DecodeError, Frame};
pub use payload::{
    ConnectionProperties, HelloPayload, IdentifyPayload, MessageAuthor, MessageCreate,
    ReadyPayload, ReadyUser, ResumePayload, UnavailableGuild,
};

/// Gateway opcodes used by the session engine.
pub mod opcode {
    pub const DISPATCH: u32 = 0;
    pub const HEARTBEAT: u32 = 1;
    pub const IDENTIFY: u32 = 2;
    pub const RESUME: u32 = 6;
    pub const RECONNECT: u32 = 7;
    pub const INVALID_SESSION: u32 = 9;
    pub const HELLO: u32 = 10;
    pub const HEARTBEAT_ACK: u32 = 11;
}

/// Dispatch event names (`t` field) the engine routes on.
pub mod event {
    pub const READY: &str = "READY";
    pub const RESUMED: &str = "RESUMED";
    pub const MESSAGE_CREATE: &str = "MESSAGE_CREATE";
    pub const GUILD_CREATE: &str = "GUILD_CREATE";
}

/// Gateway intent bits.
pub mod intents {
    pub const GUILDS: u64 = 1 << 0;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    pub const MESSAGE_CONTENT: u64 = 1 << 15;

    /// What a channel-command bot needs: guild membership, guild messages,
    /// and the message text itself.
    pub const DEFAULT: u64 = GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT;
}
