//! Enumeration types shared across the valuation workspace.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Activity kinds
// ---------------------------------------------------------------------------

/// The kind of action recorded in the activity ledger.
///
/// Only kinds listed in the configured activity filter feed the valuation
/// engine. By default that is [`ActivityKind::Message`] alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// A chat message posted by the member.
    Message,
    /// A reaction added to someone else's message.
    Reaction,
    /// One minute spent in a voice channel.
    Voice,
    /// A bot command invoked by the member.
    Command,
    /// A join or leave of the server.
    Membership,
}

impl ActivityKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Message,
        Self::Reaction,
        Self::Voice,
        Self::Command,
        Self::Membership,
    ];

    /// Stable lowercase name used in storage and configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Reaction => "reaction",
            Self::Voice => "voice",
            Self::Command => "command",
            Self::Membership => "membership",
        }
    }
}

impl core::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored activity kind name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown activity kind: {0}")]
pub struct UnknownActivityKind(pub String);

impl core::str::FromStr for ActivityKind {
    type Err = UnknownActivityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownActivityKind(s.to_owned()))
    }
}
