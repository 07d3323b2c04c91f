//! Data sources contributing layer2 values.

use std::fmt;

use serde::Serialize;

/// Priority of an origin nobody classified
pub const ORIGIN_PRIORITY_UNKNOWN: u8 = 0;
/// Priority of guessed or heuristic data
pub const ORIGIN_PRIORITY_UNRELIABLE: u8 = 10;
/// Priority of administratively configured data
pub const ORIGIN_PRIORITY_CONFIGURED: u8 = 20;
/// Priority of data reported by the radio itself
pub const ORIGIN_PRIORITY_RELIABLE: u8 = 30;

/// Registry id of an origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct OriginId(pub(crate) u32);

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "origin#{}", self.0)
    }
}

/// Origin identity together with its priority, stored next to every value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OriginRef {
    /// Registry id
    pub id: OriginId,
    /// Merge priority, higher wins
    pub priority: u8,
}

/// A registered origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    /// Unique name
    pub name: String,
    /// Merge priority, higher wins
    pub priority: u8,
}

/// Whether `new` may overwrite a field currently owned by `current`.
///
/// Unset fields and fields owned by the same origin are always written,
/// otherwise only a strictly higher priority wins.
pub fn may_overwrite(current: Option<OriginRef>, new: OriginRef) -> bool {
    match current {
        None => true,
        Some(current) => current.id == new.id || current.priority < new.priority,
    }
}
