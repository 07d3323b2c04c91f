//! Signature policies and their scope hooks.

use std::collections::BTreeSet;
use std::fmt;

use mesh_wire::ContextKind;
use serde::{Deserialize, Serialize};

/// Hash and crypt id pair a policy signs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignatureKey {
    /// RFC7182 hash function id
    pub hash: u8,
    /// RFC7182 crypt function id
    pub crypt: u8,
}

impl SignatureKey {
    /// Create a key
    pub fn new(hash: u8, crypt: u8) -> Self {
        Self { hash, crypt }
    }
}

impl fmt::Display for SignatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hash, self.crypt)
    }
}

/// Result of checking a received key id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyIdCheck {
    /// Key id acceptable, verify the signature
    Okay,
    /// Skip this policy for this signature
    Ignore,
    /// Drop the whole packet or message
    Drop,
}

/// Policy specific hooks deciding where a policy applies and which key id it uses
pub trait SignatureScope: Send + Sync + fmt::Debug {
    /// Whether the policy signs and verifies this packet or message type
    fn applies_to(&self, kind: ContextKind) -> bool;

    /// Key id written into outgoing signatures
    fn key_id(&self) -> &[u8] {
        &[]
    }

    /// Check a key id found in an incoming signature
    fn check_key_id(&self, _key_id: &[u8]) -> KeyIdCheck {
        KeyIdCheck::Okay
    }
}

/// A registered signature policy
#[derive(Debug)]
pub struct SignaturePolicy {
    name: String,
    key: SignatureKey,
    source_specific: bool,
    drop_if_invalid: bool,
    scope: Box<dyn SignatureScope>,
}

impl SignaturePolicy {
    /// Create a policy signing with `key`, restricted by `scope`
    pub fn new(name: impl Into<String>, key: SignatureKey, scope: impl SignatureScope + 'static) -> Self {
        Self {
            name: name.into(),
            key,
            source_specific: false,
            drop_if_invalid: false,
            scope: Box::new(scope),
        }
    }

    /// Prepend the source address to the signed content
    pub fn source_specific(mut self, source_specific: bool) -> Self {
        self.source_specific = source_specific;
        self
    }

    /// Make a valid signature mandatory for applicable packets and messages
    pub fn drop_if_invalid(mut self, drop_if_invalid: bool) -> Self {
        self.drop_if_invalid = drop_if_invalid;
        self
    }

    /// Policy name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hash and crypt id pair
    pub fn key(&self) -> SignatureKey {
        self.key
    }

    /// Whether signatures are source specific
    pub fn is_source_specific(&self) -> bool {
        self.source_specific
    }

    /// Whether missing or invalid signatures drop the content
    pub fn is_drop_if_invalid(&self) -> bool {
        self.drop_if_invalid
    }

    /// See [`SignatureScope::applies_to`]
    pub fn applies_to(&self, kind: ContextKind) -> bool {
        self.scope.applies_to(kind)
    }

    /// See [`SignatureScope::key_id`]
    pub fn key_id(&self) -> &[u8] {
        self.scope.key_id()
    }

    /// See [`SignatureScope::check_key_id`]
    pub fn check_key_id(&self, key_id: &[u8]) -> KeyIdCheck {
        self.scope.check_key_id(key_id)
    }
}

/// Scope covering a set of message types and optionally packets, with a
/// static key id and an optional list of accepted key ids
#[derive(Debug, Clone)]
pub struct MessageTypeScope {
    message_types: BTreeSet<u8>,
    packet: bool,
    key_id: Vec<u8>,
    accepted_key_ids: Vec<Vec<u8>>,
    unknown_key_id: KeyIdCheck,
}

impl MessageTypeScope {
    /// Scope covering the given message types
    pub fn messages(message_types: impl IntoIterator<Item = u8>) -> Self {
        Self {
            message_types: message_types.into_iter().collect(),
            packet: false,
            key_id: Vec::new(),
            accepted_key_ids: Vec::new(),
            unknown_key_id: KeyIdCheck::Ignore,
        }
    }

    /// Scope covering packets only
    pub fn packets() -> Self {
        Self::messages([]).with_packets(true)
    }

    /// Also cover packets
    pub fn with_packets(mut self, packet: bool) -> Self {
        self.packet = packet;
        self
    }

    /// Key id for outgoing signatures
    pub fn with_key_id(mut self, key_id: impl Into<Vec<u8>>) -> Self {
        self.key_id = key_id.into();
        self
    }

    /// Restrict accepted incoming key ids; an empty list accepts any
    pub fn with_accepted_key_ids(mut self, key_ids: Vec<Vec<u8>>) -> Self {
        self.accepted_key_ids = key_ids;
        self
    }

    /// What happens to signatures whose key id is not accepted
    pub fn with_unknown_key_id(mut self, action: KeyIdCheck) -> Self {
        self.unknown_key_id = action;
        self
    }
}

impl SignatureScope for MessageTypeScope {
    fn applies_to(&self, kind: ContextKind) -> bool {
        match kind {
            ContextKind::Packet => self.packet,
            ContextKind::Message { msg_type } => self.message_types.contains(&msg_type),
        }
    }

    fn key_id(&self) -> &[u8] {
        &self.key_id
    }

    fn check_key_id(&self, key_id: &[u8]) -> KeyIdCheck {
        if self.accepted_key_ids.is_empty()
            || self.accepted_key_ids.iter().any(|k| k.as_slice() == key_id)
        {
            KeyIdCheck::Okay
        } else {
            self.unknown_key_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Everything;

    impl SignatureScope for Everything {
        fn applies_to(&self, _kind: ContextKind) -> bool {
            true
        }
    }

    #[test]
    fn test_scope_defaults() {
        let policy = SignaturePolicy::new("all", SignatureKey::new(0, 0), Everything);
        assert!(policy.key_id().is_empty());
        assert_eq!(policy.check_key_id(b"anything"), KeyIdCheck::Okay);
        assert!(!policy.is_source_specific());
        assert!(!policy.is_drop_if_invalid());
    }

    #[test]
    fn test_message_type_scope() {
        let scope = MessageTypeScope::messages([1, 2]);
        assert!(scope.applies_to(ContextKind::Message { msg_type: 1 }));
        assert!(!scope.applies_to(ContextKind::Message { msg_type: 3 }));
        assert!(!scope.applies_to(ContextKind::Packet));

        let scope = MessageTypeScope::packets();
        assert!(scope.applies_to(ContextKind::Packet));
        assert!(!scope.applies_to(ContextKind::Message { msg_type: 1 }));
    }

    #[test]
    fn test_accepted_key_ids() {
        let scope = MessageTypeScope::messages([1])
            .with_accepted_key_ids(vec![b"k1".to_vec()])
            .with_unknown_key_id(KeyIdCheck::Drop);
        assert_eq!(scope.check_key_id(b"k1"), KeyIdCheck::Okay);
        assert_eq!(scope.check_key_id(b"k2"), KeyIdCheck::Drop);

        let open = MessageTypeScope::messages([1]);
        assert_eq!(open.check_key_id(b"k2"), KeyIdCheck::Okay);
    }

    #[test]
    fn test_key_ordering() {
        assert!(SignatureKey::new(0, 3) < SignatureKey::new(3, 0));
        assert!(SignatureKey::new(3, 0) < SignatureKey::new(3, 3));
    }
}
