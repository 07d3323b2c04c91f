//! Registry of signature policies and their resolution against the
//! registered hash and crypt functions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use mesh_wire::ext_tlv_size;
use tracing::{debug, info};

use crate::algorithm::{AlgorithmRegistry, CryptAlgorithm, HashAlgorithm};
use crate::policy::{SignatureKey, SignaturePolicy};
use crate::SignatureError;

/// Opaque identifier of a registered policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyHandle(u64);

impl fmt::Display for PolicyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hash and crypt function a policy resolved to
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
    pub hash: Arc<dyn HashAlgorithm>,
    pub crypt: Arc<dyn CryptAlgorithm>,
}

/// A policy inside the registry
#[derive(Debug)]
pub struct RegisteredPolicy {
    handle: PolicyHandle,
    policy: Arc<SignaturePolicy>,
    resolved: Option<Resolved>,
}

impl RegisteredPolicy {
    /// Registry handle
    pub fn handle(&self) -> PolicyHandle {
        self.handle
    }

    /// The policy itself
    pub fn policy(&self) -> &Arc<SignaturePolicy> {
        &self.policy
    }

    /// Whether both hash and crypt function are registered
    pub fn is_active(&self) -> bool {
        self.resolved.is_some()
    }

    pub(crate) fn resolved(&self) -> Option<&Resolved> {
        self.resolved.as_ref()
    }
}

/// Writer side view of an active policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Postprocessor {
    /// Policy handle
    pub handle: PolicyHandle,
    /// Hash and crypt id pair
    pub key: SignatureKey,
    /// Bytes the writer must keep free for this signature
    pub allocate_space: usize,
}

/// Signature policies ordered by hash/crypt key, then by registration
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    algorithms: AlgorithmRegistry,
    policies: BTreeMap<SignatureKey, Vec<RegisteredPolicy>>,
    next_handle: u64,
}

impl SignatureRegistry {
    /// Create a registry without any hash or crypt functions
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the identity hash and crypt functions
    pub fn with_identity(max_packet_size: usize) -> Self {
        Self {
            algorithms: AlgorithmRegistry::with_identity(max_packet_size),
            ..Self::default()
        }
    }

    /// Registered hash and crypt functions
    pub fn algorithms(&self) -> &AlgorithmRegistry {
        &self.algorithms
    }

    /// Register a hash function and activate policies waiting for it
    pub fn add_hash(&mut self, hash: Arc<dyn HashAlgorithm>) -> Result<(), SignatureError> {
        self.algorithms.add_hash(hash)?;
        self.resolve_all();
        Ok(())
    }

    /// Unregister a hash function, deactivating policies using it
    pub fn remove_hash(&mut self, id: u8) -> Option<Arc<dyn HashAlgorithm>> {
        let removed = self.algorithms.remove_hash(id);
        self.resolve_all();
        removed
    }

    /// Register a crypt function and activate policies waiting for it
    pub fn add_crypt(&mut self, crypt: Arc<dyn CryptAlgorithm>) -> Result<(), SignatureError> {
        self.algorithms.add_crypt(crypt)?;
        self.resolve_all();
        Ok(())
    }

    /// Unregister a crypt function, deactivating policies using it
    pub fn remove_crypt(&mut self, id: u8) -> Option<Arc<dyn CryptAlgorithm>> {
        let removed = self.algorithms.remove_crypt(id);
        self.resolve_all();
        removed
    }

    /// Register a policy
    pub fn add_policy(&mut self, policy: Arc<SignaturePolicy>) -> PolicyHandle {
        let handle = PolicyHandle(self.next_handle);
        self.next_handle += 1;

        debug!(
            "Registered signature policy {} '{}' ({})",
            handle,
            policy.name(),
            policy.key()
        );
        self.policies
            .entry(policy.key())
            .or_default()
            .push(RegisteredPolicy {
                handle,
                policy,
                resolved: None,
            });
        self.resolve_all();
        handle
    }

    /// Unregister a policy
    pub fn remove_policy(&mut self, handle: PolicyHandle) -> Option<Arc<SignaturePolicy>> {
        let mut removed = None;
        self.policies.retain(|_, list| {
            if let Some(idx) = list.iter().position(|p| p.handle == handle) {
                removed = Some(list.remove(idx).policy);
            }
            !list.is_empty()
        });

        if let Some(policy) = &removed {
            debug!(
                "Unregistered signature policy {} '{}'",
                handle,
                policy.name()
            );
        }
        self.resolve_all();
        removed
    }

    /// Look up a registered policy
    pub fn policy(&self, handle: PolicyHandle) -> Option<&RegisteredPolicy> {
        self.policies().find(|p| p.handle == handle)
    }

    /// All policies, in key order and then registration order
    pub fn policies(&self) -> impl Iterator<Item = &RegisteredPolicy> + '_ {
        self.policies.values().flatten()
    }

    /// Number of registered policies
    pub fn policy_count(&self) -> usize {
        self.policies.values().map(Vec::len).sum()
    }

    /// Re-resolve every policy against the current hash and crypt functions
    pub fn resolve_all(&mut self) {
        let algorithms = &self.algorithms;
        for (key, list) in self.policies.iter_mut() {
            let resolved = match (algorithms.hash(key.hash), algorithms.crypt(key.crypt)) {
                (Some(hash), Some(crypt)) => Some(Resolved {
                    hash: Arc::clone(hash),
                    crypt: Arc::clone(crypt),
                }),
                _ => None,
            };

            for entry in list.iter_mut() {
                match (&entry.resolved, &resolved) {
                    (None, Some(_)) => info!(
                        "Signature policy {} '{}' ({}) is now active",
                        entry.handle,
                        entry.policy.name(),
                        key
                    ),
                    (Some(_), None) => info!(
                        "Signature policy {} '{}' ({}) is now inactive",
                        entry.handle,
                        entry.policy.name(),
                        key
                    ),
                    _ => {}
                }
                entry.resolved = resolved.clone();
            }
        }
    }

    /// Active policies with the space the writer has to reserve for each
    pub fn postprocessors(&self) -> Vec<Postprocessor> {
        self.policies()
            .filter_map(|entry| {
                let resolved = entry.resolved()?;
                let max = resolved.crypt.max_size(resolved.hash.as_ref());
                Some(Postprocessor {
                    handle: entry.handle,
                    key: entry.policy.key(),
                    allocate_space: ext_tlv_size(3 + entry.policy.key_id().len() + max),
                })
            })
            .collect()
    }
}
