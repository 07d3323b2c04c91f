//! Built-in hash and crypt functions.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::algorithm::{
    CryptAlgorithm, HashAlgorithm, CRYPT_HMAC, CRYPT_IDENTITY, HASH_IDENTITY, HASH_SHA256,
};
use crate::scratch::SIGNABLE_OVERHEAD;
use crate::SignatureError;

const SHA256_OUTPUT_SIZE: usize = 32;

fn ensure_capacity(need: usize, dst: &[u8]) -> Result<(), SignatureError> {
    if dst.len() < need {
        return Err(SignatureError::BufferTooSmall {
            need,
            have: dst.len(),
        });
    }
    Ok(())
}

/// Identity hash: the digest is the input itself
#[derive(Debug, Clone)]
pub struct IdentityHash {
    max_size: usize,
}

impl IdentityHash {
    /// Identity hash for packets up to `max_packet_size` bytes
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            max_size: max_packet_size + SIGNABLE_OVERHEAD,
        }
    }
}

impl Default for IdentityHash {
    fn default() -> Self {
        Self::new(mesh_wire::MAX_PACKET_SIZE)
    }
}

impl HashAlgorithm for IdentityHash {
    fn id(&self) -> u8 {
        HASH_IDENTITY
    }

    fn output_size(&self) -> usize {
        self.max_size
    }

    fn hash(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, SignatureError> {
        ensure_capacity(src.len(), dst)?;
        dst[..src.len()].copy_from_slice(src);
        Ok(src.len())
    }
}

/// SHA-256 hash
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hash;

impl HashAlgorithm for Sha256Hash {
    fn id(&self) -> u8 {
        HASH_SHA256
    }

    fn output_size(&self) -> usize {
        SHA256_OUTPUT_SIZE
    }

    fn hash(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, SignatureError> {
        ensure_capacity(SHA256_OUTPUT_SIZE, dst)?;
        let digest = Sha256::digest(src);
        dst[..SHA256_OUTPUT_SIZE].copy_from_slice(&digest);
        Ok(SHA256_OUTPUT_SIZE)
    }
}

/// Identity crypt: the signature is the hash output
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCrypt;

impl CryptAlgorithm for IdentityCrypt {
    fn id(&self) -> u8 {
        CRYPT_IDENTITY
    }

    fn max_size(&self, hash: &dyn HashAlgorithm) -> usize {
        hash.output_size()
    }

    fn crypt(
        &self,
        hash: &dyn HashAlgorithm,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, SignatureError> {
        hash.hash(src, dst)
    }
}

/// HMAC-SHA-256 over the output of the hash function
#[derive(Clone)]
pub struct HmacCrypt {
    secret: Vec<u8>,
}

impl HmacCrypt {
    /// HMAC crypt with a shared secret
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for HmacCrypt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacCrypt")
            .field("secret_len", &self.secret.len())
            .finish()
    }
}

impl CryptAlgorithm for HmacCrypt {
    fn id(&self) -> u8 {
        CRYPT_HMAC
    }

    fn max_size(&self, _hash: &dyn HashAlgorithm) -> usize {
        SHA256_OUTPUT_SIZE
    }

    fn crypt(
        &self,
        hash: &dyn HashAlgorithm,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, SignatureError> {
        // digest lands in dst first, the MAC then overwrites it
        let digest_len = hash.hash(src, dst)?;
        ensure_capacity(SHA256_OUTPUT_SIZE, dst)?;

        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret).map_err(|e| {
            SignatureError::Transform {
                algorithm: "hmac",
                reason: e.to_string(),
            }
        })?;
        mac.update(&dst[..digest_len]);
        let tag = mac.finalize().into_bytes();

        dst[..SHA256_OUTPUT_SIZE].copy_from_slice(&tag);
        Ok(SHA256_OUTPUT_SIZE)
    }
}
