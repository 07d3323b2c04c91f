//! Reusable working buffers for signing and verification.

/// Room for a prepended source address, the hash/crypt/key-id-length
/// prefix and the longest key id.
pub const SIGNABLE_OVERHEAD: usize = 16 + 3 + 255;

/// Caller owned working buffers.
///
/// One scratch is borrowed mutably per sign or verify call, so a single
/// threaded caller keeps one around and never allocates on the hot path.
#[derive(Debug, Clone)]
pub struct SignatureScratch {
    pub(crate) signable: Box<[u8]>,
    pub(crate) crypt: Box<[u8]>,
    pub(crate) original: Box<[u8]>,
    pub(crate) states: Vec<PassState>,
}

/// Per policy bookkeeping of one verification pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PassState {
    pub applicable: bool,
    pub must_be_verified: bool,
    pub verified: bool,
}

impl SignatureScratch {
    /// Buffers large enough for packets of up to `max_packet_size` bytes
    pub fn new(max_packet_size: usize) -> Self {
        let size = max_packet_size + SIGNABLE_OVERHEAD;
        Self {
            signable: vec![0u8; size].into_boxed_slice(),
            crypt: vec![0u8; size].into_boxed_slice(),
            original: vec![0u8; size].into_boxed_slice(),
            states: Vec::new(),
        }
    }

    /// Capacity of the signable buffer
    pub fn capacity(&self) -> usize {
        self.signable.len()
    }
}

impl Default for SignatureScratch {
    fn default() -> Self {
        Self::new(mesh_wire::MAX_PACKET_SIZE)
    }
}
