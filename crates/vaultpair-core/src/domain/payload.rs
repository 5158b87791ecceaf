//! The vault credential blob moved by a pairing.

use std::fmt;

use zeroize::Zeroize;

/// Encrypted vault connection secret received from the peer.
///
/// Indivisible and opaque: the client never parses it and never applies part
/// of it.  It is handed whole to the vault import routine.
///
/// - not `Clone`, so there is exactly one copy in the client
/// - not `Serialize`, so it cannot leak into a DTO
/// - `Debug`/`Display` print `[REDACTED]`
/// - the buffer is wiped on drop
pub struct VaultTransferPayload {
    inner: String,
}

impl VaultTransferPayload {
    pub fn new(blob: String) -> Self {
        Self { inner: blob }
    }

    /// Borrows the blob for handing to the importer.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for VaultTransferPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for VaultTransferPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for VaultTransferPayload {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}
