use crate::datom::intern::interner;
use sha2::{Digest, Sha256};
use std::{fmt, sync::Arc};

///
/// Identity
///
/// 20-byte content-addressed entity identifier. Interned at construction:
/// equal identities share one canonical instance for the process lifetime,
/// so clones are pointer copies and comparisons are byte comparisons.
///

#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Identity(Arc<[u8; Self::LEN]>);

impl Identity {
    pub const LEN: usize = 20;

    /// Content-address a string key: a truncated SHA-256 digest.
    #[must_use]
    pub fn of_str(key: &str) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&digest[..Self::LEN]);

        Self::intern(bytes)
    }

    /// Canonicalize a raw 20-byte hash through the global interning table.
    #[must_use]
    pub fn intern(bytes: [u8; Self::LEN]) -> Self {
        interner()
            .identities
            .entry(bytes)
            .or_insert_with(|| Self(Arc::new(bytes)))
            .clone()
    }

    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, IdentityLenError> {
        let array: [u8; Self::LEN] = bytes
            .try_into()
            .map_err(|_| IdentityLenError { len: bytes.len() })?;

        Ok(Self::intern(array))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

///
/// IdentityLenError
///

#[derive(Debug, thiserror::Error)]
#[error("identity must be exactly {} bytes, got {len}", Identity::LEN)]
pub struct IdentityLenError {
    pub len: usize,
}

///
/// TESTS
///
