//! Commit/tree/blob object identifiers.
//!
//! Wraps `gix::ObjectId` so the rest of the crate has one place to hang the
//! "short id" convention this system uses (first 10 hex characters, not
//! git's usual 7 — carried over unchanged from the source implementation).

use std::fmt;

/// A git object id (SHA-1, 20 bytes), displayed as 40 lowercase hex chars.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(gix::ObjectId);

impl Oid {
    pub(crate) const fn from_gix(id: gix::ObjectId) -> Self {
        Self(id)
    }

    pub(crate) fn to_gix(self) -> gix::ObjectId {
        self.0
    }

    /// Full 40-character lowercase hex representation.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }

    /// The first 10 hex characters, matching this system's `short_id`.
    #[must_use]
    pub fn short(&self) -> String {
        let hex = self.to_hex();
        hex[..10.min(hex.len())].to_owned()
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_is_first_ten_chars() {
        let hex = "0123456789abcdef0123456789abcdef01234567";
        let id = gix::ObjectId::from_hex(hex.as_bytes()).unwrap();
        let oid = Oid::from_gix(id);
        assert_eq!(oid.short(), "0123456789");
        assert_eq!(oid.to_hex(), hex);
    }
}
