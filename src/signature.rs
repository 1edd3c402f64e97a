//! Author/committer identities.

use std::fmt;

/// An author or committer identity attached to a commit.
///
/// Mirrors `pygit2.Signature`: a name, an email, a timestamp, and a
/// timezone offset in minutes east of UTC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Display name, e.g. `"Jane Doe"`.
    pub name: String,
    /// Email address, e.g. `"jane@example.org"`.
    pub email: String,
    /// Seconds since the Unix epoch.
    pub time: i64,
    /// Timezone offset in minutes east of UTC.
    pub offset_minutes: i32,
}

impl Signature {
    /// Build a signature stamped with the current time in the local
    /// timezone (falling back to UTC if the local offset can't be read).
    #[must_use]
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        let time = gix::date::Time::now_local_or_utc();
        Self {
            name: name.into(),
            email: email.into(),
            time: time.seconds,
            offset_minutes: time.offset / 60,
        }
    }

    pub(crate) fn to_gix(&self) -> gix::actor::Signature {
        gix::actor::Signature {
            name: self.name.as_str().into(),
            email: self.email.as_str().into(),
            time: gix::date::Time::new(self.time, self.offset_minutes * 60),
        }
    }

    pub(crate) fn from_gix(sig: &gix::actor::SignatureRef<'_>) -> Self {
        Self {
            name: sig.name.to_string(),
            email: sig.email.to_string(),
            time: sig.time().map(|t| t.seconds).unwrap_or_default(),
            offset_minutes: sig.time().map(|t| t.offset / 60).unwrap_or_default(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}
