// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifiers.
//!
//! An id renders as `tag-suffix` (`job-V1StGXR8_Z5jdHi6B-myT`), but only
//! the random suffix is stored: the tag belongs to the id's *type*, as an
//! associated constant on a marker implementing [`Kind`]. That keeps ids
//! `Copy` and heap-free, makes cross-kind comparison a type error, and
//! reconstructs the full form only at the edges (Display, serde).

use std::fmt;
use std::marker::PhantomData;

/// Length of the random suffix (a nanoid, ASCII alphabet).
pub const SUFFIX_LEN: usize = 19;

/// Marker for an id kind; carries the display tag.
pub trait Kind: Copy + Eq + std::hash::Hash + Send + Sync + 'static {
    /// Short ASCII tag prepended in the display form, e.g. `"job-"`.
    const TAG: &'static str;
}

/// A typed identifier over a [`Kind`] marker.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id<K: Kind> {
    len: u8,
    suffix: [u8; SUFFIX_LEN],
    kind: PhantomData<K>,
}

impl<K: Kind> Id<K> {
    /// Mint a fresh id with a random suffix.
    pub fn new() -> Self {
        Self::with_suffix(&nanoid::nanoid!(SUFFIX_LEN))
    }

    /// Rebuild an id from its display form.
    ///
    /// A missing tag is tolerated (the whole input is the suffix), and a
    /// suffix longer than [`SUFFIX_LEN`] bytes is truncated; both keep
    /// parsing infallible for ids we minted ourselves.
    pub fn from_string(s: impl AsRef<str>) -> Self {
        let s = s.as_ref();
        Self::with_suffix(s.strip_prefix(K::TAG).unwrap_or(s))
    }

    fn with_suffix(suffix: &str) -> Self {
        let mut len = suffix.len().min(SUFFIX_LEN);
        // Truncation must not split a multi-byte character.
        while !suffix.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0u8; SUFFIX_LEN];
        bytes[..len].copy_from_slice(&suffix.as_bytes()[..len]);
        Self {
            len: len as u8,
            suffix: bytes,
            kind: PhantomData,
        }
    }

    /// The random part, without the kind tag.
    pub fn suffix(&self) -> &str {
        // with_suffix only ever stores char-boundary prefixes of valid
        // UTF-8, so this cannot fail.
        std::str::from_utf8(&self.suffix[..self.len as usize]).unwrap_or("")
    }

    /// The suffix truncated to at most `n` characters, for compact
    /// log and UI labels.
    pub fn short(&self, n: usize) -> &str {
        let suffix = self.suffix();
        match suffix.char_indices().nth(n) {
            Some((byte, _)) => &suffix[..byte],
            None => suffix,
        }
    }
}

impl<K: Kind> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", K::TAG, self.suffix())
    }
}

impl<K: Kind> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", K::TAG, self.suffix())
    }
}

/// Compare against the full display form, tag included.
impl<K: Kind> PartialEq<str> for Id<K> {
    fn eq(&self, other: &str) -> bool {
        other
            .strip_prefix(K::TAG)
            .is_some_and(|rest| rest == self.suffix())
    }
}

impl<K: Kind> PartialEq<&str> for Id<K> {
    fn eq(&self, other: &&str) -> bool {
        PartialEq::<str>::eq(self, other)
    }
}

impl<K: Kind> serde::Serialize for Id<K> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de, K: Kind> serde::Deserialize<'de> for Id<K> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_string(s))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobTag;

impl Kind for JobTag {
    const TAG: &'static str = "job-";
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionTag;

impl Kind for SessionTag {
    const TAG: &'static str = "ses-";
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleTag;

impl Kind for ScheduleTag {
    const TAG: &'static str = "sch-";
}

/// Unique identifier for one pipeline or map-reduce run.
///
/// Tracker records, progress events, and scheduler history all refer to
/// a run by this id.
pub type JobId = Id<JobTag>;

/// Unique identifier for a pooled LLM session.
pub type SessionId = Id<SessionTag>;

/// Unique identifier for a schedule entry.
pub type ScheduleId = Id<ScheduleTag>;

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
