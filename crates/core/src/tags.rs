/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Tags - named labels with a precomputed hash for cheap set-membership tests.
//! 
//! Statuses carry Tags (e.g. "Magic", "Poison", "Stun") so that dispels, cleanses 
//! and immunities can target whole families of effects without string comparisons 
//! in the per-tick paths.

use core::hash::{BuildHasher, Hash, Hasher};

use bevy::platform::hash::FixedHasher;

use crate::types::KvMap;

#[derive(Clone, Debug)]
pub struct Tag {
    name: String,
    hash: u64,
}

impl Tag {
    pub fn new<IS: Into<String>>(name: IS) -> Self {
        let name = name.into();
        // FixedHasher is seedless, so the same name hashes the same across runs.
        let hash = FixedHasher.hash_one(name.as_str());
        Self { name, hash }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash_value(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.name == other.name
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl core::fmt::Display for Tag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.name.fmt(f)
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}


/// A set of Tags. Membership is tested against the precomputed hashes.
/// 
/// Iteration order is insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagCollection {
    tags: Vec<Tag>,
    by_hash: KvMap<u64, usize>,
}

impl TagCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a Tag; returns false if it was already present.
    pub fn insert(&mut self, tag: Tag) -> bool {
        if self.by_hash.contains_key(&tag.hash) {
            return false;
        }
        self.by_hash.insert(tag.hash, self.tags.len());
        self.tags.push(tag);
        true
    }

    pub fn with<T: Into<Tag>>(mut self, tag: T) -> Self {
        self.insert(tag.into());
        self
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.by_hash.contains_key(&tag.hash)
    }

    pub fn contains_any(&self, other: &TagCollection) -> bool {
        other.tags.iter().any(|tag| self.contains(tag))
    }

    pub fn contains_all(&self, other: &TagCollection) -> bool {
        other.tags.iter().all(|tag| self.contains(tag))
    }

    /// Returns a new collection containing the Tags of both.
    pub fn union(&self, other: &TagCollection) -> TagCollection {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    pub fn union_with(&mut self, other: &TagCollection) {
        for tag in other.tags.iter() {
            self.insert(tag.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl<T: Into<Tag>> FromIterator<T> for TagCollection {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut out = Self::new();
        for tag in iter {
            out.insert(tag.into());
        }
        out
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_names_hash_equal() {
        assert_eq!(Tag::new("Poison"), Tag::from("Poison"));
        assert_eq!(Tag::new("Poison").hash_value(), Tag::new("Poison").hash_value());
        assert_ne!(Tag::new("Poison"), Tag::new("Magic"));
    }

    #[test]
    fn collection_ignores_duplicates() {
        let mut tags = TagCollection::new();
        assert!(tags.insert(Tag::new("Magic")));
        assert!(!tags.insert(Tag::new("Magic")));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn union_combines_both_sides() {
        let debuffs: TagCollection = ["Magic", "Slow"].into_iter().collect();
        let dots: TagCollection = ["Poison", "Magic"].into_iter().collect();

        let all = debuffs.union(&dots);
        assert_eq!(all.len(), 3);
        assert!(all.contains_all(&debuffs));
        assert!(all.contains_all(&dots));

        let names: Vec<&str> = all.iter().map(Tag::name).collect();
        assert_eq!(names, ["Magic", "Slow", "Poison"]);
    }

    #[test]
    fn contains_any_needs_one_overlap() {
        let status: TagCollection = ["Magic", "Stun"].into_iter().collect();
        let cleanse: TagCollection = ["Poison", "Stun"].into_iter().collect();
        let unrelated: TagCollection = ["Bleed"].into_iter().collect();

        assert!(status.contains_any(&cleanse));
        assert!(!status.contains_any(&unrelated));
        assert!(!status.contains_any(&TagCollection::new()));
    }
}
