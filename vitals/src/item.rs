// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::formatter::{ReadFormatter, WriteFormatter};

use std::sync::Arc;

use vitals_stats::{HistogramU32, SeriesU64};

/// Opaque handle to a node in a statistics tree.
///
/// Handles stay valid for the lifetime of the tree that issued them; a
/// handle to a removed item simply stops resolving.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ItemId {
    pub(crate) token: u32,
    pub(crate) ino: u64,
}

/// `h = 31 * h + byte`, matching the hash stored alongside every name.
pub(crate) fn name_hash(name: &str) -> u32 {
    let mut hash: u32 = 0;
    for byte in name.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(byte as u32);
    }
    hash
}

/// Child names are non-empty and restricted to `[A-Za-z0-9._-]`.
pub(crate) fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
}

pub(crate) struct Item {
    pub name: Box<str>,
    pub name_hash: u32,
    pub parent: Option<u64>,
    /// The tree's own reference plus one per open handle, pinned aggregator
    /// cursor, and unforgotten kernel lookup.
    pub refcount: u64,
    /// Outstanding kernel lookups; bounds what forget may release.
    pub nlookup: u64,
    pub registered: bool,
    pub node: Node,
}

pub(crate) enum Node {
    Directory(Directory),
    Value(ValueFile),
    Aggregator,
}

pub(crate) struct Directory {
    /// Insertion-ordered; names are unique within a directory.
    pub children: Vec<u64>,
    pub kind: DirKind,
}

/// What a directory represents beyond grouping. Series and histogram
/// directories keep their accumulator alive for as long as the directory
/// exists.
pub(crate) enum DirKind {
    Plain,
    Series(Arc<SeriesU64>),
    Histogram(Arc<HistogramU32>),
}

pub(crate) struct ValueFile {
    pub tag: u64,
    pub read: ReadFormatter,
    pub write: Option<WriteFormatter>,
}

impl Item {
    pub fn new(name: &str, node: Node) -> Self {
        Self {
            name: name.into(),
            name_hash: name_hash(name),
            parent: None,
            refcount: 0,
            nlookup: 0,
            registered: false,
            node,
        }
    }

    pub fn directory(name: &str, kind: DirKind) -> Self {
        Self::new(
            name,
            Node::Directory(Directory {
                children: Vec::new(),
                kind,
            }),
        )
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.node, Node::Directory(_))
    }

    pub fn is_aggregator(&self) -> bool {
        matches!(self.node, Node::Aggregator)
    }

    pub fn writable(&self) -> bool {
        matches!(&self.node, Node::Value(v) if v.write.is_some())
    }

    pub fn as_dir(&self) -> Option<&Directory> {
        match &self.node {
            Node::Directory(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dir_mut(&mut self) -> Option<&mut Directory> {
        match &mut self.node {
            Node::Directory(d) => Some(d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_reference() {
        // 31-based rolling hash: "ab" = 31 * 'a' + 'b'
        assert_eq!(name_hash("ab"), 31 * 97 + 98);
        assert_eq!(name_hash(""), 0);
        assert_ne!(name_hash("sum"), name_hash("mus"));
    }

    #[test]
    fn name_validity() {
        assert!(valid_name("stat4"));
        assert!(valid_name("a.b-c_d"));
        assert!(valid_name("99.99"));
        assert!(!valid_name(""));
        assert!(!valid_name("a/b"));
        assert!(!valid_name("value_90%"));
        assert!(!valid_name("with space"));
    }
}
