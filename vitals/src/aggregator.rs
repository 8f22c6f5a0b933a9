// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Streaming dump of a subtree through bounded read buffers.
//!
//! An aggregator file renders every value leaf below its parent directory as
//! one `path/leaf:value` line. A read rarely fits the whole dump, so each
//! open handle carries a resumable cursor: the top-level sibling currently
//! being walked (pinned by refcount so removal cannot free it mid-stream)
//! and the number of lines of that sibling already emitted. Only whole
//! lines are ever handed to the consumer; when the next line does not fit,
//! the buffer is padded with spaces up to a final newline.
//!
//! The tree may change between reads. Siblings inserted or removed behind
//! the cursor are simply reflected in later reads; a cursor whose item got
//! detached ends the stream.

use crate::item::{Item, Node};
use crate::tree::{Tree, TreeInner};

use std::fmt::Write as _;

const PATH_MAX: usize = 120;
const SEQ_ERROR: &[u8] = b"error: non-sequential read\n";

enum Cursor {
    Start,
    At(u64),
    End,
}

enum Render {
    Fit,
    Overflow,
}

/// Per-open-handle stream state.
pub(crate) struct AggStream {
    parent: u64,
    cursor: Cursor,
    discard: usize,
    offset: u64,
    buf: Vec<u8>,
}

impl AggStream {
    /// `parent` is the aggregator's parent directory, already pinned by the
    /// open path.
    pub fn new(parent: u64) -> Self {
        Self {
            parent,
            cursor: Cursor::Start,
            discard: 0,
            offset: 0,
            buf: Vec::new(),
        }
    }

    /// Produce the next chunk of at most `size` bytes for a read at
    /// `offset`.
    pub fn read(&mut self, tree: &Tree, offset: i64, size: usize) -> &[u8] {
        self.buf.clear();
        if size == 0 {
            return &self.buf;
        }
        self.buf.reserve(size);

        let mut inner = tree.inner.lock();

        if let Cursor::End = self.cursor {
            return &self.buf;
        }

        if offset < 0 || offset as u64 != self.offset {
            // only sequential streaming is supported
            if let Cursor::At(ino) = self.cursor {
                inner.put_n(ino, 1);
            }
            self.cursor = Cursor::End;
            self.buf.extend_from_slice(SEQ_ERROR);
            self.buf.truncate(size);
            self.offset += self.buf.len() as u64;
            return &self.buf;
        }

        let start = match self.cursor {
            Cursor::Start => 0,
            Cursor::At(ino) => {
                inner.put_n(ino, 1);
                match position_of(&inner, self.parent, ino) {
                    Some(pos) => pos,
                    None => {
                        // the pinned sibling was detached while we were
                        // paused; treat as end of stream
                        self.cursor = Cursor::End;
                        return &self.buf;
                    }
                }
            }
            Cursor::End => return &self.buf,
        };

        let children: Vec<u64> = inner
            .arena
            .get(self.parent)
            .and_then(Item::as_dir)
            .map(|d| d.children.clone())
            .unwrap_or_default();

        let mut pos = start;
        while pos < children.len() {
            let sibling = children[pos];

            if inner
                .arena
                .get(sibling)
                .map_or(true, |item| item.is_aggregator())
            {
                pos += 1;
                self.discard = 0;
                continue;
            }

            let mut walked = 0;
            match render_subtree(
                &inner,
                sibling,
                String::new(),
                size,
                &mut walked,
                self.discard,
                &mut self.buf,
            ) {
                Render::Fit => {
                    self.discard = 0;
                    pos += 1;
                }
                Render::Overflow => {
                    if self.buf.is_empty() && walked == self.discard {
                        // a single line larger than the whole buffer; drop
                        // it so the stream keeps moving
                        self.discard = walked + 1;
                        continue;
                    }
                    pad(&mut self.buf, size);
                    self.discard = walked;
                    self.cursor = Cursor::At(sibling);
                    inner.get_mut_expect(sibling).refcount += 1;
                    self.offset += self.buf.len() as u64;
                    return &self.buf;
                }
            }
        }

        self.cursor = Cursor::End;
        self.offset += self.buf.len() as u64;
        &self.buf
    }

    /// Drop the cursor pin and the parent directory pin.
    pub fn release(&mut self, tree: &Tree) {
        let mut inner = tree.inner.lock();
        if let Cursor::At(ino) = self.cursor {
            inner.put_n(ino, 1);
            self.cursor = Cursor::End;
        }
        inner.put_n(self.parent, 1);
    }
}

fn position_of(inner: &TreeInner, parent: u64, child: u64) -> Option<usize> {
    if !inner.arena.get(child).map_or(false, |i| i.registered) {
        return None;
    }
    inner
        .arena
        .get(parent)?
        .as_dir()?
        .children
        .iter()
        .position(|&c| c == child)
}

/// Walk one top-level sibling, appending whole `path/leaf:value` lines.
/// `walked` counts the leaf lines passed over, including the first
/// `discard` which were emitted by earlier reads and are skipped.
fn render_subtree(
    inner: &TreeInner,
    ino: u64,
    path: String,
    cap: usize,
    walked: &mut usize,
    discard: usize,
    out: &mut Vec<u8>,
) -> Render {
    let Some(item) = inner.arena.get(ino) else {
        return Render::Fit;
    };

    match &item.node {
        Node::Aggregator => Render::Fit,
        Node::Value(value) => {
            if *walked < discard {
                *walked += 1;
                return Render::Fit;
            }

            let mut line = String::new();
            if path.is_empty() {
                let _ = write!(line, "{}:", item.name);
            } else {
                let _ = write!(line, "{}/{}:", path, item.name);
            }
            (value.read)(value.tag, &mut line);

            if out.len() + line.len() > cap {
                return Render::Overflow;
            }
            out.extend_from_slice(line.as_bytes());
            *walked += 1;
            Render::Fit
        }
        Node::Directory(dir) => {
            if !item.registered {
                return Render::Fit;
            }

            let mut child_path = if path.is_empty() {
                item.name.to_string()
            } else {
                format!("{}/{}", path, item.name)
            };
            child_path.truncate(PATH_MAX);

            for &child in &dir.children {
                if let Render::Overflow = render_subtree(
                    inner,
                    child,
                    child_path.clone(),
                    cap,
                    walked,
                    discard,
                    out,
                ) {
                    return Render::Overflow;
                }
            }
            Render::Fit
        }
    }
}

/// Space-fill so the chunk ends at byte `size - 1` with a newline and the
/// consumer only ever sees whole lines.
fn pad(buf: &mut Vec<u8>, size: usize) {
    while buf.len() + 1 < size {
        buf.push(b' ');
    }
    if buf.len() < size {
        buf.push(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::{u64_decimal, Simple};
    use crate::tree::OpenKind;

    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    fn shared(v: u64) -> Arc<AtomicU64> {
        Arc::new(AtomicU64::new(v))
    }

    fn streaming_tree() -> (Tree, u64) {
        let tree = Tree::new();
        let d = tree.create_directory(None, "d").unwrap();
        tree.create_simple(
            Some(d),
            vec![
                Simple::new("a", u64_decimal(&shared(1))),
                Simple::new("b", u64_decimal(&shared(2))),
            ],
        )
        .unwrap();
        let all = tree.create_aggregator(Some(d), "all").unwrap();
        (tree, all.ino)
    }

    fn open_stream(tree: &Tree, aggregator: u64) -> AggStream {
        match tree.fs_open(aggregator, true).unwrap() {
            OpenKind::Aggregator { parent } => AggStream::new(parent),
            OpenKind::Value => panic!("expected aggregator"),
        }
    }

    #[test]
    fn single_read() {
        let (tree, all) = streaming_tree();
        let mut stream = open_stream(&tree, all);

        assert_eq!(stream.read(&tree, 0, 4096), b"a:1\nb:2\n");
        assert_eq!(stream.read(&tree, 8, 4096), b"");
        stream.release(&tree);
    }

    #[test]
    fn bounded_reads_compose() {
        let (tree, all) = streaming_tree();
        let mut stream = open_stream(&tree, all);

        let first = stream.read(&tree, 0, 6).to_vec();
        assert_eq!(first, b"a:1\n \n");
        let second = stream.read(&tree, 6, 6).to_vec();
        assert_eq!(second, b"b:2\n");
        assert_eq!(stream.read(&tree, 10, 6), b"");

        let combined = [first, second].concat();
        let composed: Vec<&str> = std::str::from_utf8(&combined)
            .unwrap()
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        assert_eq!(composed, vec!["a:1", "b:2"]);
        stream.release(&tree);
    }

    #[test]
    fn nested_directories_resume_mid_sibling() {
        let tree = Tree::new();
        let d = tree.create_directory(None, "d").unwrap();
        let sub = tree.create_directory(Some(d), "sub").unwrap();
        tree.create_simple(
            Some(sub),
            vec![
                Simple::new("x", u64_decimal(&shared(1))),
                Simple::new("y", u64_decimal(&shared(2))),
                Simple::new("z", u64_decimal(&shared(3))),
            ],
        )
        .unwrap();
        let all = tree.create_aggregator(Some(d), "all").unwrap();
        let mut stream = open_stream(&tree, all.ino);

        // each line is 8 bytes; a 9-byte buffer fits exactly one
        let mut composed = Vec::new();
        let mut offset = 0;
        loop {
            let chunk = stream.read(&tree, offset, 9).to_vec();
            if chunk.is_empty() {
                break;
            }
            offset += chunk.len() as i64;
            composed.extend_from_slice(&chunk);
        }

        let lines: Vec<&str> = std::str::from_utf8(&composed)
            .unwrap()
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        assert_eq!(lines, vec!["sub/x:1", "sub/y:2", "sub/z:3"]);
        stream.release(&tree);
    }

    #[test]
    fn detached_cursor_ends_stream() {
        let tree = Tree::new();
        let d = tree.create_directory(None, "d").unwrap();
        let sub = tree.create_directory(Some(d), "sub").unwrap();
        tree.create_simple(
            Some(sub),
            vec![
                Simple::new("x", u64_decimal(&shared(1))),
                Simple::new("y", u64_decimal(&shared(2))),
            ],
        )
        .unwrap();
        let all = tree.create_aggregator(Some(d), "all").unwrap();
        let mut stream = open_stream(&tree, all.ino);

        let first = stream.read(&tree, 0, 9).to_vec();
        assert_eq!(&first[..8], b"sub/x:1\n");

        tree.remove(sub);
        assert_eq!(stream.read(&tree, first.len() as i64, 9), b"");
        stream.release(&tree);
    }

    #[test]
    fn non_sequential_read_errors_out() {
        let (tree, all) = streaming_tree();
        let mut stream = open_stream(&tree, all);

        assert_eq!(stream.read(&tree, 4, 4096), SEQ_ERROR);
        // the stream is terminated regardless of further offsets
        assert_eq!(stream.read(&tree, 0, 4096), b"");
        stream.release(&tree);
    }

    #[test]
    fn siblings_created_behind_cursor_appear() {
        let (tree, all) = streaming_tree();
        let d = tree.lookup_item(None, "d").unwrap();
        let mut stream = open_stream(&tree, all);

        let first = stream.read(&tree, 0, 6).to_vec();
        assert_eq!(first, b"a:1\n \n");

        tree.create_simple(Some(d), vec![Simple::new("c", u64_decimal(&shared(3)))])
            .unwrap();

        let mut composed = first;
        let mut offset = composed.len() as i64;
        loop {
            let chunk = stream.read(&tree, offset, 6).to_vec();
            if chunk.is_empty() {
                break;
            }
            offset += chunk.len() as i64;
            composed.extend_from_slice(&chunk);
        }

        let lines: Vec<&str> = std::str::from_utf8(&composed)
            .unwrap()
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        assert_eq!(lines, vec!["a:1", "b:2", "c:3"]);
        stream.release(&tree);
    }

    #[test]
    fn oversized_line_is_dropped() {
        let tree = Tree::new();
        let d = tree.create_directory(None, "d").unwrap();
        tree.create_simple(
            Some(d),
            vec![
                Simple::new("averylongstatisticname", u64_decimal(&shared(1))),
                Simple::new("b", u64_decimal(&shared(2))),
            ],
        )
        .unwrap();
        let all = tree.create_aggregator(Some(d), "all").unwrap();
        let mut stream = open_stream(&tree, all.ino);

        // the first line cannot fit in 8 bytes at all; the stream must
        // still make progress and deliver the second
        let mut composed = Vec::new();
        let mut offset = 0;
        loop {
            let chunk = stream.read(&tree, offset, 8).to_vec();
            if chunk.is_empty() {
                break;
            }
            offset += chunk.len() as i64;
            composed.extend_from_slice(&chunk);
        }
        let lines: Vec<&str> = std::str::from_utf8(&composed)
            .unwrap()
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        assert_eq!(lines, vec!["b:2"]);
        stream.release(&tree);
    }
}
