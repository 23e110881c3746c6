//! Streaming tree encoder.
//!
//! Trees are flattened depth-first, pre-order, into frames written straight
//! to the sink. The encoder keeps only the current path and two scratch
//! buffers, so memory does not grow with the size of the stream.

use super::error::{CodecError, CodecResult};
use super::path::{encode_path, PathToken};
use super::tree::Tree;
use super::value::ValueNode;
use std::io::Write;

/// Writes frames for trees to an underlying sink.
#[derive(Debug)]
pub struct TreeEncoder<W: Write> {
    writer: W,
    path: Vec<PathToken>,
    path_buf: Vec<u8>,
    value_buf: Vec<u8>,
    frames_written: u64,
    bytes_written: u64,
}

impl<W: Write> TreeEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            path: Vec::with_capacity(8),
            path_buf: Vec::with_capacity(64),
            value_buf: Vec::with_capacity(256),
            frames_written: 0,
            bytes_written: 0,
        }
    }

    /// Encode a whole tree rooted at the empty path.
    pub fn encode(&mut self, tree: &Tree) -> CodecResult<()> {
        self.encode_at(&[], tree)
    }

    /// Encode `tree` as the subtree found at `prefix`.
    ///
    /// Used to append one element of a container that was opened by an
    /// earlier frame, without re-encoding its siblings.
    pub fn encode_at(&mut self, prefix: &[PathToken], tree: &Tree) -> CodecResult<()> {
        self.path.clear();
        self.path.extend_from_slice(prefix);
        self.encode_node(tree)
    }

    /// Write a single frame.
    pub fn write_frame(&mut self, path: &[PathToken], value: &ValueNode) -> CodecResult<()> {
        self.path_buf.clear();
        encode_path(path, &mut self.path_buf)?;
        self.emit(value)
    }

    pub fn flush(&mut self) -> CodecResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn encode_node(&mut self, tree: &Tree) -> CodecResult<()> {
        match tree {
            Tree::Leaf(value) => {
                if value.is_marker() {
                    return Err(CodecError::UnsupportedValue(
                        "container markers are emitted structurally",
                    ));
                }
                self.write_current(value)
            }
            Tree::Array(items) => {
                self.write_current(&ValueNode::ArrayMarker)?;
                for (i, item) in items.iter().enumerate() {
                    self.path.push(PathToken::index(i));
                    self.encode_node(item)?;
                    self.path.pop();
                }
                Ok(())
            }
            Tree::Map(entries) => {
                if entries.is_empty() {
                    return self.write_current(&ValueNode::ObjectMarker);
                }
                for (key, value) in entries {
                    self.path.push(PathToken::Name(key.clone()));
                    self.encode_node(value)?;
                    self.path.pop();
                }
                Ok(())
            }
        }
    }

    fn write_current(&mut self, value: &ValueNode) -> CodecResult<()> {
        self.path_buf.clear();
        encode_path(&self.path, &mut self.path_buf)?;
        self.emit(value)
    }

    /// Write `path_buf` and `value` as one frame.
    fn emit(&mut self, value: &ValueNode) -> CodecResult<()> {
        self.value_buf.clear();
        value.encode_into(&mut self.value_buf);

        let path_len = field_len(self.path_buf.len())?;
        let value_len = field_len(self.value_buf.len())?;

        self.writer.write_all(&path_len.to_le_bytes())?;
        self.writer.write_all(&self.path_buf)?;
        self.writer.write_all(&value_len.to_le_bytes())?;
        self.writer.write_all(&self.value_buf)?;

        self.frames_written += 1;
        self.bytes_written += 8 + self.path_buf.len() as u64 + self.value_buf.len() as u64;
        Ok(())
    }
}

fn field_len(len: usize) -> CodecResult<u32> {
    u32::try_from(len).map_err(|_| CodecError::UnsupportedValue("field longer than u32::MAX bytes"))
}

/// Encode a tree into a fresh byte vector.
pub fn encode_to_vec(tree: &Tree) -> CodecResult<Vec<u8>> {
    let mut encoder = TreeEncoder::new(Vec::new());
    encoder.encode(tree)?;
    Ok(encoder.into_inner())
}
