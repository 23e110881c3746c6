//! Streaming decoder.
//!
//! [`FrameReader`] yields structured frames one at a time. [`Decoder`] builds
//! the client's view on top of it: a flat table keyed by dotted path, filled
//! either object by object ([`Decoder::next_object`]) or all at once
//! ([`Decoder::decode`]).
//!
//! A clean end of stream is a length-prefix read that returns no bytes at
//! all. Running out of bytes anywhere else is reported as an
//! `UnexpectedEof` I/O error.

use super::error::CodecResult;
use super::path::{join_path, parse_path, PathToken};
use super::value::ValueNode;
use std::collections::BTreeMap;
use std::io::{self, BufReader, Read};

/// Flat view of a decoded stream: dotted path to leaf value.
pub type DecodedTable = BTreeMap<String, ValueNode>;

/// One decoded path/value pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub path: Vec<PathToken>,
    pub value: ValueNode,
}

impl Frame {
    pub fn new(path: Vec<PathToken>, value: ValueNode) -> Self {
        Self { path, value }
    }

    pub fn dotted_path(&self) -> String {
        join_path(&self.path)
    }

    /// First path component as rendered in the dotted key.
    pub fn root_key(&self) -> String {
        self.path.first().map(|t| t.to_string()).unwrap_or_default()
    }
}

/// Reads length-prefixed frames from a byte source.
#[derive(Debug)]
pub struct FrameReader<R: Read> {
    reader: R,
    frames_read: u64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            frames_read: 0,
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Read the next frame, or `None` at a clean end of stream.
    pub fn next_frame(&mut self) -> CodecResult<Option<Frame>> {
        let Some(path_bytes) = self.read_field()? else {
            return Ok(None);
        };
        let path = parse_path(&path_bytes)?;

        let value_bytes = self
            .read_field()?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "missing value field"))?;
        let value = ValueNode::decode(&value_bytes)?;

        self.frames_read += 1;
        Ok(Some(Frame::new(path, value)))
    }

    fn read_field(&mut self) -> CodecResult<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        let mut filled = 0;
        while filled < len_buf.len() {
            match self.reader.read(&mut len_buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < len_buf.len() {
            return Err(
                io::Error::new(io::ErrorKind::UnexpectedEof, "truncated length prefix").into(),
            );
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        // Grow with the data actually present rather than trusting the prefix.
        let mut data = Vec::with_capacity(len.min(64 * 1024));
        (&mut self.reader).take(len as u64).read_to_end(&mut data)?;
        if data.len() < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("field declared {} bytes, got {}", len, data.len()),
            )
            .into());
        }
        Ok(Some(data))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = CodecResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

/// Result of decoding a whole stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedStream {
    pub table: DecodedTable,
    /// Dotted keys that were written more than once, in encounter order.
    pub duplicates: Vec<String>,
}

/// Decodes a stream into dotted-key tables.
#[derive(Debug)]
pub struct Decoder<R: Read> {
    frames: FrameReader<BufReader<R>>,
    pending: Option<Frame>,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            frames: FrameReader::new(BufReader::new(reader)),
            pending: None,
        }
    }

    /// Decode the next run of frames sharing the same top-level key.
    ///
    /// Streams written by this crate put one run (or one progress record)
    /// under each top-level key, so this yields them as they complete.
    pub fn next_object(&mut self) -> CodecResult<Option<(String, DecodedTable)>> {
        let first = match self.pending.take() {
            Some(frame) => frame,
            None => match self.frames.next_frame()? {
                Some(frame) => frame,
                None => return Ok(None),
            },
        };

        let root = first.root_key();
        let mut table = DecodedTable::new();
        table.insert(first.dotted_path(), first.value);

        while let Some(frame) = self.frames.next_frame()? {
            if frame.root_key() != root {
                self.pending = Some(frame);
                break;
            }
            table.insert(frame.dotted_path(), frame.value);
        }

        Ok(Some((root, table)))
    }

    /// Decode everything that remains into one table.
    pub fn decode(mut self) -> CodecResult<DecodedStream> {
        let mut out = DecodedStream::default();
        if let Some(frame) = self.pending.take() {
            out.insert(frame);
        }
        while let Some(frame) = self.frames.next_frame()? {
            out.insert(frame);
        }
        Ok(out)
    }
}

impl DecodedStream {
    fn insert(&mut self, frame: Frame) {
        let key = frame.dotted_path();
        if self.table.contains_key(&key) {
            self.duplicates.push(key.clone());
        }
        self.table.insert(key, frame.value);
    }
}

/// Decode a complete in-memory stream.
pub fn decode_slice(bytes: &[u8]) -> CodecResult<DecodedStream> {
    Decoder::new(bytes).decode()
}

/// Collect every frame of an in-memory stream, keeping structured paths.
pub fn read_frames(bytes: &[u8]) -> CodecResult<Vec<Frame>> {
    FrameReader::new(bytes).collect()
}
