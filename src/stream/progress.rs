//! Progress frames
//!
//! When a request opts in, the engines interleave `progress_<n>` frames
//! carrying `[remaining, total]` between runs. Reporting is decided once per
//! request: a disabled reporter never writes anything.
//!
//! Sequence numbers start at 0 and increase by one per frame. `remaining` is
//! clamped so it never rises between frames and never leaves `0..=total`,
//! and [`ProgressReporter::finish`] always reports 0.

use crate::encoding::{CodecResult, Tree, TreeEncoder};
use std::io::Write;

/// Key prefix for progress frames
pub const PROGRESS_PREFIX: &str = "progress_";

/// One emitted progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub sequence: u64,
    pub remaining: i64,
    pub total: i64,
}

impl ProgressState {
    pub fn key(&self) -> String {
        format!("{}{}", PROGRESS_PREFIX, self.sequence)
    }

    pub fn to_tree(&self) -> Tree {
        Tree::keyed(self.key(), Tree::int_array([self.remaining, self.total]))
    }
}

/// Writes progress frames for one request.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    enabled: bool,
    total: i64,
    next_sequence: u64,
    last_remaining: i64,
}

impl ProgressReporter {
    pub fn new(enabled: bool, total: i64) -> Self {
        let total = total.max(0);
        Self {
            enabled,
            total,
            next_sequence: 0,
            last_remaining: total,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, 0)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    /// Last reported (or initial) remaining count.
    pub fn last_remaining(&self) -> i64 {
        self.last_remaining
    }

    pub fn frames_emitted(&self) -> u64 {
        self.next_sequence
    }

    /// Emit a frame reporting `remaining` units still to stream.
    pub fn report<W: Write>(
        &mut self,
        encoder: &mut TreeEncoder<W>,
        remaining: i64,
    ) -> CodecResult<Option<ProgressState>> {
        if !self.enabled {
            return Ok(None);
        }

        let remaining = remaining.clamp(0, self.last_remaining);
        let state = ProgressState {
            sequence: self.next_sequence,
            remaining,
            total: self.total,
        };
        encoder.encode(&state.to_tree())?;

        self.next_sequence += 1;
        self.last_remaining = remaining;
        Ok(Some(state))
    }

    /// Emit a frame after `done` units out of `total` have been streamed.
    pub fn report_done<W: Write>(
        &mut self,
        encoder: &mut TreeEncoder<W>,
        done: i64,
    ) -> CodecResult<Option<ProgressState>> {
        self.report(encoder, self.total - done)
    }

    /// Emit the terminal frame.
    pub fn finish<W: Write>(
        &mut self,
        encoder: &mut TreeEncoder<W>,
    ) -> CodecResult<Option<ProgressState>> {
        self.report(encoder, 0)
    }
}

/// Parse a top-level key of the form `progress_<n>`.
pub fn parse_progress_key(key: &str) -> Option<u64> {
    key.strip_prefix(PROGRESS_PREFIX)?.parse().ok()
}
