//! # trackstream: streaming data plane for experiment tracking
//!
//! Turns sorted metric, run and artifact rows into a framed binary tree
//! stream that an interactive client can decode incrementally. Nothing is
//! materialized beyond one open group per stream.
//!
//! ## Architecture
//!
//! - **Encoding**: the path/value frame codec ([`encoding`])
//! - **Streaming**: row grouping, alignment and progress engines ([`stream`])
//! - **Communication**: any `std::io::Write` sink, or a bounded crossbeam
//!   channel via [`stream::ChannelSink`]
//!
//! ## Configuration
//!
//! Engine settings are read from `trackstream/config.toml` in the platform
//! config directory, or from a file passed explicitly. See [`config`].
//!
//! ## Example
//!
//! ```
//! use std::collections::HashMap;
//! use std::convert::Infallible;
//! use trackstream::{
//!     config::StreamConfig, decode_slice, MetricRow, MetricStreamer, RunProps, ValueNode,
//! };
//!
//! let mut runs = HashMap::new();
//! runs.insert("A".to_string(), RunProps::new("baseline").into_entry(0));
//!
//! let rows = vec![
//!     MetricRow::new("A", "loss", 0, 1.0),
//!     MetricRow::new("A", "loss", 1, 0.5),
//! ];
//!
//! let config = StreamConfig::default();
//! let mut out = Vec::new();
//! MetricStreamer::new(&runs, &config)
//!     .stream(rows.into_iter().map(Ok::<_, Infallible>), &mut out)
//!     .unwrap();
//!
//! let table = decode_slice(&out).unwrap().table;
//! assert_eq!(table["A.traces.0.values"], ValueNode::NumericBlock(vec![1.0, 0.5]));
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod stream;
pub mod types;

// Re-export commonly used types
pub use config::StreamConfig;
pub use encoding::{decode_slice, encode_to_vec, CodecError, PathToken, Tree, TreeEncoder, ValueNode};
pub use error::{Result, StreamError};
pub use stream::{AlignmentIndex, AlignmentResolver, ArtifactStreamer, MetricStreamer, StreamSummary};
pub use types::{ArtifactRow, MetricRow, RunEntry, RunLookup, RunProps, RunSummary};
