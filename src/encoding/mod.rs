//! Binary tree codec
//!
//! Flattens nested result trees into a stream of length-prefixed
//! path/value frames, and reads such streams back into a flat table keyed by
//! dotted path. Neither side ever holds the whole tree.
//!
//! # Frame Layout
//!
//! ```text
//! [u32 LE path length][path bytes][u32 LE value length][value bytes]
//! ```
//!
//! There is no end marker; a stream ends where a length prefix cannot be
//! read. See [`path`] for path bytes and [`value`] for value bytes.
//!
//! # Example
//!
//! ```
//! use trackstream::encoding::{decode_slice, encode_to_vec, Tree, ValueNode};
//!
//! let tree = Tree::map().with("loss", Tree::numeric(vec![1.0, 0.5]));
//! let bytes = encode_to_vec(&tree).unwrap();
//! let decoded = decode_slice(&bytes).unwrap();
//! assert_eq!(decoded.table["loss"], ValueNode::NumericBlock(vec![1.0, 0.5]));
//! ```

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod path;
pub mod tree;
pub mod value;

pub use decoder::{decode_slice, read_frames, DecodedStream, DecodedTable, Decoder, Frame, FrameReader};
pub use encoder::{encode_to_vec, TreeEncoder};
pub use error::{CodecError, CodecResult};
pub use path::{encode_path, join_path, parse_path, PathToken, PATH_SEPARATOR};
pub use tree::Tree;
pub use value::{ValueNode, ARRAY_SENTINEL, OBJECT_SENTINEL};
