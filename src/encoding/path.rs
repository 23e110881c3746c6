//! Path tokens and their byte encoding.
//!
//! A path addresses a location in the logical tree, like a JSON pointer.
//!
//! # Binary Layout
//!
//! ```text
//! Name  := <utf-8 bytes> 0xFE
//! Index := 0xFE <i64 big-endian, 8 bytes> 0xFE
//! ```
//!
//! `0xFE` never appears in valid UTF-8, so a token that starts with the
//! separator is always an index. Names must be non-empty.

use super::error::{CodecError, CodecResult};
use std::fmt;

/// Reserved separator byte between path tokens.
pub const PATH_SEPARATOR: u8 = 0xFE;

/// Encoded size of an index token.
const INDEX_TOKEN_LEN: usize = 10;

/// One step into the tree: a map key or an array position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathToken {
    Name(String),
    Index(i64),
}

impl PathToken {
    pub fn name(name: impl Into<String>) -> Self {
        PathToken::Name(name.into())
    }

    pub fn index(index: usize) -> Self {
        PathToken::Index(index as i64)
    }
}

impl From<&str> for PathToken {
    fn from(value: &str) -> Self {
        PathToken::Name(value.to_string())
    }
}

impl From<String> for PathToken {
    fn from(value: String) -> Self {
        PathToken::Name(value)
    }
}

impl From<i64> for PathToken {
    fn from(value: i64) -> Self {
        PathToken::Index(value)
    }
}

impl fmt::Display for PathToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathToken::Name(name) => f.write_str(name),
            PathToken::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Append the encoded form of `tokens` to `out`.
pub fn encode_path(tokens: &[PathToken], out: &mut Vec<u8>) -> CodecResult<()> {
    for (depth, token) in tokens.iter().enumerate() {
        match token {
            PathToken::Name(name) => {
                if name.is_empty() {
                    return Err(CodecError::EmptyPathName { depth });
                }
                out.extend_from_slice(name.as_bytes());
                out.push(PATH_SEPARATOR);
            }
            PathToken::Index(i) => {
                out.push(PATH_SEPARATOR);
                out.extend_from_slice(&i.to_be_bytes());
                out.push(PATH_SEPARATOR);
            }
        }
    }
    Ok(())
}

/// Parse an encoded path back into tokens.
///
/// Index payloads are read as 8 raw bytes, so an index whose big-endian form
/// contains `0xFE` still parses correctly.
pub fn parse_path(bytes: &[u8]) -> CodecResult<Vec<PathToken>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] == PATH_SEPARATOR {
            if bytes.len() - pos < INDEX_TOKEN_LEN {
                return Err(CodecError::MalformedPath {
                    offset: pos,
                    message: "truncated index token",
                });
            }
            if bytes[pos + INDEX_TOKEN_LEN - 1] != PATH_SEPARATOR {
                return Err(CodecError::MalformedPath {
                    offset: pos,
                    message: "index token not terminated",
                });
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[pos + 1..pos + 9]);
            tokens.push(PathToken::Index(i64::from_be_bytes(raw)));
            pos += INDEX_TOKEN_LEN;
        } else {
            let Some(len) = bytes[pos..].iter().position(|&b| b == PATH_SEPARATOR) else {
                return Err(CodecError::MalformedPath {
                    offset: pos,
                    message: "name token not terminated",
                });
            };
            let name = std::str::from_utf8(&bytes[pos..pos + len]).map_err(|_| {
                CodecError::MalformedPath {
                    offset: pos,
                    message: "name token is not valid UTF-8",
                }
            })?;
            tokens.push(PathToken::Name(name.to_string()));
            pos += len + 1;
        }
    }

    Ok(tokens)
}

/// Render tokens as a dotted key. Indices are rendered in decimal, so a
/// key `"3"` and index `3` produce the same string.
pub fn join_path(tokens: &[PathToken]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        match token {
            PathToken::Name(name) => out.push_str(name),
            PathToken::Index(index) => out.push_str(&index.to_string()),
        }
    }
    out
}
