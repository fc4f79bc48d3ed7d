//! Byte encoding of a [`BookmarkCollection`].
//!
//! Layout:
//!
//! ```text
//! shaare-store 1\n
//! sha256 <64 hex chars> <body length>\n
//! <JSON body>
//! ```
//!
//! The header makes truncation and bit rot detectable on load: the body length
//! and its SHA-256 digest must both match before the JSON is parsed.

use std::collections::HashSet;
use std::fmt;

use ring::digest::{digest, SHA256};
use serde::{Deserialize, Serialize};

use crate::types::bookmark::Bookmark;
use crate::types::collection::BookmarkCollection;
use crate::types::errors::StoreError;

const MAGIC: &str = "shaare-store";
const FORMAT_VERSION: u32 = 1;

/// Why a byte sequence could not be decoded.
#[derive(Debug, PartialEq)]
pub enum CodecError {
    /// Missing or malformed header line.
    BadHeader(String),
    /// The body is shorter or longer than the header announces.
    LengthMismatch { expected: usize, actual: usize },
    /// The body digest differs from the header's.
    ChecksumMismatch,
    /// The body is not a valid collection document.
    Json(String),
    /// The document parsed but breaks a collection invariant.
    Invariant(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::BadHeader(msg) => write!(f, "bad header: {}", msg),
            CodecError::LengthMismatch { expected, actual } => write!(
                f,
                "truncated or padded body: expected {} bytes, found {}",
                expected, actual
            ),
            CodecError::ChecksumMismatch => write!(f, "checksum mismatch"),
            CodecError::Json(msg) => write!(f, "malformed body: {}", msg),
            CodecError::Invariant(msg) => write!(f, "invalid content: {}", msg),
        }
    }
}

impl std::error::Error for CodecError {}

#[derive(Serialize)]
struct StoredCollectionRef<'a> {
    next_id: u64,
    bookmarks: Vec<&'a Bookmark>,
}

#[derive(Deserialize)]
struct StoredCollection {
    next_id: u64,
    bookmarks: Vec<Bookmark>,
}

/// Encodes a collection, validating every record and re-decoding the output.
///
/// # Errors
/// `InvalidBookmark` if a record is not persistable, `InvalidWritableData` if
/// the produced bytes are empty or do not decode back to `collection`.
pub fn encode(collection: &BookmarkCollection) -> Result<Vec<u8>, StoreError> {
    for bookmark in collection.iter() {
        bookmark.validate()?;
    }

    let stored = StoredCollectionRef {
        next_id: collection.next_id,
        bookmarks: collection.iter().collect(),
    };
    let body = serde_json::to_vec(&stored)
        .map_err(|e| StoreError::InvalidWritableData(format!("serialization failed: {}", e)))?;
    if body.is_empty() {
        return Err(StoreError::InvalidWritableData(
            "serializer produced no data".to_string(),
        ));
    }

    let mut out = Vec::with_capacity(body.len() + 96);
    out.extend_from_slice(format!("{} {}\n", MAGIC, FORMAT_VERSION).as_bytes());
    out.extend_from_slice(format!("sha256 {} {}\n", hex_digest(&body), body.len()).as_bytes());
    out.extend_from_slice(&body);

    match decode(&out) {
        Ok(ref decoded) if decoded == collection => Ok(out),
        Ok(_) => Err(StoreError::InvalidWritableData(
            "encoded data does not decode to the same collection".to_string(),
        )),
        Err(e) => Err(StoreError::InvalidWritableData(format!(
            "encoded data failed self-check: {}",
            e
        ))),
    }
}

/// Decodes bytes produced by [`encode`]. Never returns a partial collection.
pub fn decode(bytes: &[u8]) -> Result<BookmarkCollection, CodecError> {
    let (magic_line, rest) = split_line(bytes)?;
    let (digest_line, body) = split_line(rest)?;

    let mut magic = magic_line.split(' ');
    match (magic.next(), magic.next().map(str::parse::<u32>), magic.next()) {
        (Some(MAGIC), Some(Ok(FORMAT_VERSION)), None) => {}
        (Some(MAGIC), Some(Ok(v)), None) => {
            return Err(CodecError::BadHeader(format!("unsupported version {}", v)))
        }
        _ => return Err(CodecError::BadHeader(format!("unknown magic {:?}", magic_line))),
    }

    let mut parts = digest_line.split(' ');
    let (expected_digest, expected_len) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("sha256"), Some(hex), Some(len), None) => {
            let len = len
                .parse::<usize>()
                .map_err(|_| CodecError::BadHeader(format!("bad length {:?}", len)))?;
            (hex, len)
        }
        _ => return Err(CodecError::BadHeader(format!("bad digest line {:?}", digest_line))),
    };

    if body.len() != expected_len {
        return Err(CodecError::LengthMismatch {
            expected: expected_len,
            actual: body.len(),
        });
    }
    if hex_digest(body) != expected_digest {
        return Err(CodecError::ChecksumMismatch);
    }

    let stored: StoredCollection =
        serde_json::from_slice(body).map_err(|e| CodecError::Json(e.to_string()))?;

    let mut collection = BookmarkCollection::new();
    collection.next_id = stored.next_id;
    let mut codes = HashSet::new();
    for bookmark in stored.bookmarks {
        bookmark
            .validate()
            .map_err(|e| CodecError::Invariant(e.to_string()))?;
        if !codes.insert(bookmark.short_code.clone()) {
            return Err(CodecError::Invariant(format!(
                "duplicate short code {}",
                bookmark.short_code
            )));
        }
        let id = bookmark.id;
        if collection.bookmarks.insert(id, bookmark).is_some() {
            return Err(CodecError::Invariant(format!("duplicate id {}", id)));
        }
    }
    if let Some(max) = collection.max_id() {
        if collection.next_id <= max {
            return Err(CodecError::Invariant(format!(
                "next id {} is not above the highest id {}",
                collection.next_id, max
            )));
        }
    }
    Ok(collection)
}

fn split_line(bytes: &[u8]) -> Result<(&str, &[u8]), CodecError> {
    let pos = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| CodecError::BadHeader("missing header line".to_string()))?;
    let line = std::str::from_utf8(&bytes[..pos])
        .map_err(|_| CodecError::BadHeader("header is not UTF-8".to_string()))?;
    Ok((line, &bytes[pos + 1..]))
}

fn hex_digest(data: &[u8]) -> String {
    digest(&SHA256, data)
        .as_ref()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
