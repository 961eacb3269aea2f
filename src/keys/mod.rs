//! Byte-exact key layout shared by the ingest builder and the query
//! evaluator
//!
//! Every table layout lives here as a pair of pure encode/decode functions
//! so the contract can be round-trip tested in one place:
//!
//! | Table            | Row            | Family          | Qualifier                          |
//! |------------------|----------------|-----------------|------------------------------------|
//! | event            | shard id       | datatype\0uid   | field\0value                       |
//! | field index      | shard id       | `fi`\0field     | value\0datatype\0uid               |
//! | global index     | field value    | field name      | shard id\0datatype                 |
//! | reverse index    | reversed value | field name      | shard id\0datatype                 |
//! | term frequency   | shard id       | `tf`            | datatype\0uid\0value\0field        |
//! | term dictionary  | field value    | `for` / `rev`   | field name                         |
//!
//! Values may legally contain NUL bytes after normalization, so decoders
//! that recover a value component split from the fixed-arity end of the
//! qualifier, never from the front.

mod term_offsets;

pub use term_offsets::{TermOffset, TermOffsets};

use crate::error::{IndexError, Result};

/// Separator between key components.
pub const NULL: u8 = 0;

/// Column family prefix of field-index rows: `fi\0FIELD`.
pub const FIELD_INDEX_PREFIX: &[u8] = b"fi\x00";

/// Column family of term-frequency rows.
pub const TERM_FREQUENCY_FAMILY: &[u8] = b"tf";

/// Dictionary row labels for forward and reversed terms.
pub const DICTIONARY_FORWARD_LABEL: &[u8] = b"for";
pub const DICTIONARY_REVERSE_LABEL: &[u8] = b"rev";

fn join2(a: &str, b: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len() + b.len() + 1);
    out.extend_from_slice(a.as_bytes());
    out.push(NULL);
    out.extend_from_slice(b.as_bytes());
    out
}

/// Event row family: `datatype\0uid`.
pub fn event_family(data_type: &str, uid: &str) -> Vec<u8> {
    join2(data_type, uid)
}

/// Event row qualifier: `field\0value`.
pub fn event_qualifier(field: &str, value: &str) -> Vec<u8> {
    join2(field, value)
}

/// Field-index family: `fi\0field`.
pub fn field_index_family(field: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(FIELD_INDEX_PREFIX.len() + field.len());
    out.extend_from_slice(FIELD_INDEX_PREFIX);
    out.extend_from_slice(field.as_bytes());
    out
}

/// Field-index qualifier: `value\0datatype\0uid`.
pub fn field_index_qualifier(value: &str, data_type: &str, uid: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + data_type.len() + uid.len() + 2);
    out.extend_from_slice(value.as_bytes());
    out.push(NULL);
    out.extend_from_slice(data_type.as_bytes());
    out.push(NULL);
    out.extend_from_slice(uid.as_bytes());
    out
}

/// Global (and reverse) index qualifier: `shard\0datatype`.
pub fn global_index_qualifier(shard_id: &str, data_type: &str) -> Vec<u8> {
    join2(shard_id, data_type)
}

/// Term-frequency qualifier: `datatype\0uid\0value\0field`.
pub fn term_frequency_qualifier(data_type: &str, uid: &str, value: &str, field: &str) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(data_type.len() + uid.len() + value.len() + field.len() + 3);
    out.extend_from_slice(data_type.as_bytes());
    out.push(NULL);
    out.extend_from_slice(uid.as_bytes());
    out.push(NULL);
    out.extend_from_slice(value.as_bytes());
    out.push(NULL);
    out.extend_from_slice(field.as_bytes());
    out
}

fn utf8(bytes: &[u8], what: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| IndexError::InvalidData(format!("{what} is not valid UTF-8")))
}

fn split_once_at_null(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = bytes.iter().position(|&b| b == NULL)?;
    Some((&bytes[..pos], &bytes[pos + 1..]))
}

fn rsplit_once_at_null(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = bytes.iter().rposition(|&b| b == NULL)?;
    Some((&bytes[..pos], &bytes[pos + 1..]))
}

/// Split an event family back into (datatype, uid).
pub fn parse_event_family(family: &[u8]) -> Result<(String, String)> {
    let (data_type, uid) = split_once_at_null(family)
        .ok_or_else(|| IndexError::InvalidData("event family missing separator".into()))?;
    Ok((utf8(data_type, "datatype")?, utf8(uid, "uid")?))
}

/// Field name of a field-index family, or `None` for other families.
pub fn parse_field_index_family(family: &[u8]) -> Option<String> {
    family
        .strip_prefix(FIELD_INDEX_PREFIX)
        .and_then(|f| String::from_utf8(f.to_vec()).ok())
}

/// Split a field-index qualifier back into (value, datatype, uid).
///
/// The value may contain NULs; datatype and uid are recovered from the
/// right-hand end.
pub fn parse_field_index_qualifier(qualifier: &[u8]) -> Result<(String, String, String)> {
    let (rest, uid) = rsplit_once_at_null(qualifier)
        .ok_or_else(|| IndexError::InvalidData("field-index qualifier missing uid".into()))?;
    let (value, data_type) = rsplit_once_at_null(rest)
        .ok_or_else(|| IndexError::InvalidData("field-index qualifier missing datatype".into()))?;
    Ok((
        utf8(value, "field value")?,
        utf8(data_type, "datatype")?,
        utf8(uid, "uid")?,
    ))
}

/// Split a global-index qualifier back into (shard id, datatype).
pub fn parse_global_index_qualifier(qualifier: &[u8]) -> Result<(String, String)> {
    let (shard, data_type) = split_once_at_null(qualifier)
        .ok_or_else(|| IndexError::InvalidData("global-index qualifier missing separator".into()))?;
    Ok((utf8(shard, "shard id")?, utf8(data_type, "datatype")?))
}

/// Split a term-frequency qualifier back into (datatype, uid, value, field).
///
/// Datatype and uid split from the front, field from the back; whatever
/// remains in the middle is the value, NULs and all.
pub fn parse_term_frequency_qualifier(
    qualifier: &[u8],
) -> Result<(String, String, String, String)> {
    let (data_type, rest) = split_once_at_null(qualifier)
        .ok_or_else(|| IndexError::InvalidData("tf qualifier missing datatype".into()))?;
    let (uid, rest) = split_once_at_null(rest)
        .ok_or_else(|| IndexError::InvalidData("tf qualifier missing uid".into()))?;
    let (value, field) = rsplit_once_at_null(rest)
        .ok_or_else(|| IndexError::InvalidData("tf qualifier missing field".into()))?;
    Ok((
        utf8(data_type, "datatype")?,
        utf8(uid, "uid")?,
        utf8(value, "term value")?,
        utf8(field, "field")?,
    ))
}

/// Reverse a value for the reverse index (by char, not by byte, so
/// multi-byte values stay valid UTF-8).
pub fn reverse_value(value: &str) -> String {
    value.chars().rev().collect()
}
