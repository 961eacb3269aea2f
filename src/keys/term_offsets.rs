//! Term-frequency value codec: gap-encoded term positions
//!
//! A term-frequency row's value is the ordered list of positions at which
//! one term occurred in one field of one record. Positions are stored as
//! varint gaps from the previous position, each followed by a varint skip
//! used by multi-token synonyms (the synonym spans `skip + 1` underlying
//! tokens, so its match range starts at `offset - skip`).
//!
//! Layout: `varint(count)` then `count` × (`varint(gap)`, `varint(skip)`).

use crate::error::{IndexError, Result};

/// One decoded term position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TermOffset {
    /// End offset of the term occurrence
    pub offset: u32,

    /// Tokens spanned before `offset` by a multi-token synonym; zero for
    /// plain terms
    pub skip: u32,
}

impl TermOffset {
    pub fn at(offset: u32) -> Self {
        Self { offset, skip: 0 }
    }

    pub fn spanning(offset: u32, skip: u32) -> Self {
        Self { offset, skip }
    }

    /// First token position covered by this occurrence.
    pub fn low_offset(&self) -> u32 {
        self.offset.saturating_sub(self.skip)
    }
}

/// Ordered positions of one (term, field) pair within one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermOffsets {
    positions: Vec<TermOffset>,
}

impl TermOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_offsets(offsets: impl IntoIterator<Item = u32>) -> Self {
        Self {
            positions: offsets.into_iter().map(TermOffset::at).collect(),
        }
    }

    /// Append a position. The tokenizer produces positions in
    /// non-decreasing order; this is not enforced here because merged rows
    /// are re-sorted on the read side.
    pub fn push(&mut self, position: TermOffset) {
        self.positions.push(position);
    }

    pub fn positions(&self) -> &[TermOffset] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.positions.windows(2).all(|w| w[0].offset <= w[1].offset)
    }

    /// Merge another row's positions into this one, keeping sorted order.
    ///
    /// The ingest offset cache can overflow and emit more than one row for
    /// the same (term, field, record); readers must union them.
    pub fn merge(&mut self, other: &TermOffsets) {
        self.positions.extend_from_slice(&other.positions);
        self.positions.sort_unstable();
        self.positions.dedup();
    }

    /// Encode to the gap+skip wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + self.positions.len() * 2);
        write_varint(&mut buf, self.positions.len() as u64);
        let mut prev = 0u32;
        for position in &self.positions {
            // Gaps are unsigned; an out-of-order writer would corrupt the
            // stream, so clamp against the running maximum.
            let gap = position.offset.saturating_sub(prev);
            write_varint(&mut buf, gap as u64);
            write_varint(&mut buf, position.skip as u64);
            prev = prev.max(position.offset);
        }
        buf
    }

    /// Decode from the gap+skip wire form, summing gaps back into absolute
    /// offsets.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = 0usize;
        let count = read_varint(buf, &mut cursor)? as usize;
        if count > buf.len() {
            // Each entry takes at least two bytes; a count beyond the
            // buffer length is corrupt.
            return Err(IndexError::Corruption(format!(
                "term offset count {count} exceeds payload of {} bytes",
                buf.len()
            )));
        }
        let mut positions = Vec::with_capacity(count);
        let mut offset = 0u32;
        for _ in 0..count {
            let gap = read_varint(buf, &mut cursor)?;
            let skip = read_varint(buf, &mut cursor)?;
            offset = offset
                .checked_add(u32::try_from(gap).map_err(|_| {
                    IndexError::Corruption("term offset gap exceeds u32".into())
                })?)
                .ok_or_else(|| IndexError::Corruption("term offset overflow".into()))?;
            let skip = u32::try_from(skip)
                .map_err(|_| IndexError::Corruption("term offset skip exceeds u32".into()))?;
            positions.push(TermOffset::spanning(offset, skip));
        }
        if cursor != buf.len() {
            return Err(IndexError::Corruption(format!(
                "{} trailing bytes after term offsets",
                buf.len() - cursor
            )));
        }
        Ok(Self { positions })
    }
}

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn read_varint(buf: &[u8], cursor: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *buf
            .get(*cursor)
            .ok_or_else(|| IndexError::Corruption("truncated varint in term offsets".into()))?;
        *cursor += 1;
        if shift >= 64 {
            return Err(IndexError::Corruption("varint overflow in term offsets".into()));
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_plain_offsets() {
        let offsets = TermOffsets::from_offsets([0, 1, 5, 5, 100, 4096]);
        let decoded = TermOffsets::decode(&offsets.encode()).unwrap();
        assert_eq!(decoded, offsets);
    }

    #[test]
    fn test_round_trip_with_skips() {
        let mut offsets = TermOffsets::new();
        offsets.push(TermOffset::at(3));
        offsets.push(TermOffset::spanning(7, 2));
        offsets.push(TermOffset::at(20));
        let decoded = TermOffsets::decode(&offsets.encode()).unwrap();
        assert_eq!(decoded.positions()[1].low_offset(), 5);
        assert_eq!(decoded, offsets);
    }

    #[test]
    fn test_empty_round_trip() {
        let offsets = TermOffsets::new();
        let buf = offsets.encode();
        assert_eq!(buf, vec![0]);
        assert!(TermOffsets::decode(&buf).unwrap().is_empty());
    }

    #[test]
    fn test_merge_restores_order_and_dedups() {
        let mut a = TermOffsets::from_offsets([2, 9]);
        let b = TermOffsets::from_offsets([1, 2, 5]);
        a.merge(&b);
        let positions: Vec<u32> = a.positions().iter().map(|p| p.offset).collect();
        assert_eq!(positions, vec![1, 2, 5, 9]);
        assert!(a.is_sorted());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(TermOffsets::decode(&[0x80]).is_err()); // truncated varint
        assert!(TermOffsets::decode(&[5, 1]).is_err()); // count exceeds payload
        let mut buf = TermOffsets::from_offsets([1]).encode();
        buf.push(0x7); // trailing byte
        assert!(TermOffsets::decode(&buf).is_err());
    }

    #[test]
    fn test_large_offsets() {
        let offsets = TermOffsets::from_offsets([u32::MAX - 1, u32::MAX]);
        let decoded = TermOffsets::decode(&offsets.encode()).unwrap();
        assert_eq!(decoded, offsets);
    }
}
