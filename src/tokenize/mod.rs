//! Content tokenization: positioned terms, synonyms, and the bounded
//! offset cache
//!
//! [`FieldTokenizer`] walks a record's content fields in order, producing
//! index-only token fields for the forward/reverse index sets and feeding
//! term positions into the [`BoundedOffsetCache`]. Position accounting is
//! continuous across repeated values of the same field (separated by the
//! inter-field increment) and resets when the field name changes.

mod heartbeat;
mod offset_cache;
mod tokenizer;

pub use heartbeat::{Heartbeat, TokenizerWatch, DEFAULT_BEAT_INTERVAL};
pub use offset_cache::{BoundedOffsetCache, FlushedEntry, TermAndZone};
pub use tokenizer::{
    BasicSynonyms, ContentTokenizer, SynonymGenerator, Token, TokenKind, Tokenizer,
};

use crate::config::TokenizerConfig;
use crate::error::Result;
use crate::keys::TermOffset;
use crate::types::IndexedField;
use tracing::{debug, warn};

/// Token entries produced for one record, separated by index direction.
#[derive(Debug, Default)]
pub struct TokenizedEntries {
    /// Forward token fields: get field-index, global-index and
    /// term-frequency keys, never event keys
    pub forward: Vec<IndexedField>,

    /// Reversed token fields: feed the reverse global index only
    pub reverse: Vec<IndexedField>,
}

/// Drives tokenization for the fields of one record.
pub struct FieldTokenizer<'a> {
    config: &'a TokenizerConfig,
    tokenizer: &'a dyn Tokenizer,
    synonyms: Option<&'a dyn SynonymGenerator>,

    /// Last position handed out, `None` at the start of a zone
    position: Option<u32>,
    last_zone: Option<String>,
}

impl<'a> FieldTokenizer<'a> {
    pub fn new(
        config: &'a TokenizerConfig,
        tokenizer: &'a dyn Tokenizer,
        synonyms: Option<&'a dyn SynonymGenerator>,
    ) -> Self {
        Self {
            config,
            tokenizer,
            synonyms,
            position: None,
            last_zone: None,
        }
    }

    /// Reset position accounting at a record boundary.
    pub fn reset(&mut self) {
        self.position = None;
        self.last_zone = None;
    }

    /// Zone name for a content field: field name plus the token suffix.
    pub fn zone_of(&self, field_name: &str) -> String {
        format!("{}{}", field_name, self.config.token_field_suffix)
    }

    /// Tokenize one field value. Token entries land in `out`, positions in
    /// `offsets` (overflow flushes appended to `flushes`), and the watch is
    /// consulted per token; a timeout error abandons only the remainder of
    /// this record's tokenization, everything already produced stands.
    #[allow(clippy::too_many_arguments)]
    pub fn tokenize_field(
        &mut self,
        field: &IndexedField,
        index_field: bool,
        reverse_index_field: bool,
        offsets: &mut BoundedOffsetCache,
        watch: &mut TokenizerWatch<'_>,
        out: &mut TokenizedEntries,
        flushes: &mut Vec<FlushedEntry>,
    ) -> Result<()> {
        if !(index_field || reverse_index_field) {
            return Ok(());
        }

        let zone = self.zone_of(&field.indexed_field_name);

        // positions reset on a new zone and stay continuous (plus the
        // inter-field gap) across repeated values of the same field
        if self.last_zone.as_deref() != Some(zone.as_str()) {
            self.position = None;
            self.last_zone = Some(zone.clone());
        } else if let Some(position) = self.position {
            self.position = Some(position + self.config.inter_field_position_increment);
        }

        for token in self.tokenizer.tokenize(&field.indexed_field_value) {
            watch.check(&zone)?;

            // skipped tokens still advance the position counter
            let position = match self.position {
                None => token.position_increment.saturating_sub(1),
                Some(previous) => previous + token.position_increment,
            };
            self.position = Some(position);

            let length = token.text.chars().count();
            if length < self.config.term_length_minimum {
                debug!(%zone, length, "dropping token below minimum length");
                continue;
            }
            if length > self.config.term_length_limit && !token.kind.exempt_from_length_limit() {
                debug!(%zone, kind = token.kind.as_str(), length, "dropping overlength token");
                continue;
            }
            if length > self.config.term_length_warning_limit {
                warn!(%zone, length, term = %token.text, "keeping unusually long term");
            }
            if self
                .config
                .term_kind_blacklist
                .iter()
                .any(|k| k == token.kind.as_str())
            {
                continue;
            }

            if index_field {
                for term in self.expand(&token) {
                    for flushed in
                        offsets.add_offset(TermAndZone::new(term.clone(), zone.clone()), TermOffset::at(position))
                    {
                        flushes.push(flushed);
                    }
                    out.forward.push(IndexedField::index_only(zone.clone(), term));
                }
            }

            if reverse_index_field {
                let reversed = Token {
                    text: token.text.chars().rev().collect(),
                    kind: token.kind,
                    position_increment: token.position_increment,
                };
                for term in self.expand(&reversed) {
                    out.reverse.push(IndexedField::index_only(zone.clone(), term));
                }
            }
        }

        Ok(())
    }

    /// The token plus its synonym set, all sharing one position.
    fn expand(&self, token: &Token) -> Vec<String> {
        let mut terms = vec![token.text.clone()];
        if self.config.synonym_generation {
            if let Some(generator) = self.synonyms {
                terms.extend(generator.synonyms(&token.text, token.kind));
            }
        }
        terms
    }
}
