//! Index key construction for one record
//!
//! Turns a record's normalized fields into the full set of output
//! key/value pairs: event rows, per-shard field-index rows, global forward
//! and reverse index entries, dictionary entries, and term-frequency rows
//! fed by the tokenizer. Masking and visibility branching happen here so
//! the emitted set is the single source of truth for what a shard
//! contains.

use crate::config::IndexConfig;
use crate::error::Result;
use crate::index::aggregate::UidAggregate;
use crate::index::bloom_dedup::{BloomDedupFilter, ResourceMonitor, SystemResourceMonitor};
use crate::index::dictionary::DictionaryDedupCache;
use crate::keys;
use crate::shard::ShardAssigner;
use crate::store::{StoreKey, TableKey};
use crate::tokenize::{
    BasicSynonyms, BoundedOffsetCache, ContentTokenizer, FieldTokenizer, FlushedEntry, Heartbeat,
    SynonymGenerator, TokenizedEntries, Tokenizer, TokenizerWatch,
};
use crate::types::{truncate_to_day, FieldPolicy, IndexedField, MaskingPolicy, RawRecord, Visibility};
use crate::IndexError;
use tracing::warn;

const EMPTY_VALUE: &[u8] = &[];

/// Builds every output key for one record at a time.
///
/// One instance per ingest task: the dictionary cache and heartbeat are
/// task-lifetime, everything else resets per record.
pub struct IndexKeyBuilder<'a> {
    config: &'a IndexConfig,
    assigner: &'a ShardAssigner,
    policy: &'a FieldPolicy,
    masking: Option<&'a MaskingPolicy>,
    tokenizer: Box<dyn Tokenizer>,
    synonyms: Box<dyn SynonymGenerator>,
    monitor: Box<dyn ResourceMonitor>,
    dictionary_cache: DictionaryDedupCache,
    heartbeat: Heartbeat,
}

impl<'a> IndexKeyBuilder<'a> {
    pub fn new(
        config: &'a IndexConfig,
        assigner: &'a ShardAssigner,
        policy: &'a FieldPolicy,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            assigner,
            policy,
            masking: None,
            tokenizer: Box::new(ContentTokenizer),
            synonyms: Box::new(BasicSynonyms),
            monitor: Box::new(SystemResourceMonitor::new(config.bloom.task_timeout)),
            dictionary_cache: DictionaryDedupCache::new(config.dictionary_cache_entries),
            heartbeat: Heartbeat::start(),
        })
    }

    pub fn with_masking(mut self, masking: &'a MaskingPolicy) -> Self {
        self.masking = Some(masking);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_synonyms(mut self, synonyms: Box<dyn SynonymGenerator>) -> Self {
        self.synonyms = synonyms;
        self
    }

    pub fn with_monitor(mut self, monitor: Box<dyn ResourceMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Produce all key/value pairs for one record.
    ///
    /// A record flagged with a fatal parse error emits zero keys; callers
    /// treat the empty result as success and count it, never as a failure.
    pub fn build_keys(
        &mut self,
        record: &RawRecord,
        fields: &[IndexedField],
    ) -> Result<Vec<(TableKey, Vec<u8>)>> {
        if record.fatal_error {
            return Ok(Vec::new());
        }

        let shard_id = self.assigner.shard_id_for(record);
        let mut output = Vec::new();

        // partition: event fields, forward index, reverse index
        let mut event_fields: Vec<IndexedField> = Vec::new();
        let mut forward: Vec<IndexedField> = Vec::new();
        let mut reverse: Vec<IndexedField> = Vec::new();

        for field in fields {
            let name = field.indexed_field_name.as_str();

            if self.policy.is_indexed(name) {
                forward.push(field.clone());
                for alias in self.policy.aliases_of(name) {
                    let mut aliased = field.clone();
                    aliased.indexed_field_name = alias.clone();
                    aliased.event_field_value = None;
                    forward.push(aliased);
                }
            }
            if self.policy.is_reverse_indexed(name) {
                let mut reversed = field.clone();
                reversed.indexed_field_value = keys::reverse_value(&field.indexed_field_value);
                reversed.event_field_value = field
                    .event_field_value
                    .as_deref()
                    .map(keys::reverse_value);
                reverse.push(reversed);
            }
            if !self.policy.is_shard_excluded(name) {
                event_fields.push(field.clone());
            }
        }

        // content tokenization feeds both the forward set (fi + global +
        // term frequency) and the reverse set
        let term_frequency = self.tokenize_record(record, fields, &mut forward, &mut reverse);

        // event rows
        if !self.config.suppress_event_keys {
            for field in &event_fields {
                self.event_keys(record, &shard_id, field, &mut output);
            }
            if !term_frequency.is_empty() {
                let term_count =
                    IndexedField::new("TERM_COUNT", term_frequency.len().to_string());
                self.event_keys(record, &shard_id, &term_count, &mut output);
            }
        }

        // field index + global index + dictionary
        let mut bloom = BloomDedupFilter::new(
            &self.config.bloom,
            forward.len().max(1) * 4,
            self.monitor.as_ref(),
        );
        let aggregate = UidAggregate::single(record.uid.clone()).encode()?;

        for field in &forward {
            if field.indexed_field_value.is_empty() {
                continue;
            }
            if bloom.should_emit(&field.indexed_field_name, &field.indexed_field_value) {
                self.field_index_keys(record, &shard_id, field, &mut output);
            }
            if let Some(table) = self.config.tables.global_index.clone() {
                self.term_index_keys(record, &shard_id, field, &table, &aggregate, false, &mut output);
            }
            if self.config.tables.dictionary.is_some() {
                let visibility = self.field_visibility(record, field);
                if self.dictionary_cache.first_sighting(
                    &field.indexed_field_name,
                    &field.indexed_field_value,
                    &visibility,
                ) {
                    self.dictionary_keys(record, field, visibility, &mut output);
                }
            }
        }

        for field in &reverse {
            if field.indexed_field_value.is_empty() {
                continue;
            }
            if let Some(table) = self.config.tables.global_reverse_index.clone() {
                self.term_index_keys(record, &shard_id, field, &table, &aggregate, true, &mut output);
            }
        }

        // term-frequency rows from the offset cache
        for entry in &term_frequency {
            let qualifier = keys::term_frequency_qualifier(
                &record.data_type,
                &record.uid,
                &entry.key.term,
                &entry.key.zone,
            );
            let key = StoreKey::new(
                shard_id.as_bytes(),
                keys::TERM_FREQUENCY_FAMILY,
                qualifier,
                record.visibility.clone(),
                record.date,
                record.delete_mode,
            );
            output.push((
                TableKey::new(self.config.tables.event.clone(), key),
                entry.offsets.encode(),
            ));
        }

        Ok(output)
    }

    /// Run the tokenizer over content fields, collecting completed
    /// term-frequency entries. A tokenizer timeout abandons the rest of the
    /// record's tokenization but keeps everything produced so far.
    fn tokenize_record(
        &mut self,
        record: &RawRecord,
        fields: &[IndexedField],
        forward: &mut Vec<IndexedField>,
        reverse: &mut Vec<IndexedField>,
    ) -> Vec<FlushedEntry> {
        let mut offsets = BoundedOffsetCache::new(self.config.tokenizer.offset_cache_max_positions);
        let mut flushes = Vec::new();
        let mut entries = TokenizedEntries::default();
        let mut watch = TokenizerWatch::new(&self.heartbeat, &self.config.tokenizer);
        let mut field_tokenizer = FieldTokenizer::new(
            &self.config.tokenizer,
            self.tokenizer.as_ref(),
            Some(self.synonyms.as_ref()),
        );

        for field in fields {
            let name = field.indexed_field_name.as_str();
            let index_field = self.policy.is_content_indexed(name);
            let reverse_field = self.policy.is_reverse_content_indexed(name);
            if !(index_field || reverse_field) {
                continue;
            }
            match field_tokenizer.tokenize_field(
                field,
                index_field,
                reverse_field,
                &mut offsets,
                &mut watch,
                &mut entries,
                &mut flushes,
            ) {
                Ok(()) => {}
                Err(IndexError::TokenizerTimeout { zone, elapsed_ms, .. }) => {
                    warn!(
                        uid = %record.uid,
                        %zone,
                        elapsed_ms,
                        "tokenization aborted, keeping keys produced so far"
                    );
                    break;
                }
                Err(err) => {
                    warn!(uid = %record.uid, %err, "tokenization failed for field");
                }
            }
        }

        forward.append(&mut entries.forward);
        reverse.append(&mut entries.reverse);
        flushes.extend(offsets.drain());
        flushes
    }

    /// Event-row keys for one field, with masking branches.
    fn event_keys(
        &self,
        record: &RawRecord,
        shard_id: &str,
        field: &IndexedField,
        output: &mut Vec<(TableKey, Vec<u8>)>,
    ) {
        let name = field.indexed_field_name.as_str();
        let Some(value) = field.event_field_value.as_deref() else {
            return;
        };
        if self.policy.is_index_only(name) {
            return;
        }
        if self.policy.is_composite(name) && !self.policy.is_overloaded_composite(name) {
            return;
        }

        let family = keys::event_family(&record.data_type, &record.uid);
        let visibility = self.field_visibility(record, field);

        let mut push = |value: &str, vis: Visibility| {
            let key = StoreKey::new(
                shard_id.as_bytes(),
                family.clone(),
                keys::event_qualifier(&field.event_field_name, value),
                vis,
                record.date,
                record.delete_mode,
            );
            output.push((TableKey::new(self.config.tables.event.clone(), key), EMPTY_VALUE.to_vec()));
        };

        match self.masking {
            Some(masking) if masking.contains(name) => {
                // real value at the original, more restrictive visibility
                if !value.is_empty() {
                    push(value, visibility);
                }
                // substitute at the relaxed visibility
                if let Some(substitute) = masking.substitute(name) {
                    if !substitute.is_empty() {
                        push(substitute, masking.relaxed_visibility().clone());
                    }
                }
            }
            Some(masking) => {
                // unmasked fields of a masked record are released at the
                // relaxed visibility
                if !value.is_empty() {
                    push(value, masking.relaxed_visibility().clone());
                }
            }
            None => {
                if !value.is_empty() {
                    push(value, visibility);
                }
            }
        }
    }

    /// Field-index keys (`fi\0field`) for one forward-index field.
    fn field_index_keys(
        &self,
        record: &RawRecord,
        shard_id: &str,
        field: &IndexedField,
        output: &mut Vec<(TableKey, Vec<u8>)>,
    ) {
        let family = keys::field_index_family(&field.indexed_field_name);
        for (value, visibility) in self.index_value_branches(record, field, false) {
            let key = StoreKey::new(
                shard_id.as_bytes(),
                family.clone(),
                keys::field_index_qualifier(&value, &record.data_type, &record.uid),
                visibility,
                record.date,
                record.delete_mode,
            );
            output.push((TableKey::new(self.config.tables.event.clone(), key), EMPTY_VALUE.to_vec()));
        }
    }

    /// Global or reverse index keys for one field, day-truncated.
    #[allow(clippy::too_many_arguments)]
    fn term_index_keys(
        &self,
        record: &RawRecord,
        shard_id: &str,
        field: &IndexedField,
        table: &str,
        aggregate: &[u8],
        reversed: bool,
        output: &mut Vec<(TableKey, Vec<u8>)>,
    ) {
        let qualifier = keys::global_index_qualifier(shard_id, &record.data_type);
        for (value, visibility) in self.index_value_branches(record, field, reversed) {
            let key = StoreKey::new(
                value.as_bytes(),
                field.indexed_field_name.as_bytes(),
                qualifier.clone(),
                visibility,
                truncate_to_day(record.date),
                record.delete_mode,
            );
            output.push((TableKey::new(table.to_string(), key), aggregate.to_vec()));
        }
    }

    /// Dictionary keys (forward and reversed labels). The caller has
    /// already consulted the dedup LRU.
    fn dictionary_keys(
        &self,
        record: &RawRecord,
        field: &IndexedField,
        visibility: Visibility,
        output: &mut Vec<(TableKey, Vec<u8>)>,
    ) {
        let Some(table) = self.config.tables.dictionary.clone() else {
            return;
        };

        for (label, value) in [
            (keys::DICTIONARY_FORWARD_LABEL, field.indexed_field_value.clone()),
            (keys::DICTIONARY_REVERSE_LABEL, keys::reverse_value(&field.indexed_field_value)),
        ] {
            let key = StoreKey::new(
                value.as_bytes(),
                label,
                field.indexed_field_name.as_bytes(),
                visibility.clone(),
                truncate_to_day(record.date),
                record.delete_mode,
            );
            output.push((TableKey::new(table.clone(), key), EMPTY_VALUE.to_vec()));
        }
    }

    /// The (value, visibility) branches an index-style key expands into
    /// under masking. `reversed` selects reversed substitutes for the
    /// reverse index.
    fn index_value_branches(
        &self,
        record: &RawRecord,
        field: &IndexedField,
        reversed: bool,
    ) -> Vec<(String, Visibility)> {
        let name = field.indexed_field_name.as_str();
        let value = field.indexed_field_value.clone();
        let visibility = self.field_visibility(record, field);
        let mut branches = Vec::new();

        match self.masking {
            Some(masking) if masking.contains(name) => {
                if !value.is_empty() {
                    branches.push((value, visibility));
                }
                if let Some(substitute) = masking.substitute(name) {
                    if !substitute.is_empty() {
                        let substitute = if reversed {
                            keys::reverse_value(substitute)
                        } else {
                            substitute.to_string()
                        };
                        branches.push((substitute, masking.relaxed_visibility().clone()));
                    }
                }
            }
            Some(masking) => {
                if !value.is_empty() {
                    branches.push((value, masking.relaxed_visibility().clone()));
                }
            }
            None => {
                if !value.is_empty() {
                    branches.push((value, visibility));
                }
            }
        }
        branches
    }

    fn field_visibility(&self, record: &RawRecord, field: &IndexedField) -> Visibility {
        field
            .markings
            .clone()
            .unwrap_or_else(|| record.visibility.clone())
    }
}
