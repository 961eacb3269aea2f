//! Normalized fields and per-field indexing policy

use super::Visibility;
use ahash::{AHashMap, AHashSet};

/// One normalized field of a record.
///
/// The indexed name/value pair is what index tables see; the event
/// name/value pair is what lands in the event row. They differ for aliased
/// fields and for generated token fields, whose `event_field_value` is
/// `None` so no event key is produced for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedField {
    pub indexed_field_name: String,
    pub indexed_field_value: String,
    pub event_field_name: String,
    pub event_field_value: Option<String>,

    /// Field-level markings overriding the record visibility
    pub markings: Option<Visibility>,
}

impl IndexedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        Self {
            indexed_field_name: name.clone(),
            indexed_field_value: value.clone(),
            event_field_name: name,
            event_field_value: Some(value),
            markings: None,
        }
    }

    pub fn with_markings(mut self, markings: Visibility) -> Self {
        self.markings = Some(markings);
        self
    }

    /// A generated index-only field (token or synonym): indexed under
    /// `name`, absent from the event row.
    pub fn index_only(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            indexed_field_name: name.clone(),
            indexed_field_value: value.into(),
            event_field_name: name,
            event_field_value: None,
            markings: None,
        }
    }
}

/// Per-field indexing policy, owned by one ingest task.
///
/// Mirrors the upstream data dictionary: which fields are indexed, reverse
/// indexed, excluded from the event row, expanded through aliases, or
/// tokenized as content.
#[derive(Debug, Clone, Default)]
pub struct FieldPolicy {
    indexed: AHashSet<String>,
    reverse_indexed: AHashSet<String>,
    index_only: AHashSet<String>,
    composite: AHashSet<String>,
    overloaded_composite: AHashSet<String>,
    shard_excluded: AHashSet<String>,
    content_indexed: AHashSet<String>,
    reverse_content_indexed: AHashSet<String>,
    aliases: AHashMap<String, Vec<String>>,
}

impl FieldPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, field: impl Into<String>) -> Self {
        self.indexed.insert(field.into());
        self
    }

    pub fn reverse_index(mut self, field: impl Into<String>) -> Self {
        self.reverse_indexed.insert(field.into());
        self
    }

    /// Indexed but never written to the event row.
    pub fn index_only(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.indexed.insert(field.clone());
        self.index_only.insert(field);
        self
    }

    pub fn composite(mut self, field: impl Into<String>) -> Self {
        self.composite.insert(field.into());
        self
    }

    pub fn overloaded_composite(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.composite.insert(field.clone());
        self.overloaded_composite.insert(field);
        self
    }

    pub fn exclude_from_shard(mut self, field: impl Into<String>) -> Self {
        self.shard_excluded.insert(field.into());
        self
    }

    /// Tokenize this field's content into positioned terms.
    pub fn content_index(mut self, field: impl Into<String>) -> Self {
        self.content_indexed.insert(field.into());
        self
    }

    pub fn reverse_content_index(mut self, field: impl Into<String>) -> Self {
        self.reverse_content_indexed.insert(field.into());
        self
    }

    /// Expand `field` into additional index entries under each alias.
    pub fn alias(mut self, field: impl Into<String>, aliases: &[&str]) -> Self {
        self.aliases
            .insert(field.into(), aliases.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexed.contains(field)
    }

    pub fn is_reverse_indexed(&self, field: &str) -> bool {
        self.reverse_indexed.contains(field)
    }

    pub fn is_index_only(&self, field: &str) -> bool {
        self.index_only.contains(field)
    }

    pub fn is_composite(&self, field: &str) -> bool {
        self.composite.contains(field)
    }

    pub fn is_overloaded_composite(&self, field: &str) -> bool {
        self.overloaded_composite.contains(field)
    }

    pub fn is_shard_excluded(&self, field: &str) -> bool {
        self.shard_excluded.contains(field)
    }

    pub fn is_content_indexed(&self, field: &str) -> bool {
        self.content_indexed.contains(field)
    }

    pub fn is_reverse_content_indexed(&self, field: &str) -> bool {
        self.reverse_content_indexed.contains(field)
    }

    pub fn aliases_of(&self, field: &str) -> &[String] {
        self.aliases.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Masked-field substitutes plus the relaxed visibility they are released at.
///
/// A masked field emits its real value at the original (more restrictive)
/// visibility and the substitute at the relaxed visibility, never the real
/// value at both.
#[derive(Debug, Clone, Default)]
pub struct MaskingPolicy {
    substitutes: AHashMap<String, String>,
    relaxed_visibility: Visibility,
}

impl MaskingPolicy {
    pub fn new(relaxed_visibility: Visibility) -> Self {
        Self {
            substitutes: AHashMap::new(),
            relaxed_visibility,
        }
    }

    pub fn mask(mut self, field: impl Into<String>, substitute: impl Into<String>) -> Self {
        self.substitutes.insert(field.into(), substitute.into());
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.substitutes.contains_key(field)
    }

    /// Normalized substitute value for a masked field.
    pub fn substitute(&self, field: &str) -> Option<&str> {
        self.substitutes.get(field).map(String::as_str)
    }

    pub fn relaxed_visibility(&self) -> &Visibility {
        &self.relaxed_visibility
    }

    pub fn is_empty(&self) -> bool {
        self.substitutes.is_empty()
    }
}
