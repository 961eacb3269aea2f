//! Proximity function invocations and their sub-queries

use std::collections::BTreeSet;

/// Separator inside `field\0value` search-space entries.
pub(crate) const FV_SEPARATOR: char = '\u{0}';

/// The proximity predicate a function evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityKind {
    /// All terms within `max_distance` positions of each other, any order
    Within(u32),

    /// All terms next to each other, any order (`within(terms - 1)`)
    Adjacent,

    /// Terms consecutive and in the given order; same-position synonyms
    /// count as adjacent
    Phrase,
}

/// One proximity-function invocation extracted from the query expression
/// tree by the external parser.
#[derive(Debug, Clone)]
pub struct ProximityFunction {
    pub kind: ProximityKind,

    /// Resolved zones; empty means unfielded, to be resolved through the
    /// term-frequency field/value map
    pub fields: Vec<String>,

    /// An ancestor negation marker covers this function
    pub negated: bool,

    /// Normalized terms, in phrase order
    pub terms: Vec<String>,
}

impl ProximityFunction {
    pub fn within(max_distance: u32, fields: &[&str], terms: &[&str]) -> Self {
        Self::build(ProximityKind::Within(max_distance), fields, terms, false)
    }

    pub fn adjacent(fields: &[&str], terms: &[&str]) -> Self {
        Self::build(ProximityKind::Adjacent, fields, terms, false)
    }

    pub fn phrase(fields: &[&str], terms: &[&str]) -> Self {
        Self::build(ProximityKind::Phrase, fields, terms, false)
    }

    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    fn build(kind: ProximityKind, fields: &[&str], terms: &[&str], negated: bool) -> Self {
        Self {
            kind,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            negated,
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// One (function × field) evaluation unit.
///
/// A multi-fielded function is the disjunction of its per-field sub
/// queries; each sub-query is confirmed independently against the
/// document.
#[derive(Debug, Clone)]
pub struct SubQuery {
    pub id: usize,

    /// Index of the originating function in the evaluator's input
    pub function: usize,

    pub kind: ProximityKind,
    pub field: String,
    pub negated: bool,

    /// Terms in phrase order
    pub terms: Vec<String>,

    /// Sorted `field\0value` pairs, one per distinct term
    pub field_values: BTreeSet<String>,
}

impl SubQuery {
    pub fn new(
        id: usize,
        function: usize,
        kind: ProximityKind,
        field: impl Into<String>,
        negated: bool,
        terms: Vec<String>,
    ) -> Self {
        let field = field.into();
        let field_values = terms
            .iter()
            .map(|term| format!("{field}{FV_SEPARATOR}{term}"))
            .collect();
        Self {
            id,
            function,
            kind,
            field,
            negated,
            terms,
            field_values,
        }
    }
}

/// Split a `field\0value` pair back into its components.
pub(crate) fn split_field_value(field_value: &str) -> Option<(&str, &str)> {
    field_value.split_once(FV_SEPARATOR)
}
