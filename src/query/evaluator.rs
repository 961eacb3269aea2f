//! Phrase-proximity evaluation for one candidate document
//!
//! Two-phase state machine, kept explicit so seek ordering and
//! short-circuiting stay auditable:
//!
//! 1. **Collect positive hits**: scan the document's attributes for every
//!    field a sub-query references, caching `field\0value → {event id}`.
//! 2. **Resolve negatives**: negated terms never reach the forward index
//!    path, so they are fetched on demand from the field index with
//!    bounded seeks in ascending field/value order, short-circuiting a
//!    sub-query once one of its values is proven absent.
//!
//! Confirmation then requires every value of a sub-query to have hits and
//! a non-empty intersection of their event ids; surviving events get their
//! term offsets reconstructed and checked against the actual proximity
//! predicate, with qualifying ranges merged into [`PhraseIndexes`].

use crate::error::Result;
use crate::keys;
use crate::query::content::evaluate_proximity;
use crate::query::function::{split_field_value, ProximityFunction, SubQuery, FV_SEPARATOR};
use crate::query::offsets::populate_term_offsets;
use crate::query::phrase_indexes::PhraseIndexes;
use crate::store::{KeyRange, SortedStore};
use crate::types::EventId;
use ahash::{AHashMap, AHashSet};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// One attribute value of a candidate document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub value: String,
    pub event_id: EventId,
}

impl Attribute {
    pub fn new(value: impl Into<String>, event_id: EventId) -> Self {
        Self {
            value: value.into(),
            event_id,
        }
    }
}

/// A candidate document: field → attribute values (several events in the
/// tree-of-documents case).
#[derive(Debug, Clone, Default)]
pub struct Document {
    attributes: AHashMap<String, Vec<Attribute>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, field: impl Into<String>, attribute: Attribute) {
        self.attributes.entry(field.into()).or_default().push(attribute);
    }

    pub fn get(&self, field: &str) -> &[Attribute] {
        self.attributes.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Outcome of one document evaluation.
#[derive(Debug, Default)]
pub struct EvaluationResult {
    confirmed: BTreeSet<usize>,
    confirmed_functions: BTreeSet<usize>,
    pub phrase_indexes: PhraseIndexes,
}

impl EvaluationResult {
    pub fn is_sub_query_confirmed(&self, id: usize) -> bool {
        self.confirmed.contains(&id)
    }

    /// A function confirms when any of its per-field sub-queries does.
    pub fn is_function_confirmed(&self, function: usize) -> bool {
        self.confirmed_functions.contains(&function)
    }

    pub fn confirmed_sub_queries(&self) -> impl Iterator<Item = usize> + '_ {
        self.confirmed.iter().copied()
    }

    pub fn any_confirmed(&self) -> bool {
        !self.confirmed.is_empty()
    }
}

/// Evaluates a query's proximity functions against candidate documents.
///
/// One instance per query; `evaluate` runs per document, owns its own
/// cursor into the store, and shares no mutable state across documents.
pub struct PhraseProximityEvaluator<'a> {
    store: &'a dyn SortedStore,
    sub_queries: Vec<SubQuery>,
    function_fields: BTreeSet<String>,
    positive_search_space: BTreeSet<String>,
    negative_search_space: BTreeSet<String>,
    fv_to_sub_query_ids: AHashMap<String, Vec<usize>>,
}

impl<'a> PhraseProximityEvaluator<'a> {
    /// Parse phase: break functions into per-field sub-queries and
    /// precompute the search spaces. Unfielded functions resolve their
    /// zones through `tf_field_values` (zone → indexed values).
    pub fn new(
        store: &'a dyn SortedStore,
        functions: &[ProximityFunction],
        tf_field_values: &AHashMap<String, BTreeSet<String>>,
    ) -> Self {
        let mut sub_queries = Vec::new();
        let mut function_fields = BTreeSet::new();
        let mut positive_search_space = BTreeSet::new();
        let mut negative_search_space = BTreeSet::new();
        let mut fv_to_sub_query_ids: AHashMap<String, Vec<usize>> = AHashMap::new();

        for (function_index, function) in functions.iter().enumerate() {
            // a proximity predicate needs at least two terms
            if function.terms.len() < 2 {
                warn!(
                    terms = function.terms.len(),
                    "ignoring proximity function with fewer than two terms"
                );
                continue;
            }

            let fields: BTreeSet<String> = if function.fields.is_empty() {
                Self::fields_for_values(tf_field_values, &function.terms)
            } else {
                function.fields.iter().cloned().collect()
            };
            if fields.is_empty() {
                debug!("no zones resolve the unfielded proximity function, dropping it");
                continue;
            }

            for field in fields {
                let id = sub_queries.len();
                let sub_query = SubQuery::new(
                    id,
                    function_index,
                    function.kind,
                    field.clone(),
                    function.negated,
                    function.terms.clone(),
                );
                function_fields.insert(field);
                for fv in &sub_query.field_values {
                    fv_to_sub_query_ids.entry(fv.clone()).or_default().push(id);
                    if sub_query.negated {
                        negative_search_space.insert(fv.clone());
                    } else {
                        positive_search_space.insert(fv.clone());
                    }
                }
                sub_queries.push(sub_query);
            }
        }

        Self {
            store,
            sub_queries,
            function_fields,
            positive_search_space,
            negative_search_space,
            fv_to_sub_query_ids,
        }
    }

    pub fn sub_queries(&self) -> &[SubQuery] {
        &self.sub_queries
    }

    /// Evaluate one candidate document.
    pub fn evaluate(
        &self,
        shard_id: &str,
        doc_event: &EventId,
        document: &Document,
    ) -> Result<EvaluationResult> {
        let mut result = EvaluationResult::default();
        if self.sub_queries.is_empty() {
            return Ok(result);
        }

        // phase 1: positive hits from the document's own attributes
        let mut fv_events: AHashMap<String, BTreeSet<EventId>> = AHashMap::new();
        for field in &self.function_fields {
            for attribute in document.get(field) {
                let fv = format!("{field}{FV_SEPARATOR}{}", attribute.value);
                if self.positive_search_space.contains(&fv)
                    || self.negative_search_space.contains(&fv)
                {
                    fv_events
                        .entry(fv)
                        .or_default()
                        .insert(attribute.event_id.clone());
                }
            }
        }

        // phase 2: negated terms, absent from the forward path by
        // construction, resolve through ascending field-index seeks
        self.resolve_negatives(shard_id, doc_event, &mut fv_events)?;

        // confirmation + offset reconstruction per sub-query
        for sub_query in &self.sub_queries {
            let Some(events) = self.intersect_events(sub_query, &fv_events) else {
                continue;
            };

            let field_values: Vec<(String, String)> = sub_query
                .terms
                .iter()
                .map(|term| (sub_query.field.clone(), term.clone()))
                .collect();

            for event in events {
                let offsets = populate_term_offsets(self.store, shard_id, &event, &field_values)?;
                let lists: Option<Vec<_>> = sub_query
                    .terms
                    .iter()
                    .map(|term| offsets.get(&sub_query.field, term).map(|o| o.positions()))
                    .collect();
                let Some(lists) = lists else {
                    continue;
                };
                if let Some((start, end)) = evaluate_proximity(sub_query.kind, &lists) {
                    result
                        .phrase_indexes
                        .add_triplet(sub_query.field.clone(), event.clone(), start, end);
                    result.confirmed.insert(sub_query.id);
                    result.confirmed_functions.insert(sub_query.function);
                }
            }
        }

        Ok(result)
    }

    /// Phase 2: for each negated field/value not already found, perform one
    /// bounded seek into the field index scoped to this record. Values run
    /// in ascending order so the store never seeks backwards; a proven
    /// absence short-circuits every remaining value of the sub-queries that
    /// contain it.
    fn resolve_negatives(
        &self,
        shard_id: &str,
        doc_event: &EventId,
        fv_events: &mut AHashMap<String, BTreeSet<EventId>>,
    ) -> Result<()> {
        if self.negative_search_space.is_empty() {
            return Ok(());
        }

        let mut missed: AHashSet<usize> = AHashSet::new();
        for fv in &self.negative_search_space {
            if fv_events.contains_key(fv) {
                continue;
            }
            let ids = self
                .fv_to_sub_query_ids
                .get(fv)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            if ids.iter().all(|id| missed.contains(id)) {
                continue;
            }
            let Some((field, value)) = split_field_value(fv) else {
                continue;
            };

            let family = keys::field_index_family(field);
            let qualifier =
                keys::field_index_qualifier(value, &doc_event.data_type, &doc_event.uid);
            let range = KeyRange::exact((
                shard_id.as_bytes().to_vec(),
                family.clone(),
                qualifier,
            ));
            let found = self.store.seek(&range, &[family])?.next().is_some();
            if found {
                fv_events
                    .entry(fv.clone())
                    .or_default()
                    .insert(doc_event.clone());
            } else {
                for id in ids {
                    if self.sub_queries[*id].negated {
                        missed.insert(*id);
                    }
                }
            }
        }
        Ok(())
    }

    /// Every value of the sub-query must have hits, and their event sets
    /// must intersect to at least one event; a union of per-term hits is
    /// not a phrase candidate. Intersection is iterative with an early
    /// exit on empty.
    fn intersect_events(
        &self,
        sub_query: &SubQuery,
        fv_events: &AHashMap<String, BTreeSet<EventId>>,
    ) -> Option<BTreeSet<EventId>> {
        let mut events: Option<BTreeSet<EventId>> = None;
        for fv in &sub_query.field_values {
            let hits = fv_events.get(fv)?;
            events = Some(match events {
                None => hits.clone(),
                Some(current) => {
                    let intersection: BTreeSet<EventId> =
                        current.intersection(hits).cloned().collect();
                    if intersection.is_empty() {
                        return None;
                    }
                    intersection
                }
            });
        }
        events.filter(|e| !e.is_empty())
    }

    fn fields_for_values(
        tf_field_values: &AHashMap<String, BTreeSet<String>>,
        terms: &[String],
    ) -> BTreeSet<String> {
        tf_field_values
            .iter()
            .filter(|(_, values)| terms.iter().any(|term| values.contains(term)))
            .map(|(field, _)| field.clone())
            .collect()
    }
}
