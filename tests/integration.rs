//! End-to-end: ingest records through the key builder into the in-memory
//! store, then confirm phrase predicates through the evaluator against the
//! very same rows. The key layout is the contract under test.

use ahash::AHashMap;
use shardindex::index::{IndexKeyBuilder, UidAggregate};
use shardindex::query::{Attribute, Document, PhraseProximityEvaluator, ProximityFunction};
use shardindex::shard::{ShardAssigner, ShardTable};
use shardindex::store::{MemoryStore, TableWriter};
use shardindex::types::{date_of_millis, EventId, FieldPolicy, IndexedField, RawRecord};
use shardindex::IndexConfig;
use std::collections::BTreeSet;

const DAY_MILLIS: i64 = 1_710_510_300_000; // 2024-03-15

fn ingest(
    store: &mut MemoryStore,
    builder: &mut IndexKeyBuilder<'_>,
    record: &RawRecord,
    fields: &[IndexedField],
) {
    let output = builder.build_keys(record, fields).unwrap();
    assert!(!output.is_empty());
    store.write(output).unwrap();
}

fn document_from_terms(event: &EventId, zone: &str, text: &str) -> Document {
    let mut document = Document::new();
    for term in text.split_whitespace() {
        document.put(zone, Attribute::new(term, event.clone()));
    }
    document
}

#[test]
fn ingest_then_confirm_phrase() {
    let config = IndexConfig::for_testing();
    let assigner = ShardAssigner::new(ShardTable::new(4).unwrap());
    let policy = FieldPolicy::new().index("TITLE").content_index("BODY");
    let mut builder = IndexKeyBuilder::new(&config, &assigner, &policy).unwrap();
    let mut store = MemoryStore::new();

    let record = RawRecord::new("wiki", "a1.b2.c3", DAY_MILLIS);
    ingest(
        &mut store,
        &mut builder,
        &record,
        &[
            IndexedField::new("TITLE", "fox story"),
            IndexedField::new("BODY", "the quick brown fox jumps over the lazy dog"),
        ],
    );

    let shard_id = assigner.shard_id_for(&record);
    let event = record.event_id();
    let document =
        document_from_terms(&event, "BODY_TOKEN", "the quick brown fox jumps over the lazy dog");

    let functions = [
        ProximityFunction::phrase(&["BODY_TOKEN"], &["quick", "brown"]),
        ProximityFunction::within(1, &["BODY_TOKEN"], &["the", "fox"]),
        ProximityFunction::adjacent(&["BODY_TOKEN"], &["lazy", "dog"]),
    ];
    let view = store.view("shard");
    let evaluator = PhraseProximityEvaluator::new(&view, &functions, &AHashMap::new());
    let result = evaluator.evaluate(&shard_id, &event, &document).unwrap();

    // phrase(quick, brown) confirms with the exact offsets
    assert!(result.is_function_confirmed(0));
    assert!(result
        .phrase_indexes
        .triplets("BODY_TOKEN")
        .contains(&(event.clone(), 1, 2)));

    // within(1, the, fox) rejects: closest distance is "the"@6 to "fox"@3
    assert!(!result.is_function_confirmed(1));

    // adjacent(lazy, dog) confirms at the tail of the sentence
    assert!(result.is_function_confirmed(2));
}

#[test]
fn negated_phrase_resolves_through_field_index() {
    let config = IndexConfig::for_testing();
    let assigner = ShardAssigner::new(ShardTable::new(4).unwrap());
    let policy = FieldPolicy::new().content_index("BODY");
    let mut builder = IndexKeyBuilder::new(&config, &assigner, &policy).unwrap();
    let mut store = MemoryStore::new();

    let record = RawRecord::new("wiki", "a1.b2.c3", DAY_MILLIS);
    ingest(
        &mut store,
        &mut builder,
        &record,
        &[IndexedField::new("BODY", "strictly confidential material")],
    );

    let shard_id = assigner.shard_id_for(&record);
    let event = record.event_id();

    // the negated function's terms are not in the candidate document (the
    // forward path pruned them) yet the fi rows written at ingest confirm
    let functions =
        [ProximityFunction::phrase(&["BODY_TOKEN"], &["strictly", "confidential"]).negated()];
    let view = store.view("shard");
    let evaluator = PhraseProximityEvaluator::new(&view, &functions, &AHashMap::new());
    let result = evaluator.evaluate(&shard_id, &event, &Document::new()).unwrap();
    assert!(result.is_function_confirmed(0));

    // a record that never contained the terms stays unconfirmed
    let absent = RawRecord::new("wiki", "zz.yy.xx", DAY_MILLIS);
    let result = evaluator
        .evaluate(&shard_id, &absent.event_id(), &Document::new())
        .unwrap();
    assert!(!result.is_function_confirmed(0));
}

#[test]
fn global_index_aggregates_across_records() {
    let config = IndexConfig::for_testing();
    let assigner = ShardAssigner::new(ShardTable::new(1).unwrap());
    let policy = FieldPolicy::new().index("TAG");
    let mut builder = IndexKeyBuilder::new(&config, &assigner, &policy).unwrap();

    let mut store = MemoryStore::new();
    store.register_combiner("shardIndex", UidAggregate::combine_encoded);

    for uid in ["u1", "u2", "u3"] {
        let record = RawRecord::new("wiki", uid, DAY_MILLIS);
        ingest(
            &mut store,
            &mut builder,
            &record,
            &[IndexedField::new("TAG", "rust")],
        );
    }

    // one shard, one day, one value: the three writes collapse into one
    // aggregated cell enumerating all three uids
    let entries = store.dump("shardIndex");
    assert_eq!(entries.len(), 1);
    let aggregate = UidAggregate::decode(&entries[0].1).unwrap();
    assert_eq!(aggregate.count(), 3);
    let uids: BTreeSet<_> = aggregate.uids().unwrap().iter().cloned().collect();
    assert_eq!(uids.len(), 3);
}

#[test]
fn shard_ids_are_stable_for_scans() {
    let table = ShardTable::new(8).unwrap();
    let assigner = ShardAssigner::new(table);
    let record = RawRecord::new("wiki", "stable-uid", DAY_MILLIS);

    let shard = assigner.shard_id_for(&record);
    // writer and reader resolving the same table agree on the shard
    assert_eq!(shard, assigner.shard_id_for(&record));
    assert!(shard.starts_with("20240315_"));
    assert_eq!(
        ShardAssigner::shard_of(&shard).unwrap(),
        record.identity_hash() % assigner.num_shards(date_of_millis(DAY_MILLIS))
    );
}
