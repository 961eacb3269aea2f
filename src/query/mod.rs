//! Query-side phrase and proximity evaluation
//!
//! The external expression engine hands this module the proximity-function
//! invocations it extracted from a query (`within`, `adjacent`, `phrase`,
//! fielded or not, possibly under a negation marker). The
//! [`PhraseProximityEvaluator`] confirms or rejects them against one
//! candidate document at a time, reconstructing term offsets from the
//! term-frequency index and recording matched ranges in [`PhraseIndexes`].

mod content;
mod evaluator;
mod function;
mod offsets;
mod phrase_indexes;

pub use content::{adjacent, evaluate_proximity, phrase, within};
pub use evaluator::{Attribute, Document, EvaluationResult, PhraseProximityEvaluator};
pub use function::{ProximityFunction, ProximityKind, SubQuery};
pub use offsets::{populate_term_offsets, TermOffsetMap};
pub use phrase_indexes::PhraseIndexes;
