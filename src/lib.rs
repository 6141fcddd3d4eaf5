pub mod algo;
pub mod active_learning;
pub mod blocking;
pub mod blocking_learn;
pub mod cluster;
pub mod dedupe;
pub mod error;
pub mod features;
pub mod model;
pub mod predicates;
pub mod scoring;
pub mod settings;
pub mod train;
pub mod training_file;

pub use dedupe::Dedupe;
pub use error::{DedupeError, Result};
pub use model::{Attributes, Comparator, CustomComparator, DataModel, FieldDef, FieldKind, LabeledPair, Record, RecordId};
