//! Training data: the labeled dataset and its synthesis from the knowledge base.

pub mod dataset;
pub mod synth;

pub use dataset::{Dataset, DatasetRow, LABEL_COLUMN};
pub use synth::{DEFAULT_SAMPLES_PER_DISEASE, augment_with_extended, synthesize_base};
