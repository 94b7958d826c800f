//! Species naming across detector vocabularies.

mod normalize;

pub use normalize::{SpeciesName, comparison_key, is_background_label, normalize};
