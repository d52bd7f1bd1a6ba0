//! Cepstral front-end and template distance.
mod comparator;
mod dtw;
mod extractor;
mod mel;
mod normalizer;

pub use comparator::{KfcComparator, cosine_similarity, dtw_similarity};
pub use dtw::Dtw;
pub use extractor::{FeatureExtractor, FeatureSequence};
pub use normalizer::KfcNormalizer;
