pub mod alignment;
pub use alignment::{Alignment, AlignmentRecord};

pub mod motif;
pub use motif::Motif;

pub mod structure;
pub use structure::{BasePair, Structure};
