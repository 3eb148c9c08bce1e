pub mod catalog;
mod inspect;
pub mod normalize;
mod validation;
mod workflow;

pub use catalog::{Catalog, NodeSpec};
pub use inspect::*;
pub use normalize::{
    Hints, NormalizeOutcome, Normalizer, Repair, normalize, normalize_with_hints, parse_candidate,
};
pub use validation::*;
pub use workflow::*;
