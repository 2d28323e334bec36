// Test matrix construction

pub mod builder;
pub mod casing;
pub mod template;

pub use builder::{MatrixBuilder, TestRequestSpec, VariationStrategy};
pub use casing::seed_for_target;
