// Payload sets and the bypass-variation boundary

mod data;
pub mod encoding;
pub mod source;
pub mod variations;

pub use source::{CheckType, PayloadCategory, PayloadSource};
pub use variations::{
    first_bypass_variant, BuiltinVariations, ManipulatedRequest, ManipulationMode, ManipulationOptions,
    VariationGateway,
};
