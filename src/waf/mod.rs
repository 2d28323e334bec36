// WAF fingerprinting and phased detection

pub mod baseline;
pub mod bypass;
pub mod detector;
pub mod matcher;
pub mod signatures;

pub use baseline::BaselineSnapshot;
pub use bypass::{suggested_techniques, BypassTechnique};
pub use detector::{DetectionResult, WafDetector};
pub use matcher::{SignatureMatch, SignatureMatcher};
pub use signatures::{Signature, WafType};
