mod backend;
mod backends;
mod mask;
mod result;

pub use backend::DetectorBackend;
pub use backends::{ReplayBackend, StubBackend};
pub use mask::Mask;
pub use result::{DetectionResult, Instance, ObjectClass};
