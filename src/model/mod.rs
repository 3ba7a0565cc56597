pub mod descriptor;
pub mod registry;

pub use descriptor::{BackendKind, ModelDescriptor, SamplingParams};
pub use registry::{ModelHandle, ModelRegistry};
