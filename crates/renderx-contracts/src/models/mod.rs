mod registry;
mod request;

pub use registry::{ModelFamily, ModelRegistry, ModelSpec, DEFAULT_MODEL};
pub use request::{GenerationParams, GenerationRequest, PERSON_GENERATION_OPTIONS};
