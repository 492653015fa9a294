//! Stream contexts and the registry that owns them

pub mod context;
pub mod registry;

pub use context::{StreamContext, StreamSettings, StreamStats};
pub use registry::{stream_id_from_url, RegistryChannels, StreamRegistry};
