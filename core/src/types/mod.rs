pub mod result;
pub mod task;

pub use result::*;
pub use task::*;

/// Opaque key/value payloads exchanged with agents. The core never inspects values.
pub type ArtifactMap = std::collections::BTreeMap<String, serde_json::Value>;
