//! Layered configuration: TOML file, then `CONDUCTOR_*` environment overrides.

mod load;
mod types;

pub use load::*;
pub use types::*;
