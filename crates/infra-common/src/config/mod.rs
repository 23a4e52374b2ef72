//! Layered configuration loading
//!
//! Values come from, in increasing priority:
//!
//! 1. the target type's serde defaults (use `#[serde(default)]` on the struct)
//! 2. an optional configuration file (format picked from the extension, usually TOML)
//! 3. environment variables named `<PREFIX>__<FIELD>`, e.g. `SOFTPHONE_BRIDGE__RING_TIMEOUT_SECS=30`

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::Result;

/// Separator between the prefix and field names in environment overrides
pub const ENV_SEPARATOR: &str = "__";

/// Load `T` from an optional file plus environment overrides.
///
/// A `path` that does not exist is an error; pass `None` to skip the file layer.
pub fn load_layered<T: DeserializeOwned>(path: Option<&Path>, env_prefix: &str) -> Result<T> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        debug!(path = %path.display(), "Loading configuration file");
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(env_prefix)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let loaded = builder.build()?.try_deserialize::<T>()?;
    Ok(loaded)
}
