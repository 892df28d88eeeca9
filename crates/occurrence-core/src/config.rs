//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by every operator run of a [`Session`](crate::Session).
///
/// Missing fields take their default when deserialized:
///
/// ```
/// use occurrence_core::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str(r#"{ "batch_size": 4 }"#).unwrap();
/// assert_eq!(config.batch_size, 4);
/// assert_eq!(config.default_register, "\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of transforms in flight. `0` is treated as `1`.
    pub batch_size: usize,
    /// Register used when a run does not name one.
    pub default_register: String,
    /// Let nearest-match searches wrap around the buffer boundary.
    pub wrap: bool,
    /// Operate on bare matches instead of matches plus adjoining whitespace.
    ///
    /// Off by default, so replacing the marked `foo` in `"foo bar"` with `"qux"` gives
    /// `"quxbar"`: the trailing blank belongs to the item. Runs override this with
    /// [`RunOptions::inner`](crate::RunOptions::inner).
    pub inner: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            default_register: "\"".to_string(),
            wrap: true,
            inner: false,
        }
    }
}

impl EngineConfig {
    /// The batch size with the `0` case normalized.
    pub fn effective_batch_size(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.batch_size).max(1)
    }
}
