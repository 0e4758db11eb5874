//! Control-plane error classification

use ua_core::config::UpgradeConfig;
use ua_core::error::ControlPlaneError;

/// Decides which control-plane errors the workflow may skip past
///
/// An error is ignorable only when the snapshot opts in with
/// `ignore_unimplemented` and the peer answered "not implemented". Timeouts,
/// transport failures and every other status are always real errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorPolicy {
    ignore_unimplemented: bool,
}

impl ErrorPolicy {
    pub fn new(ignore_unimplemented: bool) -> Self {
        Self {
            ignore_unimplemented,
        }
    }

    /// Policy carried by a configuration snapshot
    pub fn from_config(config: &UpgradeConfig) -> Self {
        Self::new(config.ignore_unimplemented)
    }

    /// Whether `err` should be treated as success
    pub fn is_ignorable(&self, err: &ControlPlaneError) -> bool {
        self.ignore_unimplemented && err.is_unimplemented()
    }
}
