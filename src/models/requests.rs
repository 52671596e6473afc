use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TrackWalletRequest {
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SettleRequest {
    /// Clear the processing flag and batch lock before settling.
    /// Recovers from an instance that died mid-batch without waiting for the TTL.
    #[serde(default)]
    pub force_unlock: bool,
}
