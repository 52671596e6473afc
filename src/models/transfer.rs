use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Balances keyed by wallet address
pub type Balances = BTreeMap<String, u64>;

/// A signed transfer request waiting in the subnet queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TransferRequest {
    /// Sender wallet address
    pub from: String,
    /// Recipient wallet address
    pub to: String,
    /// Amount in the subnet's smallest unit
    pub amount: u64,
    /// Sender nonce, checked by the processing engine
    #[serde(default)]
    pub nonce: u64,
    /// Signature over the transfer, verified by the processing engine
    #[serde(default)]
    pub signature: String,
}

impl TransferRequest {
    /// Shape checks only; signatures and balances are the engine's business
    pub fn validate(&self) -> Result<(), String> {
        if self.from.trim().is_empty() {
            return Err("Transfer sender address is empty".to_string());
        }
        if self.to.trim().is_empty() {
            return Err("Transfer recipient address is empty".to_string());
        }
        if self.from.eq_ignore_ascii_case(&self.to) {
            return Err(format!("Transfer sender and recipient are both {}", self.from));
        }
        if self.amount == 0 {
            return Err("Transfer amount must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Result of asking the processing engine to mine a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MineResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MineResult {
    pub fn succeeded(txid: impl Into<String>) -> Self {
        Self {
            success: true,
            txid: Some(txid.into()),
            error: None,
            reason: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            txid: None,
            error: Some(error.into()),
            reason: None,
        }
    }

    /// A result only counts as successful when it carries no error marker
    pub fn is_success(&self) -> bool {
        self.success && self.error.is_none()
    }
}
