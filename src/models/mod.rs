pub mod app_state;
pub mod coordinator;
pub mod events;
pub mod requests;
pub mod responses;
pub mod transfer;

pub use app_state::{ApiEndpoints, ApiSummary, AppState, EndpointInfo, EndpointStatus};
pub use coordinator::{CoordinatorConfig, PrefixedStoreKeys};
pub use events::{
    BatchProcessed, BatchResult, EventKind, StatusSnapshot, SystemStatus, TimerUpdate,
    TransactionAdded, TriggerReason,
};
pub use requests::{SettleRequest, TrackWalletRequest};
pub use responses::{
    ApiResponse, BatchOutcomeKind, BatchOutcomeResponse, ClearQueueResponse, EnqueueResponse,
    SettleResponse, TrackedWallet, WalletListResponse,
};
pub use transfer::{Balances, MineResult, TransferRequest};
