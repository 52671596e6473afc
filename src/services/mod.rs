pub mod batch;
pub mod broadcast;
pub mod coordinator;
pub mod engine;
pub mod lock;
pub mod snapshot;
pub mod store;
pub mod timer;
pub mod trigger;
pub mod wallets;
