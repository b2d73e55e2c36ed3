//! Remote gateway: pushes batches and snapshots, pulls recent batches.
//!
//! The gateway is passive. It performs no retries and no merging; failures
//! come back as typed errors and the caller's next tick or pull retries.

pub mod firebase;
pub mod store;

pub use firebase::FirebaseStore;
pub use store::{PullOutcome, RemoteStore};
