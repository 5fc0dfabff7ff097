// ABOUTME: The release state machine and its collaborators.
// ABOUTME: Exports the manager, pointer model, stores, lock, activation, and producers.

mod activation;
mod error;
mod lock;
mod manager;
mod pointer;
mod producer;
pub mod store;

pub use activation::{ActivationError, EtcActivation, NoopActivation, SiteActivation};
pub use error::ReleaseError;
pub use lock::{LockInfo, ReleaseLock};
pub use manager::ReleaseManager;
pub use pointer::{Pointer, ReleaseState, ReleaseStatus};
pub use producer::{ArtifactRef, BuildProducer, DirProducer, ProduceError, RevisionProducer};
pub use store::{GitTagStore, StoreError, TarballStore, VersionStore};
