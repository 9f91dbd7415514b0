//! Persistence for discussions, users and plans.
//!
//! Each record kind has its own async trait so a backend can be swapped per
//! concern. `InMemoryStore` implements all three for a single process.

pub mod adapters;
pub mod store;

pub use adapters::InMemoryStore;
pub use store::{
    DiscussionRecord, DiscussionStore, DiscussionStoreRef, PlanStore, PlanStoreRef, StoreError,
    UserRecord, UserStore, UserStoreRef,
};
