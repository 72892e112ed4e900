// File: src/test_utils/mod.rs

pub mod helpers;
pub mod harness;
pub mod memory_store;

pub use harness::{TestClient, TestHarness};
pub use memory_store::MemoryStore;
