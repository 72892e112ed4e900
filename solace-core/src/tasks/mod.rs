// File: src/tasks/mod.rs

pub mod typing_expiry;

pub use typing_expiry::spawn_typing_expiry_task;
