// src/lib.rs

pub mod db;
pub mod repositories;
pub mod rooms;
pub mod access;
pub mod services;
pub mod realtime;
pub mod tasks;
pub mod test_utils;

pub use db::Database;
pub use solace_common::error::Error;
pub use solace_common::models;
