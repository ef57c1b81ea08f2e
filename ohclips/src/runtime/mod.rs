//! Atomic store mutations executed server-side as Lua scripts.

pub mod commands;
pub mod executor;
pub mod scripts;

pub use executor::{RedisExecutor, ScriptExecutor, execute_command};
