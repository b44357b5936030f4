//! Lock storage implementations

pub mod memory;
pub mod redis;
pub mod traits;
