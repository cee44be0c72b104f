//! Storage implementations for run history and trend series.
//!
//! Available backends:
//! - `MemoryTrendStore` - In-memory storage (always available)
//!
//! Hosts with their own database implement [`TrendStore`] directly.
//!
//! [`TrendStore`]: crate::traits::store::TrendStore

pub mod memory;

pub use memory::MemoryTrendStore;
