pub mod batch;
pub mod citation;
pub mod compare;
pub mod config;
pub mod domain;
pub mod engine;
pub mod recommendation;
pub mod score;
pub mod trend;
