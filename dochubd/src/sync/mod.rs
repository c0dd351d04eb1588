pub mod backoff;
pub mod engine;
