pub mod config;
pub mod project;
pub mod store;
pub mod sync;
pub mod tracker;
