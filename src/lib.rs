// Declare the modules that form the library's public API.
// The binary wires them together; tests drive them directly.
pub mod config;
pub mod data_model;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod pipeline;
pub mod stores;
pub mod supervisor;
