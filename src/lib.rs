pub mod config;
pub mod engine;
pub mod kernel;
pub mod page;
pub mod settings;

// Types needed to embed the engine.
pub use config::EngineConfig;
pub use engine::{Engine, EngineError};
