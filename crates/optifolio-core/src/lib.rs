pub mod analytics;
pub mod config;
pub mod engine;
pub mod error;
pub mod linalg;
pub mod market_data;
pub mod monte_carlo;
pub mod optimization;
pub mod types;

pub use config::EngineConfig;
pub use engine::boundary::{respond, respond_json, respond_with, EngineResponse, OptimizationRequest};
pub use engine::orchestrator::{optimize, PortfolioEngine, PortfolioOptimization};
pub use error::EngineError;
pub use types::*;

/// Standard result type for all engine operations
pub type EngineResult<T> = Result<T, EngineError>;
