pub mod boundary;
pub mod orchestrator;
