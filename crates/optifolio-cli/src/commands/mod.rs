pub mod estimate;
pub mod optimize;
pub mod solvers;
