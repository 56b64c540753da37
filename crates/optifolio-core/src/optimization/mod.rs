pub mod annealing;
pub mod exhaustive;
pub mod problem;
pub mod solver;
