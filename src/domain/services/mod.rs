pub mod assignment_strategy;

pub use assignment_strategy::*;
