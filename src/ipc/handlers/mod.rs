pub mod core;
pub mod exercises;
pub mod plans;
