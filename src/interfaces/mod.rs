pub mod csv;
pub mod runner;
pub mod seed;
