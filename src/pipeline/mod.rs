pub mod assembler;
pub mod generator;
pub mod runner;
pub mod scaffold;
pub mod synthesizer;
