pub mod assemble;
pub mod generate;
pub mod publish;
pub mod validate;
