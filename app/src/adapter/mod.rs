pub mod ambient;
pub mod polyglot;
