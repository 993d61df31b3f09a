pub mod analysis;
pub mod ir;
pub mod lexer;
pub mod parser;

#[cfg(test)]
mod lexer_tests;
