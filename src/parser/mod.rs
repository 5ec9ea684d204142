//! Parser module for Iodine.

mod core;
mod declarations;
mod expressions;
mod precedence;
mod statements;

#[cfg(test)]
mod tests;

pub use self::core::Parser;
