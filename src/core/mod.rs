pub mod action;
pub mod builder;
pub mod context;
pub mod error;
pub mod grammar;
pub mod modifiers;
pub mod node;
pub mod rule_set;
pub mod symbol;
pub mod tag;
pub mod tokenizer;
