#[cfg(test)]
#[macro_use]
extern crate maplit;

#[macro_use]
pub mod macros;
pub mod aggregate;
mod arithmetic;
pub mod bindings;
pub mod builtins;
pub mod compile;
pub mod config;
pub mod constants;
pub mod context;
mod control;
mod counter;
pub mod error;
pub mod folder;
pub mod formatting;
pub mod kb;
mod numerics;
pub mod prolog;
pub mod query;
pub mod rules;
pub mod scope;
pub mod terms;
pub mod visitor;
pub mod vm;
