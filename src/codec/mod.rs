//! Codec module: the IR contract with the external natural-language parser
//! and its lowering into engine objects.
//!
//! The parser hands over a JSON tree (see [`ir`]); the [`lower`] pass turns
//! it into [`crate::properties::Rule`]s and [`crate::properties::Statement`]s,
//! eliminating every disjunction by distribution so the engine never sees an
//! `OR`.

pub mod ir;
pub mod lower;

#[cfg(test)]
mod tests;

pub use ir::{IrCondition, IrConsequence, IrEffect, IrInput, IrObject, IrRule, IrStatement};
pub use lower::{LoweredInput, Translator};
