// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Reference evaluator for mask-explicit MIR.
//!
//! Runs lowered functions lane by lane so the lowering can be checked
//! against scalar semantics: masked-out lanes never write memory, loop
//! tails stop at the bound, and reductions see only active lanes.

mod interp;
mod value;

pub use interp::{ExternFn, Interpreter, RuntimeError};
pub use value::{Buffer, Scalar, Value};
