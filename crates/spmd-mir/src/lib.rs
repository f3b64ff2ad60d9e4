// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! MIR for SPMD code - non-SSA control-flow graph with explicit masks.
//!
//! Every branch and switch in MIR is on a uniform value. Divergence across
//! lanes is expressed with mask locals, `Select`, and masked memory access,
//! which is what a vector code generator consumes.

mod builder;
mod display;
mod function;
mod operand;
mod stmt;
mod types;

pub mod lower;

pub use builder::BlockBuilder;
pub use function::{BlockId, LoopDescriptor, MirBlock, MirFunction, MirLocal};
pub use operand::{BinOp, FunctionRef, LaneShift, LocalId, MirConst, MirOperand, MirRValue, UnaryOp};
pub use stmt::{MirStmt, MirTerminator};
pub use types::MirType;
pub use lower::{lower_function, LoweringContext, LoweringError};
