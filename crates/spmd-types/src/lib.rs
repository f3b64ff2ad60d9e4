// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Type rules for SPMD lowering.
//!
//! Decides which uniform/varying assignments and casts are legal, how many
//! lanes a function runs at, and which functions take an execution mask.

mod builtins;
mod config;
mod error;
mod lanes;
mod resolver;
mod signature;

pub use builtins::{Builtin, ReduceKind};
pub use config::{ConfigError, TargetConfig};
pub use error::{AssignmentError, CastError, VisibilityError};
pub use lanes::LaneResolver;
pub use resolver::{AssignContext, CastKind, Coercion, TypeResolver};
pub use signature::{classify, FnSignature, SignatureKind, SignatureTable};
