// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Conversions from engine error types to `Diagnostic`.

use spmd_mir::lower::{
    ContextError, ControlFlowError, ExitCause, ExitKind, LoweringError, NestingError,
};
use spmd_types::{AssignmentError, CastError, ConfigError, VisibilityError};

use crate::{Diagnostic, ToDiagnostic};

// ============================================================================
// Assignment Errors
// ============================================================================

impl ToDiagnostic for AssignmentError {
    fn to_diagnostic(&self) -> Diagnostic {
        use AssignmentError::*;

        let diag = Diagnostic::error(self.to_string());
        match self {
            VaryingToUniform { from, span, .. } => diag
                .with_code("E0100")
                .with_primary(*span, format!("this is {from}"))
                .with_help("reduce the value to one lane first, e.g. with `reduce.Add`"),

            ConstraintMismatch { from, to, span } => diag
                .with_code("E0101")
                .with_primary(*span, format!("expected {to}, found {from}"))
                .with_help("split the value into lane groups with `lanes.FromConstrained`"),

            BaseMismatch { from, to, span } => diag
                .with_code("E0102")
                .with_primary(*span, format!("expected {to}, found {from}"))
                .with_help("convert the element type with an explicit cast"),

            RegisterCapacityExceeded { required, limit, span, .. } => diag
                .with_code("E0103")
                .with_primary(*span, format!("{required} bits"))
                .with_note(format!("the target register limit is {limit} bits")),

            UniformWriteUnderVaryingControl { name, span } => diag
                .with_code("E0104")
                .with_primary(*span, format!("`{name}` is uniform"))
                .with_note("lanes that skip this branch would see the write too")
                .with_help(format!("declare `{name}` as varying")),
        }
    }
}

// ============================================================================
// Cast Errors
// ============================================================================

impl ToDiagnostic for CastError {
    fn to_diagnostic(&self) -> Diagnostic {
        use CastError::*;

        let diag = Diagnostic::error(self.to_string());
        match self {
            RegisterCapacityExceeded { lanes, limit, span, .. } => diag
                .with_code("E0200")
                .with_primary(*span, format!("{lanes} lanes of the target type do not fit"))
                .with_note(format!("the target register limit is {limit} bits"))
                .with_help("decompose into smaller lane groups before widening"),

            VaryingToUniform { span, .. } => diag
                .with_code("E0201")
                .with_primary(*span, "varying operand")
                .with_help("reduce the value to one lane first"),

            LaneCountChange { span, .. } => diag
                .with_code("E0202")
                .with_primary(*span, "lane count differs"),

            Unsupported { span, .. } => diag
                .with_code("E0203")
                .with_primary(*span, "no conversion between these types"),
        }
    }
}

// ============================================================================
// Control-Flow Errors
// ============================================================================

impl ToDiagnostic for ControlFlowError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ControlFlowError::VaryingExitForbidden { exit, cause, span } => {
                let diag = Diagnostic::error(self.to_string());
                let target = match exit {
                    ExitKind::Break => "the loop",
                    ExitKind::Return => "the function",
                };
                match cause {
                    ExitCause::VaryingCondition => {
                        let diag = diag
                            .with_code("E0300")
                            .with_primary(*span, format!("some lanes would leave {target} early"))
                            .with_help(
                                "move the exit out of the varying branch, or use `continue` to \
                                 disable the lanes for this iteration",
                            );
                        match exit {
                            ExitKind::Break => diag.with_suggestion(*span, "continue"),
                            ExitKind::Return => diag,
                        }
                    }
                    ExitCause::MaskAltered => diag
                        .with_code("E0301")
                        .with_primary(*span, format!("cannot leave {target} here"))
                        .with_note("a varying `continue` earlier in this iteration disabled some lanes")
                        .with_help(format!(
                            "place the `{exit}` before the `continue`, or make the `continue` uniform"
                        )),
                }
            }
            ControlFlowError::Nesting(e) => e.to_diagnostic(),
        }
    }
}

impl ToDiagnostic for NestingError {
    fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            NestingError::SpmdLoopNesting { span, outer } => diag
                .with_code("E0302")
                .with_primary(*span, "inner data-parallel loop")
                .with_secondary(*outer, "already running data-parallel here")
                .with_help("make the inner loop an ordinary loop"),

            NestingError::SpmdFunctionContainsLoop { function, span } => diag
                .with_code("E0303")
                .with_primary(*span, "data-parallel loop")
                .with_note(format!("`{function}` already runs once per lane"))
                .with_help("use an ordinary loop"),
        }
    }
}

// ============================================================================
// Visibility And Context Errors
// ============================================================================

impl ToDiagnostic for VisibilityError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            VisibilityError::PublicSpmdFunction { name, span } => {
                Diagnostic::error(self.to_string())
                    .with_code("E0400")
                    .with_primary(*span, format!("`{name}` is public"))
                    .with_note("SPMD functions take a hidden execution mask")
                    .with_help("make the function private, or take only uniform parameters")
            }
        }
    }
}

impl ToDiagnostic for ContextError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ContextError::NoLaneContext { builtin, span } => Diagnostic::error(self.to_string())
                .with_code("E0500")
                .with_primary(*span, format!("`{builtin}` used here"))
                .with_help("call it inside a data-parallel loop or an SPMD function"),
        }
    }
}

// ============================================================================
// Lowering Errors
// ============================================================================

impl ToDiagnostic for LoweringError {
    fn to_diagnostic(&self) -> Diagnostic {
        use LoweringError::*;

        match self {
            Assignment(e) => e.to_diagnostic(),
            Cast(e) => e.to_diagnostic(),
            ControlFlow(e) => e.to_diagnostic(),
            Context(e) => e.to_diagnostic(),
            Visibility(e) => e.to_diagnostic(),

            UnresolvedVariable { name, span } => Diagnostic::error(self.to_string())
                .with_code("E0600")
                .with_primary(*span, format!("`{name}` is not in scope")),

            UnknownFunction { span, .. } => Diagnostic::error(self.to_string())
                .with_code("E0601")
                .with_primary(*span, "no such function or builtin"),

            ArityMismatch { expected, span, .. } => Diagnostic::error(self.to_string())
                .with_code("E0602")
                .with_primary(*span, format!("expected {expected} arguments")),

            LaneCountMismatch { expected, found, span } => Diagnostic::error(self.to_string())
                .with_code("E0603")
                .with_primary(*span, format!("{found} lanes here"))
                .with_note(format!("the surrounding code runs {expected} lanes")),

            InvalidConstruct { span, .. } => Diagnostic::error(self.to_string())
                .with_code("E0604")
                .with_primary(*span, "not supported here"),
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

impl ToDiagnostic for ConfigError {
    fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string()).with_code("E0700");
        match self {
            ConfigError::InvalidWidth { .. } | ConfigError::VectorExceedsLimit { .. } => {
                diag.with_help("widths are in bits and must be non-zero powers of two")
            }
            _ => diag,
        }
    }
}
