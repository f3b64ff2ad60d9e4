// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The fixed set of builtin entry points.

/// Cross-lane folds exposed as `reduce.*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceKind {
    Add,
    Mul,
    Max,
    Min,
    Or,
    And,
    Xor,
    /// Every active lane true; inactive lanes count as true.
    All,
    /// Some active lane true; inactive lanes count as false.
    Any,
    /// Lowest active lane holding true, or -1.
    FindFirstSet,
    /// Number of active lanes holding true.
    Count,
}

impl ReduceKind {
    /// Takes a boolean operand and ignores the element type.
    pub fn is_predicate(self) -> bool {
        matches!(
            self,
            ReduceKind::All | ReduceKind::Any | ReduceKind::FindFirstSet | ReduceKind::Count
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ReduceKind::Add => "add",
            ReduceKind::Mul => "mul",
            ReduceKind::Max => "max",
            ReduceKind::Min => "min",
            ReduceKind::Or => "or",
            ReduceKind::And => "and",
            ReduceKind::Xor => "xor",
            ReduceKind::All => "all",
            ReduceKind::Any => "any",
            ReduceKind::FindFirstSet => "find_first_set",
            ReduceKind::Count => "count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    LaneIndex,
    Broadcast,
    Rotate,
    Swizzle,
    ShiftLeft,
    ShiftRight,
    FromConstrained,
    From,
    Reduce(ReduceKind),
}

const TABLE: &[(&str, Builtin)] = &[
    ("lanes.Index", Builtin::LaneIndex),
    ("lanes.Broadcast", Builtin::Broadcast),
    ("lanes.Rotate", Builtin::Rotate),
    ("lanes.Swizzle", Builtin::Swizzle),
    ("lanes.ShiftLeft", Builtin::ShiftLeft),
    ("lanes.ShiftRight", Builtin::ShiftRight),
    ("lanes.FromConstrained", Builtin::FromConstrained),
    ("reduce.From", Builtin::From),
    ("reduce.Add", Builtin::Reduce(ReduceKind::Add)),
    ("reduce.Mul", Builtin::Reduce(ReduceKind::Mul)),
    ("reduce.Max", Builtin::Reduce(ReduceKind::Max)),
    ("reduce.Min", Builtin::Reduce(ReduceKind::Min)),
    ("reduce.Or", Builtin::Reduce(ReduceKind::Or)),
    ("reduce.And", Builtin::Reduce(ReduceKind::And)),
    ("reduce.Xor", Builtin::Reduce(ReduceKind::Xor)),
    ("reduce.All", Builtin::Reduce(ReduceKind::All)),
    ("reduce.Any", Builtin::Reduce(ReduceKind::Any)),
    ("reduce.FindFirstSet", Builtin::Reduce(ReduceKind::FindFirstSet)),
    ("reduce.Count", Builtin::Reduce(ReduceKind::Count)),
];

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        TABLE.iter().find(|(n, _)| *n == name).map(|(_, b)| *b)
    }

    pub fn name(self) -> &'static str {
        TABLE
            .iter()
            .find(|(_, b)| *b == self)
            .map(|(n, _)| *n)
            .unwrap_or("<builtin>")
    }

    /// Entry points exempt from the public-SPMD visibility rule.
    pub fn entry_points() -> impl Iterator<Item = &'static str> {
        TABLE.iter().map(|(n, _)| *n)
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::LaneIndex => 0,
            Builtin::Broadcast
            | Builtin::Rotate
            | Builtin::Swizzle
            | Builtin::ShiftLeft
            | Builtin::ShiftRight => 2,
            Builtin::FromConstrained | Builtin::From | Builtin::Reduce(_) => 1,
        }
    }

    /// Only meaningful where a lane count is in effect.
    pub fn needs_lane_context(self) -> bool {
        matches!(self, Builtin::LaneIndex)
    }
}
