// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! MIR types - every vector carries its element type and lane count.

use spmd_ast::ScalarType;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MirType {
    Void,
    Scalar(ScalarType),
    /// `elem x lanes`, e.g. `f32x4`.
    Vector { elem: ScalarType, lanes: u32 },
    /// One predicate bit per lane.
    Mask { lanes: u32 },
    Array { elem: Box<MirType>, len: u32 },
    Ptr(Box<MirType>),
}

impl MirType {
    pub fn bool() -> Self {
        MirType::Scalar(ScalarType::Bool)
    }

    pub fn array(elem: MirType, len: u32) -> Self {
        MirType::Array { elem: Box::new(elem), len }
    }

    /// Lane count of vectors and masks.
    pub fn lanes(&self) -> Option<u32> {
        match self {
            MirType::Vector { lanes, .. } | MirType::Mask { lanes } => Some(*lanes),
            _ => None,
        }
    }

    /// Scalar element of a scalar or vector. Masks report `bool`.
    pub fn elem(&self) -> Option<ScalarType> {
        match self {
            MirType::Scalar(s) | MirType::Vector { elem: s, .. } => Some(*s),
            MirType::Mask { .. } => Some(ScalarType::Bool),
            _ => None,
        }
    }

    pub fn is_mask(&self) -> bool {
        matches!(self, MirType::Mask { .. })
    }

    /// Element type of an array, or pointee of a pointer.
    pub fn element(&self) -> Option<&MirType> {
        match self {
            MirType::Array { elem, .. } | MirType::Ptr(elem) => Some(elem),
            _ => None,
        }
    }

    /// Same shape with a different lane count; scalars are unchanged.
    pub fn with_lanes(&self, lanes: u32) -> MirType {
        match self {
            MirType::Vector { elem, .. } => MirType::Vector { elem: *elem, lanes },
            MirType::Mask { .. } => MirType::Mask { lanes },
            MirType::Array { elem, len } => MirType::array(elem.with_lanes(lanes), *len),
            other => other.clone(),
        }
    }
}
