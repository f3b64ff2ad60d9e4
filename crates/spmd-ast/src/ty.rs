// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The uniform/varying type model.
//!
//! A uniform value is shared by every lane. A varying value holds one
//! element per lane at the function's effective lane count. A constrained
//! varying value always holds exactly `N` elements regardless of that count.

use std::fmt;

/// Scalar element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScalarType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl ScalarType {
    /// Storage width in bits. `bool` occupies a byte.
    pub fn bits(self) -> u32 {
        match self {
            ScalarType::Bool | ScalarType::I8 | ScalarType::U8 => 8,
            ScalarType::I16 | ScalarType::U16 => 16,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 32,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 64,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, ScalarType::Bool | ScalarType::F32 | ScalarType::F64)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarType::I8 | ScalarType::I16 | ScalarType::I32 | ScalarType::I64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::U8 => "u8",
            ScalarType::U16 => "u16",
            ScalarType::U32 => "u32",
            ScalarType::U64 => "u64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element type of a uniform or varying value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BaseType {
    Scalar(ScalarType),
    Array { elem: Box<BaseType>, len: u32 },
    Ptr(Box<BaseType>),
}

impl BaseType {
    pub fn array(elem: BaseType, len: u32) -> Self {
        BaseType::Array { elem: Box::new(elem), len }
    }

    pub fn bits(&self) -> u32 {
        match self {
            BaseType::Scalar(s) => s.bits(),
            BaseType::Array { elem, len } => elem.bits().saturating_mul(*len),
            BaseType::Ptr(_) => 64,
        }
    }

    pub fn as_scalar(&self) -> Option<ScalarType> {
        match self {
            BaseType::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// Width of one lane's element when this base is spread across lanes.
    /// `bool` yields `None`: masks follow the data they guard.
    pub fn lane_bits(&self) -> Option<u32> {
        match self {
            BaseType::Scalar(ScalarType::Bool) => None,
            BaseType::Scalar(s) => Some(s.bits()),
            BaseType::Array { elem, .. } => elem.lane_bits(),
            BaseType::Ptr(_) => Some(64),
        }
    }

    /// Element type of an array or pointee of a pointer.
    pub fn element(&self) -> Option<&BaseType> {
        match self {
            BaseType::Array { elem, .. } | BaseType::Ptr(elem) => Some(elem),
            BaseType::Scalar(_) => None,
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseType::Scalar(s) => write!(f, "{}", s),
            BaseType::Array { elem, len } => write!(f, "[{}; {}]", elem, len),
            BaseType::Ptr(elem) => write!(f, "*{}", elem),
        }
    }
}

/// Resolved type of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    /// No value; the type of calls to functions without a result.
    Void,
    Uniform(BaseType),
    Varying(BaseType),
    ConstrainedVarying(BaseType, u32),
}

impl Type {
    pub fn uniform(s: ScalarType) -> Self {
        Type::Uniform(BaseType::Scalar(s))
    }

    pub fn varying(s: ScalarType) -> Self {
        Type::Varying(BaseType::Scalar(s))
    }

    pub fn constrained(s: ScalarType, lanes: u32) -> Self {
        Type::ConstrainedVarying(BaseType::Scalar(s), lanes)
    }

    pub fn base(&self) -> Option<&BaseType> {
        match self {
            Type::Void => None,
            Type::Uniform(b) | Type::Varying(b) | Type::ConstrainedVarying(b, _) => Some(b),
        }
    }

    pub fn scalar(&self) -> Option<ScalarType> {
        self.base().and_then(BaseType::as_scalar)
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, Type::Uniform(_))
    }

    /// Varying or constrained varying.
    pub fn is_varying(&self) -> bool {
        matches!(self, Type::Varying(_) | Type::ConstrainedVarying(..))
    }

    pub fn constrained_lanes(&self) -> Option<u32> {
        match self {
            Type::ConstrainedVarying(_, n) => Some(*n),
            _ => None,
        }
    }

    /// Same variability, different base.
    pub fn with_base(&self, base: BaseType) -> Type {
        match self {
            Type::Void => Type::Void,
            Type::Uniform(_) => Type::Uniform(base),
            Type::Varying(_) => Type::Varying(base),
            Type::ConstrainedVarying(_, n) => Type::ConstrainedVarying(base, *n),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Uniform(b) => write!(f, "uniform {}", b),
            Type::Varying(b) => write!(f, "varying {}", b),
            Type::ConstrainedVarying(b, n) => write!(f, "varying[{}] {}", n, b),
        }
    }
}
