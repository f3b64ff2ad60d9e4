// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use spmd_ast::ScalarType;

/// One lane's worth of data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// Integers of every width, kept wrapped to their declared type.
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    pub fn zero(ty: ScalarType) -> Self {
        if ty == ScalarType::Bool {
            Scalar::Bool(false)
        } else if ty.is_float() {
            Scalar::Float(0.0)
        } else {
            Scalar::Int(0)
        }
    }

    pub fn as_int(self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(v),
            Scalar::Bool(b) => Some(i64::from(b)),
            Scalar::Float(_) => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_float(self) -> f64 {
        match self {
            Scalar::Int(v) => v as f64,
            Scalar::Float(v) => v,
            Scalar::Bool(b) => f64::from(u8::from(b)),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Memory behind a pointer argument, shared between caller and callee.
pub type Buffer = Rc<RefCell<Vec<Value>>>;

/// A runtime value in the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Scalar(Scalar),
    Vector(Vec<Scalar>),
    Mask(Vec<bool>),
    /// Fixed-size array, copied on assignment.
    Array(Vec<Value>),
    Buffer(Buffer),
}

impl Value {
    pub fn int(v: i64) -> Self {
        Value::Scalar(Scalar::Int(v))
    }

    pub fn float(v: f64) -> Self {
        Value::Scalar(Scalar::Float(v))
    }

    pub fn bool(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }

    pub fn ints(values: impl IntoIterator<Item = i64>) -> Self {
        Value::Vector(values.into_iter().map(Scalar::Int).collect())
    }

    pub fn mask(lanes: impl IntoIterator<Item = bool>) -> Self {
        Value::Mask(lanes.into_iter().collect())
    }

    /// Fresh buffer holding `values`.
    pub fn buffer(values: impl IntoIterator<Item = Value>) -> Self {
        Value::Buffer(Rc::new(RefCell::new(values.into_iter().collect())))
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        self.as_scalar().and_then(Scalar::as_int)
    }

    pub fn as_mask(&self) -> Option<&[bool]> {
        match self {
            Value::Mask(m) => Some(m),
            _ => None,
        }
    }

    /// Lanes of a vector or mask as scalars.
    pub fn lanes(&self) -> Option<Vec<Scalar>> {
        match self {
            Value::Vector(v) => Some(v.clone()),
            Value::Mask(m) => Some(m.iter().map(|b| Scalar::Bool(*b)).collect()),
            _ => None,
        }
    }

    /// Rebuild a lane-wise value, as a mask when every lane is a bool.
    pub fn from_lanes(lanes: Vec<Scalar>) -> Self {
        if !lanes.is_empty() && lanes.iter().all(|s| matches!(s, Scalar::Bool(_))) {
            Value::Mask(lanes.iter().filter_map(|s| s.as_bool()).collect())
        } else {
            Value::Vector(lanes)
        }
    }

    /// Copy of the buffer's contents, for inspecting results.
    pub fn snapshot(&self) -> Option<Vec<Value>> {
        match self {
            Value::Buffer(b) => Some(b.borrow().clone()),
            Value::Array(a) => Some(a.clone()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Scalar(Scalar::Int(_)) => "int",
            Value::Scalar(Scalar::Float(_)) => "float",
            Value::Scalar(Scalar::Bool(_)) => "bool",
            Value::Vector(_) => "vector",
            Value::Mask(_) => "mask",
            Value::Array(_) => "array",
            Value::Buffer(_) => "buffer",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Scalar(s) => write!(f, "{}", s),
            Value::Vector(lanes) => {
                let parts: Vec<String> = lanes.iter().map(|s| s.to_string()).collect();
                write!(f, "<{}>", parts.join(", "))
            }
            Value::Mask(lanes) => {
                let bits: String = lanes.iter().map(|b| if *b { '1' } else { '0' }).collect();
                write!(f, "mask({})", bits)
            }
            Value::Array(elems) => {
                let parts: Vec<String> = elems.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Buffer(b) => write!(f, "&{}", Value::Array(b.borrow().clone())),
        }
    }
}
