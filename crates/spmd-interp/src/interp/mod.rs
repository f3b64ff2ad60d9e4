// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The evaluator.
//!
//! Walks the CFG of one function at a time. Each call gets a fresh frame of
//! locals; pointer arguments share their buffer with the caller.

use std::collections::HashMap;
use std::rc::Rc;

use spmd_mir::{LocalId, MirConst, MirFunction, MirOperand, MirStmt, MirTerminator, MirType};

mod eval;
mod lanes;
mod operators;

use crate::value::{Scalar, Value};

/// Host implementation of an `extern` function.
pub type ExternFn = Box<dyn Fn(&[Value]) -> Result<Value, RuntimeError>>;

const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

/// Runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("undefined function `{0}`")]
    UndefinedFunction(String),

    #[error("`{function}` expects {expected} argument{}, got {got}", if *.expected == 1 { "" } else { "s" })]
    ArityMismatch { function: String, expected: usize, got: usize },

    #[error("read of uninitialized local _{local} in `{function}`")]
    UninitializedLocal { function: String, local: u32 },

    #[error("index {index} out of bounds (length is {len})")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("type error: {0}")]
    TypeError(String),

    #[error("reached unreachable block bb{block} in `{function}`")]
    Unreachable { function: String, block: u32 },

    #[error("step limit of {0} blocks exceeded")]
    StepLimit(u64),
}

pub struct Interpreter<'m> {
    functions: HashMap<&'m str, &'m MirFunction>,
    externs: HashMap<String, ExternFn>,
    step_limit: u64,
    steps: u64,
}

/// Locals of one activation.
pub(crate) struct Frame<'m> {
    function: &'m MirFunction,
    locals: Vec<Option<Value>>,
}

impl<'m> Interpreter<'m> {
    pub fn new(functions: impl IntoIterator<Item = &'m MirFunction>) -> Self {
        Self {
            functions: functions.into_iter().map(|f| (f.name.as_str(), f)).collect(),
            externs: HashMap::new(),
            step_limit: DEFAULT_STEP_LIMIT,
            steps: 0,
        }
    }

    /// Stop with [`RuntimeError::StepLimit`] after this many blocks.
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn register_extern(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
    ) {
        self.externs.insert(name.into(), Box::new(f));
    }

    /// Call a function by name. SPMD functions expect their mask first.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if let Some(func) = self.functions.get(name).copied() {
            return self.call_function(func, args);
        }
        match self.externs.get(name) {
            Some(ext) => ext(&args),
            None => Err(RuntimeError::UndefinedFunction(name.to_string())),
        }
    }

    fn call_function(&mut self, func: &'m MirFunction, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if args.len() != func.params.len() {
            return Err(RuntimeError::ArityMismatch {
                function: func.name.clone(),
                expected: func.params.len(),
                got: args.len(),
            });
        }
        log::trace!("enter `{}`", func.name);

        let mut frame = Frame { function: func, locals: vec![None; func.locals.len()] };
        for (param, arg) in func.params.iter().zip(args) {
            frame.write(param.id, arg)?;
        }

        let mut current = func.entry_block;
        loop {
            self.steps += 1;
            if self.steps > self.step_limit {
                return Err(RuntimeError::StepLimit(self.step_limit));
            }
            let block = func.block(current).ok_or_else(|| RuntimeError::Unreachable {
                function: func.name.clone(),
                block: current.0,
            })?;
            for stmt in &block.statements {
                self.exec_stmt(&mut frame, stmt)?;
            }
            current = match &block.terminator {
                MirTerminator::Return { value } => {
                    return match value {
                        Some(op) => frame.operand(op),
                        None => Ok(Value::Unit),
                    };
                }
                MirTerminator::Goto { target } => *target,
                MirTerminator::Branch { cond, then_block, else_block } => {
                    match frame.operand(cond)?.as_scalar().and_then(Scalar::as_bool) {
                        Some(true) => *then_block,
                        Some(false) => *else_block,
                        None => return Err(RuntimeError::TypeError("branch on a non-bool".into())),
                    }
                }
                MirTerminator::Switch { value, cases, default } => {
                    let v = frame
                        .operand(value)?
                        .as_int()
                        .ok_or_else(|| RuntimeError::TypeError("switch on a non-integer".into()))?;
                    cases.iter().find(|(c, _)| *c == v).map_or(*default, |(_, b)| *b)
                }
                MirTerminator::Unreachable => {
                    return Err(RuntimeError::Unreachable {
                        function: func.name.clone(),
                        block: current.0,
                    });
                }
            };
        }
    }

    fn exec_stmt(&mut self, frame: &mut Frame<'m>, stmt: &MirStmt) -> Result<(), RuntimeError> {
        match stmt {
            MirStmt::Assign { dst, rvalue } => {
                let ty = frame.ty(*dst)?;
                let value = frame.eval_rvalue(rvalue, ty)?;
                frame.write(*dst, value)
            }
            MirStmt::Store { base, index, value, guard } => {
                if let Some(guard) = guard {
                    if frame.operand(guard)?.as_scalar().and_then(Scalar::as_bool) != Some(true) {
                        return Ok(());
                    }
                }
                let index = frame.operand(index)?;
                let value = frame.operand(value)?;
                frame.store(*base, &index, &value, None)
            }
            MirStmt::MaskedStore { base, index, value, mask } => {
                let mask = frame.mask(mask)?;
                let index = frame.operand(index)?;
                let value = frame.operand(value)?;
                frame.store(*base, &index, &value, Some(&mask))
            }
            MirStmt::Call { dst, func, args } => {
                let args = args.iter().map(|a| frame.operand(a)).collect::<Result<Vec<_>, _>>()?;
                let result = self.call(&func.name, args)?;
                match dst {
                    Some(dst) => frame.write(*dst, result),
                    None => Ok(()),
                }
            }
        }
    }
}

impl<'m> Frame<'m> {
    fn slot(&mut self, id: LocalId) -> Result<&mut Option<Value>, RuntimeError> {
        let function = &self.function.name;
        self.locals.get_mut(id.0 as usize).ok_or_else(|| RuntimeError::UninitializedLocal {
            function: function.clone(),
            local: id.0,
        })
    }

    fn write(&mut self, id: LocalId, value: Value) -> Result<(), RuntimeError> {
        *self.slot(id)? = Some(value);
        Ok(())
    }

    fn read(&self, id: LocalId) -> Result<&Value, RuntimeError> {
        self.locals
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| RuntimeError::UninitializedLocal {
                function: self.function.name.clone(),
                local: id.0,
            })
    }

    fn ty(&self, id: LocalId) -> Result<&'m MirType, RuntimeError> {
        self.function.local(id).map(|l| &l.ty).ok_or_else(|| RuntimeError::UninitializedLocal {
            function: self.function.name.clone(),
            local: id.0,
        })
    }

    pub(crate) fn operand(&self, op: &MirOperand) -> Result<Value, RuntimeError> {
        match op {
            MirOperand::Local(id) => self.read(*id).cloned(),
            MirOperand::Constant(c) => Ok(Value::Scalar(match c {
                MirConst::Int(v) => Scalar::Int(*v),
                MirConst::Float(v) => Scalar::Float(*v),
                MirConst::Bool(b) => Scalar::Bool(*b),
            })),
        }
    }

    /// Write through `base`. A vector index scatters lane by lane in
    /// increasing lane order; a scalar index into a varying element blends
    /// the active lanes.
    fn store(
        &mut self,
        base: LocalId,
        index: &Value,
        value: &Value,
        mask: Option<&[bool]>,
    ) -> Result<(), RuntimeError> {
        let is_active = |lane: usize| mask.map_or(true, |m| m.get(lane).copied().unwrap_or(false));
        let write = |elems: &mut Vec<Value>| -> Result<(), RuntimeError> {
            match index {
                Value::Scalar(s) => {
                    let i = checked_index(*s, elems.len())?;
                    match mask {
                        Some(m) if elems[i].lanes().is_some() => {
                            elems[i] = lanes::select(m, value, &elems[i])?;
                        }
                        Some(m) if !m.iter().any(|b| *b) => {}
                        _ => elems[i] = value.clone(),
                    }
                    Ok(())
                }
                Value::Vector(indices) => {
                    for (lane, idx) in indices.iter().enumerate() {
                        if !is_active(lane) {
                            continue;
                        }
                        let i = checked_index(*idx, elems.len())?;
                        elems[i] = lane_of(value, lane)?;
                    }
                    Ok(())
                }
                other => Err(RuntimeError::TypeError(format!("cannot index with {}", other.type_name()))),
            }
        };

        let function = self.function.name.clone();
        match self.slot(base)? {
            Some(Value::Buffer(buf)) => {
                let buf = Rc::clone(buf);
                let mut elems = buf.borrow_mut();
                write(&mut *elems)
            }
            Some(Value::Array(elems)) => write(elems),
            Some(other) => Err(RuntimeError::TypeError(format!("store into {}", other.type_name()))),
            None => Err(RuntimeError::UninitializedLocal { function, local: base.0 }),
        }
    }
}

/// Lane `lane` of a vector or mask; scalars stand for every lane.
fn lane_of(value: &Value, lane: usize) -> Result<Value, RuntimeError> {
    match value {
        Value::Scalar(_) => Ok(value.clone()),
        _ => value
            .lanes()
            .and_then(|l| l.get(lane).copied())
            .map(Value::Scalar)
            .ok_or_else(|| RuntimeError::TypeError(format!("no lane {} in {}", lane, value.type_name()))),
    }
}

fn checked_index(index: Scalar, len: usize) -> Result<usize, RuntimeError> {
    let i = index
        .as_int()
        .ok_or_else(|| RuntimeError::TypeError("index must be an integer".into()))?;
    if i < 0 || i as usize >= len {
        return Err(RuntimeError::IndexOutOfBounds { index: i, len });
    }
    Ok(i as usize)
}

/// Run `f` over the elements behind an array or buffer value.
fn read_elements<R>(
    base: &Value,
    f: impl FnOnce(&[Value]) -> Result<R, RuntimeError>,
) -> Result<R, RuntimeError> {
    match base {
        Value::Array(elems) => f(elems),
        Value::Buffer(buf) => f(&buf.borrow()),
        other => Err(RuntimeError::TypeError(format!("cannot index into {}", other.type_name()))),
    }
}

#[cfg(test)]
mod tests;
