//! Core data model for candidate programs.
//!
//! This module contains:
//! - `ValueType` / `Value`: the scalar types that live in program memory and
//!   their fixed-width big-endian encoding.
//! - `Variable`: a named, typed slot at a fixed offset in the flat memory buffer.
//! - `Instruction`: one bound invocation of an operator.
//! - `CandidateFunction`: the evolving unit (signature + body + footprint).
//! - `Package`: a named group of functions.
//! - `FunctionSignature`: a serde-friendly signature description that is laid
//!   out into concrete offsets by [`crate::program::layout::MemoryLayout`].

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::PrimitiveOp;
use crate::program::layout::MemoryLayout;
use crate::program::LookupError;

/// Scalar types understood by the catalog and the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    I32,
    I64,
}

impl ValueType {
    /// Size in bytes of one value of this type in program memory.
    pub const fn size(self) -> usize {
        match self {
            ValueType::Bool => 1,
            ValueType::I32 => 4,
            ValueType::I64 => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded scalar read from (or about to be written to) program memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
}

impl Value {
    pub fn ty(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
        }
    }

    /// Decode a value of type `ty` from exactly `ty.size()` big-endian bytes.
    ///
    /// Returns `None` when `bytes` has the wrong width.
    pub fn decode(ty: ValueType, bytes: &[u8]) -> Option<Value> {
        match ty {
            ValueType::Bool => match bytes {
                [b] => Some(Value::Bool(*b != 0)),
                _ => None,
            },
            ValueType::I32 => bytes.try_into().ok().map(|b| Value::I32(i32::from_be_bytes(b))),
            ValueType::I64 => bytes.try_into().ok().map(|b| Value::I64(i64::from_be_bytes(b))),
        }
    }

    /// Encode into `out`, which must be exactly `self.ty().size()` bytes long.
    ///
    /// Returns `false` (and leaves `out` untouched) on a width mismatch.
    pub fn encode_into(&self, out: &mut [u8]) -> bool {
        if out.len() != self.ty().size() {
            return false;
        }
        match self {
            Value::Bool(b) => out[0] = u8::from(*b),
            Value::I32(v) => out.copy_from_slice(&v.to_be_bytes()),
            Value::I64(v) => out.copy_from_slice(&v.to_be_bytes()),
        }
        true
    }
}

/// A named, typed memory slot at a fixed byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    pub offset: usize,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: ValueType, offset: usize) -> Self {
        Self { name: name.into(), ty, offset }
    }

    pub fn size(&self) -> usize {
        self.ty.size()
    }

    /// Byte range occupied by this variable in program memory.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.size()
    }

    /// Two bindings refer to the same slot when offset and type agree.
    pub fn same_slot(&self, other: &Variable) -> bool {
        self.offset == other.offset && self.ty == other.ty
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.offset)
    }
}

/// What an instruction invokes.
#[derive(Debug, Clone)]
pub enum Operator {
    /// A catalog operation. Catalog entries are immutable and shared.
    Primitive(Arc<PrimitiveOp>),
    /// A call to another function in the same package, by name.
    Call(String),
}

impl Operator {
    pub fn name(&self) -> &str {
        match self {
            Operator::Primitive(op) => &op.name,
            Operator::Call(name) => name,
        }
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operator::Primitive(a), Operator::Primitive(b)) => a.name == b.name,
            (Operator::Call(a), Operator::Call(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Operator {}

/// Raised when an instruction's bindings disagree with its operator's shape.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("'{operator}' expects {expected} {direction} bindings, found {found}")]
    Arity { operator: String, direction: &'static str, expected: usize, found: usize },
    #[error("'{operator}' {direction} binding {index} expects {expected}, found {found}")]
    Type {
        operator: String,
        direction: &'static str,
        index: usize,
        expected: ValueType,
        found: ValueType,
    },
}

/// One bound invocation of an operator inside a function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub operator: Operator,
    pub inputs: Vec<Variable>,
    pub outputs: Vec<Variable>,
}

impl Instruction {
    pub fn primitive(op: Arc<PrimitiveOp>, inputs: Vec<Variable>, outputs: Vec<Variable>) -> Self {
        Self { operator: Operator::Primitive(op), inputs, outputs }
    }

    pub fn call(callee: impl Into<String>, inputs: Vec<Variable>, outputs: Vec<Variable>) -> Self {
        Self { operator: Operator::Call(callee.into()), inputs, outputs }
    }

    /// Verify bindings against a primitive operator's declared shape.
    ///
    /// Calls are checked by the engine against the callee at run time.
    pub fn check_shape(&self) -> Result<(), ShapeError> {
        let Operator::Primitive(op) = &self.operator else {
            return Ok(());
        };
        check_bindings(&op.name, "input", &op.inputs, &self.inputs)?;
        check_bindings(&op.name, "output", &op.outputs, &self.outputs)
    }
}

fn check_bindings(
    operator: &str,
    direction: &'static str,
    expected: &[ValueType],
    found: &[Variable],
) -> Result<(), ShapeError> {
    if expected.len() != found.len() {
        return Err(ShapeError::Arity {
            operator: operator.to_string(),
            direction,
            expected: expected.len(),
            found: found.len(),
        });
    }
    for (index, (ty, var)) in expected.iter().zip(found).enumerate() {
        if *ty != var.ty {
            return Err(ShapeError::Type {
                operator: operator.to_string(),
                direction,
                index,
                expected: *ty,
                found: var.ty,
            });
        }
    }
    Ok(())
}

fn join(vars: &[Variable]) -> String {
    vars.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.outputs.is_empty() {
            write!(f, "{} = ", join(&self.outputs))?;
        }
        write!(f, "{}({})", self.operator.name(), join(&self.inputs))
    }
}

/// The unit under evolution: a fixed signature plus a body of instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFunction {
    pub name: String,
    pub inputs: Vec<Variable>,
    pub outputs: Vec<Variable>,
    /// Scratch slots the body may write to besides inputs and outputs.
    pub locals: Vec<Variable>,
    pub body: Vec<Instruction>,
    /// Declared body length (instruction count).
    pub length: usize,
    /// Memory footprint in bytes.
    pub size: usize,
}

impl CandidateFunction {
    /// Create a function with an empty body.
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<Variable>,
        outputs: Vec<Variable>,
        locals: Vec<Variable>,
    ) -> Self {
        let mut function = Self {
            name: name.into(),
            inputs,
            outputs,
            locals,
            body: Vec::new(),
            length: 0,
            size: 0,
        };
        function.size = function.footprint();
        function
    }

    /// Every variable the body may bind an output to: inputs, outputs, then locals.
    pub fn declared_variables(&self) -> impl Iterator<Item = &Variable> + Clone {
        self.inputs.iter().chain(&self.outputs).chain(&self.locals)
    }

    /// Total byte size of the input signature.
    pub fn input_size(&self) -> usize {
        self.inputs.iter().map(Variable::size).sum()
    }

    /// Sum of the sizes of all distinct variables the function references
    /// (its signature plus every instruction binding).
    pub fn footprint(&self) -> usize {
        let mut slots: BTreeMap<usize, usize> = BTreeMap::new();
        let bindings = self.body.iter().flat_map(|instr| instr.inputs.iter().chain(&instr.outputs));
        for var in self.inputs.iter().chain(&self.outputs).chain(bindings) {
            let entry = slots.entry(var.offset).or_insert(0);
            *entry = (*entry).max(var.size());
        }
        slots.values().sum()
    }

    /// Highest byte offset (exclusive) touched by any variable of this function.
    pub fn memory_extent(&self) -> usize {
        let bindings = self.body.iter().flat_map(|instr| instr.inputs.iter().chain(&instr.outputs));
        self.declared_variables().chain(bindings).map(|v| v.range().end).max().unwrap_or(0)
    }

    /// Recompute `length` and `size` from the current body.
    pub fn refresh(&mut self) {
        self.length = self.body.len();
        self.size = self.footprint();
    }
}

impl fmt::Display for CandidateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "func {}({}) ({}) {{", self.name, join(&self.inputs), join(&self.outputs))?;
        for instr in &self.body {
            writeln!(f, "    {}", instr)?;
        }
        write!(f, "}}")
    }
}

/// A named group of functions; lookups are by function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub functions: Vec<CandidateFunction>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), functions: Vec::new() }
    }

    pub fn with_function(mut self, function: CandidateFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn get_function(&self, name: &str) -> Result<&CandidateFunction, LookupError> {
        self.functions.iter().find(|f| f.name == name).ok_or_else(|| self.not_found(name))
    }

    pub fn get_function_mut(&mut self, name: &str) -> Result<&mut CandidateFunction, LookupError> {
        let err = self.not_found(name);
        self.functions.iter_mut().find(|f| f.name == name).ok_or(err)
    }

    fn not_found(&self, name: &str) -> LookupError {
        LookupError::FunctionNotFound { package: self.name.clone(), function: name.to_string() }
    }
}

/// One named, typed parameter in a [`FunctionSignature`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Offset-free description of a function signature.
///
/// Laying it out assigns offsets once: inputs from 0, then outputs, then locals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub inputs: Vec<ParamSpec>,
    pub outputs: Vec<ParamSpec>,
    #[serde(default)]
    pub locals: Vec<ParamSpec>,
}

impl FunctionSignature {
    /// Lay out the signature from offset 0 and return an empty-bodied function.
    pub fn layout(&self, name: impl Into<String>) -> CandidateFunction {
        let mut layout = MemoryLayout::new();
        let inputs = layout.allocate_all(&self.inputs);
        let outputs = layout.allocate_all(&self.outputs);
        let locals = layout.allocate_all(&self.locals);
        CandidateFunction::new(name, inputs, outputs, locals)
    }
}
