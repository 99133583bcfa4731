//! Catalog of primitive operations available to the program builder.
//!
//! Entries are immutable once registered and handed out as `Arc`s, so the
//! catalog can be read from every evaluation thread at once.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::model::ValueType;

/// Semantics of a primitive operation, dispatched on by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    I32Add,
    I32Sub,
    I32Mul,
    I32Div,
    I32Mod,
    I32BitAnd,
    I32BitOr,
    I32BitXor,
    I32Shl,
    I32Shr,
    I32Neg,
    I32Copy,
    I32Zero,
    I32One,
    I32Lt,
    I32Gt,
    I32Eq,
    I32Select,
    BoolNot,
    BoolAnd,
    BoolOr,
    I64Add,
    I64Mul,
    I32ToI64,
    I64ToI32,
}

/// A named operation with a fixed typed input/output shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimitiveOp {
    pub name: String,
    pub kind: OpKind,
    pub inputs: Vec<ValueType>,
    pub outputs: Vec<ValueType>,
}

impl PrimitiveOp {
    pub fn new(
        name: impl Into<String>,
        kind: OpKind,
        inputs: Vec<ValueType>,
        outputs: Vec<ValueType>,
    ) -> Self {
        Self { name: name.into(), kind, inputs, outputs }
    }
}

impl fmt::Display for PrimitiveOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types = |tys: &[ValueType]| {
            tys.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
        };
        write!(f, "{}({}) -> ({})", self.name, types(&self.inputs), types(&self.outputs))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),
    #[error("Operation '{0}' is already registered")]
    Duplicate(String),
}

/// Ordered set of primitive operations.
///
/// Iteration order is registration order, which keeps seeded program
/// generation reproducible.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    ops: Vec<Arc<PrimitiveOp>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn register(&mut self, op: PrimitiveOp) -> Result<&mut Self, CatalogError> {
        if self.ops.iter().any(|existing| existing.name == op.name) {
            return Err(CatalogError::Duplicate(op.name));
        }
        self.ops.push(Arc::new(op));
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<Arc<PrimitiveOp>, CatalogError> {
        self.ops
            .iter()
            .find(|op| op.name == name)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownOperation(name.to_string()))
    }

    /// Build a catalog holding only `names`, in the order given.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Catalog, CatalogError> {
        let mut ops = Vec::with_capacity(names.len());
        for name in names {
            let op = self.get(name.as_ref())?;
            if !ops.iter().any(|o: &Arc<PrimitiveOp>| o.name == op.name) {
                ops.push(op);
            }
        }
        Ok(Catalog { ops })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PrimitiveOp>> {
        self.ops.iter()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Return a sorted list of operation names for help output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ops.iter().map(|op| op.name.clone()).collect();
        names.sort();
        names
    }

    /// The standard integer / boolean operation set.
    pub fn standard() -> Self {
        use OpKind::*;
        use ValueType::{Bool, I32, I64};

        let table: [(&str, OpKind, &[ValueType], &[ValueType]); 25] = [
            ("i32.add", I32Add, &[I32, I32], &[I32]),
            ("i32.sub", I32Sub, &[I32, I32], &[I32]),
            ("i32.mul", I32Mul, &[I32, I32], &[I32]),
            ("i32.div", I32Div, &[I32, I32], &[I32]),
            ("i32.mod", I32Mod, &[I32, I32], &[I32]),
            ("i32.bitand", I32BitAnd, &[I32, I32], &[I32]),
            ("i32.bitor", I32BitOr, &[I32, I32], &[I32]),
            ("i32.bitxor", I32BitXor, &[I32, I32], &[I32]),
            ("i32.bitshl", I32Shl, &[I32, I32], &[I32]),
            ("i32.bitshr", I32Shr, &[I32, I32], &[I32]),
            ("i32.neg", I32Neg, &[I32], &[I32]),
            ("i32.copy", I32Copy, &[I32], &[I32]),
            ("i32.zero", I32Zero, &[], &[I32]),
            ("i32.one", I32One, &[], &[I32]),
            ("i32.lt", I32Lt, &[I32, I32], &[Bool]),
            ("i32.gt", I32Gt, &[I32, I32], &[Bool]),
            ("i32.eq", I32Eq, &[I32, I32], &[Bool]),
            ("i32.select", I32Select, &[Bool, I32, I32], &[I32]),
            ("bool.not", BoolNot, &[Bool], &[Bool]),
            ("bool.and", BoolAnd, &[Bool, Bool], &[Bool]),
            ("bool.or", BoolOr, &[Bool, Bool], &[Bool]),
            ("i64.add", I64Add, &[I64, I64], &[I64]),
            ("i64.mul", I64Mul, &[I64, I64], &[I64]),
            ("i32.to_i64", I32ToI64, &[I32], &[I64]),
            ("i64.to_i32", I64ToI32, &[I64], &[I32]),
        ];

        let ops = table
            .iter()
            .map(|(name, kind, inputs, outputs)| {
                Arc::new(PrimitiveOp::new(*name, *kind, inputs.to_vec(), outputs.to_vec()))
            })
            .collect();
        Catalog { ops }
    }
}
