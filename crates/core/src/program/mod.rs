//! Program handle: packages, flat memory, and execution bookkeeping.
//!
//! A `Program` exclusively owns everything it holds. Cloning one is a deep copy
//! (packages, function bodies, memory buffer), which is what keeps population
//! members from observing each other's mutations. The only shared pieces are
//! catalog entries, which are immutable.
//!
//! Submodules:
//! - `layout`: one-time offset assignment for signatures.
//! - `marshal`: injecting inputs and extracting outputs.
//! - `adapter`: rewiring `main` around the solution under evolution.

pub mod adapter;
pub mod layout;
pub mod marshal;

use thiserror::Error;

use crate::model::{CandidateFunction, Package};

/// Name of the package holding the entry point and the solution.
pub const MAIN_PKG: &str = "main";

/// Name of the entry-point function.
pub const MAIN_FUNC: &str = "main";

/// Maximum depth of the call stack.
pub const CALL_STACK_SIZE: usize = 64;

/// Failed lookup of a package or function by name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Package '{0}' not found")]
    PackageNotFound(String),
    #[error("Function '{function}' not found in package '{package}'")]
    FunctionNotFound { package: String, function: String },
}

/// One active function invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub package: String,
    pub function: String,
    /// Index of the next instruction to execute.
    pub pc: usize,
    /// Caller-side output bindings to fill when this frame returns.
    pub returns_to: Vec<crate::model::Variable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub packages: Vec<Package>,
    pub memory: Vec<u8>,
    pub call_stack: Vec<CallFrame>,
    pub call_counter: usize,
    pub stack_pointer: usize,
    pub terminated: bool,
}

impl Program {
    /// Build a program whose memory is sized to hold every variable of every function.
    pub fn new(packages: Vec<Package>) -> Self {
        let mut program = Self {
            packages,
            memory: Vec::new(),
            call_stack: Vec::with_capacity(CALL_STACK_SIZE),
            call_counter: 0,
            stack_pointer: 0,
            terminated: false,
        };
        program.fit_memory();
        program
    }

    /// Highest byte offset (exclusive) referenced by any function.
    pub fn required_memory(&self) -> usize {
        self.packages
            .iter()
            .flat_map(|pkg| pkg.functions.iter())
            .map(CandidateFunction::memory_extent)
            .max()
            .unwrap_or(0)
    }

    /// Grow the memory buffer (zero-filled) until every variable fits.
    ///
    /// Never shrinks and never moves existing bytes: offsets stay valid.
    pub fn fit_memory(&mut self) {
        let required = self.required_memory();
        if self.memory.len() < required {
            self.memory.resize(required, 0);
        }
    }

    pub fn get_package(&self, name: &str) -> Result<&Package, LookupError> {
        self.packages
            .iter()
            .find(|pkg| pkg.name == name)
            .ok_or_else(|| LookupError::PackageNotFound(name.to_string()))
    }

    pub fn get_package_mut(&mut self, name: &str) -> Result<&mut Package, LookupError> {
        self.packages
            .iter_mut()
            .find(|pkg| pkg.name == name)
            .ok_or_else(|| LookupError::PackageNotFound(name.to_string()))
    }

    pub fn get_function(
        &self,
        name: &str,
        package: &str,
    ) -> Result<&CandidateFunction, LookupError> {
        self.get_package(package)?.get_function(name)
    }

    pub fn get_function_mut(
        &mut self,
        name: &str,
        package: &str,
    ) -> Result<&mut CandidateFunction, LookupError> {
        self.get_package_mut(package)?.get_function_mut(name)
    }

    /// Zero the execution state: call stack, call counter, stack pointer, terminated flag.
    ///
    /// Memory contents are left alone; see [`Program::restore_memory`].
    pub fn reset(&mut self) {
        self.call_stack.clear();
        self.call_counter = 0;
        self.stack_pointer = 0;
        self.terminated = false;
    }

    /// Overwrite memory contents from a snapshot taken from this program.
    ///
    /// The layout is untouched; only bytes change. A snapshot of a different
    /// length replaces the buffer wholesale.
    pub fn restore_memory(&mut self, snapshot: &[u8]) {
        if self.memory.len() == snapshot.len() {
            self.memory.copy_from_slice(snapshot);
        } else {
            self.memory = snapshot.to_vec();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FunctionSignature, ParamSpec, ValueType};

    fn sample() -> Program {
        let signature = FunctionSignature {
            inputs: vec![ParamSpec::new("x", ValueType::I32)],
            outputs: vec![ParamSpec::new("out", ValueType::I32)],
            locals: vec![ParamSpec::new("flag", ValueType::Bool)],
        };
        let package = Package::new(MAIN_PKG).with_function(signature.layout("solution"));
        Program::new(vec![package])
    }

    #[test]
    fn memory_covers_all_declared_variables() {
        let program = sample();
        assert_eq!(program.memory.len(), 9);
    }

    #[test]
    fn lookups_report_missing_names() {
        let program = sample();
        assert!(program.get_function("solution", MAIN_PKG).is_ok());
        assert_eq!(
            program.get_package("lib").unwrap_err(),
            LookupError::PackageNotFound("lib".into())
        );
        assert_eq!(
            program.get_function("missing", MAIN_PKG).unwrap_err(),
            LookupError::FunctionNotFound { package: "main".into(), function: "missing".into() }
        );
    }

    #[test]
    fn reset_clears_execution_state_only() {
        let mut program = sample();
        program.memory[0] = 7;
        program.call_counter = 3;
        program.stack_pointer = 12;
        program.terminated = true;
        program.call_stack.push(CallFrame {
            package: MAIN_PKG.into(),
            function: MAIN_FUNC.into(),
            pc: 1,
            returns_to: vec![],
        });

        program.reset();

        assert!(program.call_stack.is_empty());
        assert_eq!(program.call_counter, 0);
        assert_eq!(program.stack_pointer, 0);
        assert!(!program.terminated);
        assert_eq!(program.memory[0], 7);
    }

    #[test]
    fn clones_do_not_share_memory() {
        let original = sample();
        let mut copy = original.clone();
        copy.memory[0] = 0xff;
        assert_eq!(original.memory[0], 0);
    }
}
