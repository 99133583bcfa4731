use crate::model::{ParamSpec, ValueType, Variable};

/// Sequential offset allocator for a flat memory buffer.
///
/// This does not touch any memory itself; it only hands out non-overlapping
/// `[offset, offset + size)` ranges. Offsets are fixed at allocation time.
#[derive(Debug, Clone, Default)]
pub struct MemoryLayout {
    next: usize,
}

impl MemoryLayout {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn allocate(&mut self, name: impl Into<String>, ty: ValueType) -> Variable {
        let var = Variable::new(name, ty, self.next);
        self.next += ty.size();
        var
    }

    pub fn allocate_all(&mut self, params: &[ParamSpec]) -> Vec<Variable> {
        params.iter().map(|p| self.allocate(p.name.clone(), p.ty)).collect()
    }

    /// Bytes allocated so far (the next free offset).
    pub fn size(&self) -> usize {
        self.next
    }
}
