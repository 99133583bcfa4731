use anyhow::{Context, Result};
use evolve_core::catalog::Catalog;
use evolve_core::model::ValueType;
use serde::Serialize;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    pub name: String,
    pub inputs: Vec<ValueType>,
    pub outputs: Vec<ValueType>,
}

/// Operations of the standard catalog, sorted by name.
pub fn collect_operations() -> Vec<OperationInfo> {
    let mut ops: Vec<OperationInfo> = Catalog::standard()
        .iter()
        .map(|op| OperationInfo {
            name: op.name.clone(),
            inputs: op.inputs.clone(),
            outputs: op.outputs.clone(),
        })
        .collect();
    ops.sort_by(|a, b| a.name.cmp(&b.name));
    ops
}

/// List the operations a task file may reference.
pub fn list_ops_command(json: bool) -> Result<()> {
    let ops = collect_operations();

    if json {
        let serialized = serde_json::to_string_pretty(&ops)
            .context("Failed to serialize operations to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    println!("Operations ({}):", ops.len());
    let types = |tys: &[ValueType]| tys.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ");
    for op in ops {
        println!("  - {}({}) -> ({})", op.name, types(&op.inputs), types(&op.outputs));
    }
    Ok(())
}
