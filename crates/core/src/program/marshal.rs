//! Moving test data into and out of a program's memory.
//!
//! The solution's inputs are laid out from offset 0, so injection is a plain
//! copy to the start of the buffer. Extraction reads each declared output at
//! its own offset.

use thiserror::Error;

use crate::model::CandidateFunction;
use crate::program::Program;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("Input of {len} bytes exceeds the solution's declared input size of {capacity} bytes")]
    InputTooLarge { len: usize, capacity: usize },
    #[error("Range {offset}..{end} is outside program memory of {memory} bytes")]
    OutOfBounds { offset: usize, end: usize, memory: usize },
    #[error("Expected a {expected}-byte value, found {found} bytes")]
    Width { expected: usize, found: usize },
}

/// Total byte size of the solution's inputs.
pub fn input_byte_size(solution: &CandidateFunction) -> usize {
    solution.input_size()
}

/// Copy `inputs` into program memory starting at offset 0.
pub fn inject_inputs(
    program: &mut Program,
    solution: &CandidateFunction,
    inputs: &[u8],
) -> Result<(), MarshalError> {
    let capacity = input_byte_size(solution);
    if inputs.len() > capacity {
        return Err(MarshalError::InputTooLarge { len: inputs.len(), capacity });
    }
    let memory = program.memory.len();
    let target = program.memory.get_mut(..inputs.len()).ok_or(MarshalError::OutOfBounds {
        offset: 0,
        end: inputs.len(),
        memory,
    })?;
    target.copy_from_slice(inputs);
    Ok(())
}

/// Read back the bytes of every declared output, in declaration order.
pub fn extract_outputs<'a>(
    program: &'a Program,
    solution: &CandidateFunction,
) -> Result<Vec<&'a [u8]>, MarshalError> {
    solution
        .outputs
        .iter()
        .map(|out| {
            let range = out.range();
            program.memory.get(range.clone()).ok_or(MarshalError::OutOfBounds {
                offset: range.start,
                end: range.end,
                memory: program.memory.len(),
            })
        })
        .collect()
}

/// Fixed-width big-endian encoding used for injected integers.
pub fn encode_i32(value: i32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Decode a big-endian `u32` from exactly four bytes.
pub fn decode_u32(bytes: &[u8]) -> Result<u32, MarshalError> {
    let raw: [u8; 4] = bytes
        .try_into()
        .map_err(|_| MarshalError::Width { expected: 4, found: bytes.len() })?;
    Ok(u32::from_be_bytes(raw))
}
