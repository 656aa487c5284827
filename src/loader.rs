// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Constant pool loader.
//!
//! Parses the prelude that precedes a bytecode buffer's code stream: a
//! one-byte count followed by that many tagged records. INT and NUM records
//! carry their bytes little-endian; STR records carry a one-byte length
//! followed by that many UTF-8 bytes, allocated onto the heap as they load.

#[cfg(test)]
mod loader_test;

use crate::error::VmError;
use crate::heap::Heap;
use crate::value::Value;

const TAG_INT: u8 = 0;
const TAG_NUM: u8 = 1;
const TAG_STR: u8 = 2;

/// The result of loading a bytecode buffer's constant pool prelude.
#[derive(Debug)]
pub struct LoadedConstants {
    /// The constant pool, in declaration order.
    pub constants: Vec<Value>,
    /// Byte offset of the first instruction, immediately after the prelude.
    pub code_start: usize,
}

/// Parse the constant pool prelude at the start of `bytes`, allocating any
/// STR records onto `heap`.
///
/// # Errors
///
/// Returns `VmError::TruncatedBytecode` if `bytes` ends before a full record
/// is read, `VmError::UnknownConstantTag` for an unrecognized tag byte, and
/// `VmError::InvalidConstantUtf8` if a STR record's bytes aren't valid UTF-8.
pub fn load_constants(bytes: &[u8], heap: &mut Heap) -> Result<LoadedConstants, VmError> {
    let mut cursor = 0usize;

    let count = *bytes
        .first()
        .ok_or(VmError::TruncatedBytecode("missing constant count"))?;
    cursor += 1;

    let mut constants = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let tag = *bytes
            .get(cursor)
            .ok_or(VmError::TruncatedBytecode("missing constant tag"))?;
        cursor += 1;

        let value = match tag {
            TAG_INT => {
                let raw = take::<4>(bytes, &mut cursor, "truncated INT constant")?;
                Value::int(i32::from_le_bytes(raw))
            }
            TAG_NUM => {
                let raw = take::<8>(bytes, &mut cursor, "truncated NUM constant")?;
                Value::num(f64::from_le_bytes(raw))
            }
            TAG_STR => {
                let len = *bytes
                    .get(cursor)
                    .ok_or(VmError::TruncatedBytecode("missing STR constant length"))?;
                cursor += 1;
                let end = cursor + len as usize;
                let raw = bytes
                    .get(cursor..end)
                    .ok_or(VmError::TruncatedBytecode("truncated STR constant"))?;
                let text = std::str::from_utf8(raw)
                    .map_err(|_| VmError::InvalidConstantUtf8)?
                    .to_string();
                cursor = end;
                Value::obj(heap.alloc_string(text))
            }
            other => return Err(VmError::UnknownConstantTag(other)),
        };
        constants.push(value);
    }

    Ok(LoadedConstants {
        constants,
        code_start: cursor,
    })
}

fn take<const N: usize>(
    bytes: &[u8],
    cursor: &mut usize,
    msg: &'static str,
) -> Result<[u8; N], VmError> {
    let end = *cursor + N;
    let slice = bytes.get(*cursor..end).ok_or(VmError::TruncatedBytecode(msg))?;
    *cursor = end;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok(out)
}
