// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Stringification of ClearVM values.
//!
//! Produces the String object that backs the `STR` coercion opcode and the
//! general "print a value" need elsewhere in the engine.

#[cfg(test)]
mod printer_test;

use super::Value;
use crate::heap::Heap;

/// Render a value's decimal text per the VM's stringification rules and
/// allocate it as a new String object.
///
/// Applying this to a value that is already a String OBJ is an identity:
/// the same heap reference is returned and no allocation happens.
#[must_use]
pub fn stringify(value: &Value, heap: &mut Heap) -> Value {
    if let Value::Obj(obj) = value {
        if obj.is_string() {
            return value.clone();
        }
    }

    let text = render(value);
    Value::Obj(heap.alloc_string(text))
}

/// The text a value renders to, without allocating it onto the heap.
///
/// Used both by `stringify` and to build the `<struct>`-style tag for
/// non-string heap objects.
fn render(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Num(n) => format_num(*n),
        Value::Obj(obj) => match obj.as_str() {
            Some(s) => s.to_string(),
            None => format!("<{}>", obj.type_name()),
        },
        Value::Ip(_) | Value::Fp(_) => format!("<{}>", value.type_name()),
    }
}

/// Format a NUM with up to 7 decimal places, trailing zeros (and a bare
/// trailing decimal point) trimmed.
fn format_num(n: f64) -> String {
    let full = format!("{n:.7}");
    if full.contains('.') {
        let trimmed = full.trim_end_matches('0');
        trimmed.strip_suffix('.').unwrap_or(trimmed).to_string()
    } else {
        full
    }
}
