// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Execution engine for ClearVM.
//!
//! Owns the value stack, frame pointer, constant pool, globals table, and
//! object heap, and dispatches one handler per opcode byte until the code
//! stream is exhausted or a handler fails. There is no separate frame stack:
//! a call pushes its saved IP/FP as ordinary stack values (see `StackSlot`),
//! matching the source's stack-embedded frame pointer layout.

#[cfg(test)]
mod vm_test;

use crate::bytecode::op;
use crate::error::VmError;
use crate::globals::Globals;
use crate::heap::{Heap, ObjRef, StructObj, UpvalueState};
use crate::loader::load_constants;
use crate::output::Output;
use crate::value::{printer, Value, EPSILON};
use std::cell::RefCell;
use std::time::Instant;

/// Default maximum depth of the value stack.
const DEFAULT_MAX_STACK: usize = 256;
/// Default capacity of the globals table.
const DEFAULT_MAX_GLOBALS: usize = 256;

/// Configurable bounds for a VM instance.
#[derive(Debug, Clone, Copy)]
pub struct VmLimits {
    /// Maximum number of values the value stack may hold at once.
    pub max_stack: usize,
    /// Number of slots in the globals table.
    pub max_globals: usize,
}

impl VmLimits {
    /// Build a limits value with explicit bounds.
    #[must_use]
    pub const fn new(max_stack: usize, max_globals: usize) -> Self {
        Self {
            max_stack,
            max_globals,
        }
    }
}

impl Default for VmLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STACK, DEFAULT_MAX_GLOBALS)
    }
}

/// A value held on the stack, plus whatever upvalue cells currently observe
/// this slot's position.
///
/// Attaching the reference list to the slot rather than to `Value` itself
/// keeps a bare `Value` (e.g. one stored in a constant or a struct field)
/// free of unused capacity for a list that is almost always empty.
#[derive(Debug)]
struct StackSlot {
    value: Value,
    upvalues: Vec<ObjRef>,
}

impl StackSlot {
    fn new(value: Value) -> Self {
        Self {
            value,
            upvalues: Vec::new(),
        }
    }
}

/// The ClearVM execution engine.
#[derive(Debug)]
pub struct Vm {
    stack: Vec<StackSlot>,
    fp: usize,
    return_slot: Value,
    constants: Vec<Value>,
    globals: Globals,
    heap: Heap,
    limits: VmLimits,
    started_at: Instant,
}

impl Vm {
    /// Build a VM with the default stack depth and globals capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(VmLimits::default())
    }

    /// Build a VM with explicit bounds.
    #[must_use]
    pub fn with_limits(limits: VmLimits) -> Self {
        Self {
            stack: Vec::new(),
            fp: 0,
            return_slot: Value::Nil,
            constants: Vec::new(),
            globals: Globals::new(limits.max_globals),
            heap: Heap::new(),
            limits,
            started_at: Instant::now(),
        }
    }

    /// Load the constant pool prelude from `bytes` and run the code stream
    /// that follows it to completion, writing any `PRINT`ed lines to
    /// `output`.
    ///
    /// # Errors
    ///
    /// Returns the first `VmError` raised by loading or dispatch. A
    /// one-line diagnostic is also written to standard error and to the
    /// `log` facade before the error is returned, independent of whether a
    /// logging backend is installed.
    pub fn execute(&mut self, bytes: &[u8], output: &mut dyn Output) -> Result<(), VmError> {
        let loaded = load_constants(bytes, &mut self.heap)?;
        log::debug!("loaded {} constants", loaded.constants.len());
        self.constants = loaded.constants;

        let code = &bytes[loaded.code_start..];
        let mut ip = 0usize;
        let result = self.run(code, &mut ip, output);

        if let Err(ref err) = result {
            log::error!("execution failed at ip={ip}: {err}");
            eprintln!("clearvm: {err}");
        }
        log::debug!("vm teardown, executed {} code bytes", code.len());
        result
    }

    fn run(&mut self, code: &[u8], ip: &mut usize, output: &mut dyn Output) -> Result<(), VmError> {
        while *ip < code.len() {
            let opcode = code[*ip];
            *ip += 1;
            self.dispatch(opcode, code, ip, output)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn dispatch(
        &mut self,
        opcode: u8,
        code: &[u8],
        ip: &mut usize,
        output: &mut dyn Output,
    ) -> Result<(), VmError> {
        match opcode {
            op::PUSH_CONST => {
                let k = self.read_u8(code, ip)?;
                let value = self.constant(k as usize)?;
                self.push(value)?;
            }
            op::PUSH_TRUE => self.push(Value::bool(true))?,
            op::PUSH_FALSE => self.push(Value::bool(false))?,
            op::PUSH_NIL => self.push(Value::nil())?,

            op::SET_GLOBAL => {
                let k = self.read_u8(code, ip)?;
                let value = self.pop()?;
                self.globals.set(k as usize, value)?;
            }
            op::PUSH_GLOBAL => {
                let k = self.read_u8(code, ip)?;
                let value = self.globals.get(k as usize)?;
                self.push(value)?;
            }
            op::SET_LOCAL => {
                let k = self.read_u8(code, ip)?;
                let value = self.pop()?;
                self.set_local(k as usize, value)?;
            }
            op::PUSH_LOCAL => {
                let k = self.read_u8(code, ip)?;
                let value = self.local(k as usize)?;
                self.push(value)?;
            }

            op::INT => self.coerce_int()?,
            op::BOOL => self.coerce_bool()?,
            op::NUM => self.coerce_num()?,
            op::STR => self.coerce_str()?,

            op::CLOCK => {
                let elapsed = self.started_at.elapsed().as_secs_f64();
                self.push(Value::num(elapsed))?;
            }

            op::PRINT => self.print(output)?,
            op::POP => {
                self.pop()?;
            }

            op::INT_NEG => self.unary(|v| Ok(Value::int(as_int(v, "INT_NEG")?.wrapping_neg())))?,
            op::NUM_NEG => self.unary(|v| Ok(Value::num(-as_num(v, "NUM_NEG")?)))?,
            op::NOT => self.unary(|v| Ok(Value::bool(!as_bool(v, "NOT")?)))?,

            op::INT_ADD => self.binary(|a, b| {
                Ok(Value::int(as_int(a, "INT_ADD")?.wrapping_add(as_int(b, "INT_ADD")?)))
            })?,
            op::NUM_ADD => {
                self.binary(|a, b| Ok(Value::num(as_num(a, "NUM_ADD")? + as_num(b, "NUM_ADD")?)))?;
            }
            op::INT_SUB => self.binary(|a, b| {
                Ok(Value::int(as_int(a, "INT_SUB")?.wrapping_sub(as_int(b, "INT_SUB")?)))
            })?,
            op::NUM_SUB => {
                self.binary(|a, b| Ok(Value::num(as_num(a, "NUM_SUB")? - as_num(b, "NUM_SUB")?)))?;
            }
            op::INT_MUL => self.binary(|a, b| {
                Ok(Value::int(as_int(a, "INT_MUL")?.wrapping_mul(as_int(b, "INT_MUL")?)))
            })?,
            op::NUM_MUL => {
                self.binary(|a, b| Ok(Value::num(as_num(a, "NUM_MUL")? * as_num(b, "NUM_MUL")?)))?;
            }
            op::INT_DIV => self.binary(|a, b| {
                let lhs = as_int(a, "INT_DIV")?;
                let rhs = as_int(b, "INT_DIV")?;
                if rhs == 0 {
                    return Err(VmError::DivisionByZero);
                }
                Ok(Value::int(lhs.wrapping_div(rhs)))
            })?,
            op::NUM_DIV => {
                self.binary(|a, b| Ok(Value::num(as_num(a, "NUM_DIV")? / as_num(b, "NUM_DIV")?)))?;
            }
            op::STR_CAT => self.str_cat()?,

            op::INT_LESS => {
                self.binary(|a, b| Ok(Value::bool(as_int(a, "INT_LESS")? < as_int(b, "INT_LESS")?)))?;
            }
            op::NUM_LESS => self.binary(|a, b| {
                Ok(Value::bool(as_num(a, "NUM_LESS")? < as_num(b, "NUM_LESS")? - EPSILON))
            })?,
            op::INT_GREATER => self.binary(|a, b| {
                Ok(Value::bool(as_int(a, "INT_GREATER")? > as_int(b, "INT_GREATER")?))
            })?,
            op::NUM_GREATER => self.binary(|a, b| {
                Ok(Value::bool(as_num(a, "NUM_GREATER")? > as_num(b, "NUM_GREATER")? + EPSILON))
            })?,
            op::EQUAL => self.binary(|a, b| Ok(Value::bool(a == b)))?,

            op::JUMP => {
                let d = self.read_u8(code, ip)?;
                *ip = jump_forward("JUMP", *ip, d, code.len())?;
            }
            op::JUMP_IF_FALSE => {
                let d = self.read_u8(code, ip)?;
                let cond = self.pop()?;
                if !as_bool(&cond, "JUMP_IF_FALSE")? {
                    *ip = jump_forward("JUMP_IF_FALSE", *ip, d, code.len())?;
                }
            }
            op::LOOP => {
                let d = self.read_u8(code, ip)?;
                *ip = jump_backward("LOOP", *ip, d)?;
            }

            op::FUNCTION => {
                let d = self.read_u8(code, ip)?;
                self.push(Value::ip(*ip))?;
                *ip = jump_forward("FUNCTION", *ip, d, code.len())?;
            }
            op::CALL => {
                let n = self.read_u8(code, ip)?;
                self.call(n as usize, ip)?;
            }
            op::LOAD_IP => {
                let value = self.pop()?;
                *ip = as_ip(&value, "LOAD_IP")?;
            }
            op::LOAD_FP => {
                let value = self.pop()?;
                self.fp = as_fp(&value, "LOAD_FP")?;
            }

            op::SET_RETURN => self.return_slot = self.pop()?,
            op::PUSH_RETURN => {
                let value = self.return_slot.clone();
                self.push(value)?;
            }

            op::STRUCT => {
                let n = self.read_u8(code, ip)?;
                self.build_struct(n as usize)?;
            }
            op::GET_FIELD => {
                let k = self.read_u8(code, ip)?;
                self.get_field(k as usize)?;
            }
            op::EXTRACT_FIELD => {
                let offset = self.read_u8(code, ip)?;
                let k = self.read_u8(code, ip)?;
                self.extract_field(offset as usize, k as usize)?;
            }
            op::SET_FIELD => {
                let k = self.read_u8(code, ip)?;
                self.set_field(k as usize)?;
            }

            op::REF_LOCAL => {
                let k = self.read_u8(code, ip)?;
                self.ref_local(k as usize)?;
            }
            op::DEREF => self.deref()?,
            op::SET_REF => self.set_ref()?,

            other => return Err(VmError::UnknownOpcode(other)),
        }
        Ok(())
    }

    // --- Stack primitives ---

    fn push(&mut self, value: Value) -> Result<(), VmError> {
        if self.stack.len() >= self.limits.max_stack {
            return Err(VmError::StackOverflow {
                limit: self.limits.max_stack,
            });
        }
        self.stack.push(StackSlot::new(value));
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, VmError> {
        let slot = self.stack.pop().ok_or(VmError::StackUnderflow)?;
        for upvalue in &slot.upvalues {
            if let Some(cell) = upvalue.as_upvalue() {
                *cell.borrow_mut() = UpvalueState::Closed(slot.value.clone());
            }
        }
        Ok(slot.value)
    }

    fn peek(&self, offset: usize) -> Result<&Value, VmError> {
        let len = self.stack.len();
        if offset >= len {
            return Err(VmError::StackUnderflow);
        }
        Ok(&self.stack[len - 1 - offset].value)
    }

    fn top_mut(&mut self) -> Result<&mut Value, VmError> {
        self.stack.last_mut().map(|slot| &mut slot.value).ok_or(VmError::StackUnderflow)
    }

    fn unary(&mut self, f: impl FnOnce(&Value) -> Result<Value, VmError>) -> Result<(), VmError> {
        let result = f(self.peek(0)?)?;
        *self.top_mut()? = result;
        Ok(())
    }

    fn binary(
        &mut self,
        f: impl FnOnce(&Value, &Value) -> Result<Value, VmError>,
    ) -> Result<(), VmError> {
        let rhs = self.pop()?;
        let result = f(self.peek(0)?, &rhs)?;
        *self.top_mut()? = result;
        Ok(())
    }

    fn constant(&self, index: usize) -> Result<Value, VmError> {
        self.constants.get(index).cloned().ok_or(VmError::ConstantOutOfRange {
            index,
            len: self.constants.len(),
        })
    }

    fn read_u8(&self, code: &[u8], ip: &mut usize) -> Result<u8, VmError> {
        let byte = *code.get(*ip).ok_or(VmError::OperandPastEnd { ip: *ip })?;
        *ip += 1;
        Ok(byte)
    }

    // --- Locals & globals ---

    fn frame_size(&self) -> usize {
        self.stack.len().saturating_sub(self.fp)
    }

    fn local(&self, index: usize) -> Result<Value, VmError> {
        if index >= self.frame_size() {
            return Err(VmError::LocalOutOfRange {
                index,
                frame_size: self.frame_size(),
            });
        }
        Ok(self.stack[self.fp + index].value.clone())
    }

    fn set_local(&mut self, index: usize, value: Value) -> Result<(), VmError> {
        if index >= self.frame_size() {
            return Err(VmError::LocalOutOfRange {
                index,
                frame_size: self.frame_size(),
            });
        }
        // Preserve the slot's upvalue list: existing captures continue
        // observing this slot under its new value.
        self.stack[self.fp + index].value = value;
        Ok(())
    }

    // --- Coercions ---

    fn coerce_int(&mut self) -> Result<(), VmError> {
        let coerced = match self.peek(0)? {
            Value::Bool(b) => Value::int(i32::from(*b)),
            Value::Int(n) => Value::int(*n),
            Value::Nil => Value::int(0),
            Value::Num(n) => Value::int(*n as i32),
            other => {
                return Err(VmError::TypeMismatch {
                    opcode: "INT",
                    expected: "nil, bool, int, or num",
                    found: other.type_name(),
                })
            }
        };
        *self.top_mut()? = coerced;
        Ok(())
    }

    fn coerce_bool(&mut self) -> Result<(), VmError> {
        let coerced = match self.peek(0)? {
            Value::Bool(b) => Value::bool(*b),
            Value::Int(n) => Value::bool(*n != 0),
            Value::Nil => Value::bool(false),
            Value::Num(n) => {
                let n = *n;
                Value::bool(if n > 0.0 { n < EPSILON } else { -n < EPSILON })
            }
            other => {
                return Err(VmError::TypeMismatch {
                    opcode: "BOOL",
                    expected: "nil, bool, int, or num",
                    found: other.type_name(),
                })
            }
        };
        *self.top_mut()? = coerced;
        Ok(())
    }

    fn coerce_num(&mut self) -> Result<(), VmError> {
        let coerced = match self.peek(0)? {
            Value::Bool(b) => Value::num(if *b { 1.0 } else { 0.0 }),
            Value::Int(n) => Value::num(f64::from(*n)),
            Value::Nil => Value::num(0.0),
            Value::Num(n) => Value::num(*n),
            other => {
                return Err(VmError::TypeMismatch {
                    opcode: "NUM",
                    expected: "nil, bool, int, or num",
                    found: other.type_name(),
                })
            }
        };
        *self.top_mut()? = coerced;
        Ok(())
    }

    fn coerce_str(&mut self) -> Result<(), VmError> {
        match self.peek(0)? {
            Value::Obj(o) if o.is_string() => return Ok(()),
            Value::Ip(_) | Value::Fp(_) | Value::Obj(_) => {
                let found = self.peek(0)?.type_name();
                return Err(VmError::TypeMismatch {
                    opcode: "STR",
                    expected: "nil, bool, int, num, or string",
                    found,
                });
            }
            Value::Nil | Value::Bool(_) | Value::Int(_) | Value::Num(_) => {}
        }
        let value = self.peek(0)?.clone();
        let stringified = printer::stringify(&value, &mut self.heap);
        *self.top_mut()? = stringified;
        Ok(())
    }

    // --- Built-ins & statements ---

    fn print(&mut self, output: &mut dyn Output) -> Result<(), VmError> {
        let value = self.pop()?;
        let text = as_string(&value, "PRINT")?;
        output.write_line(text);
        Ok(())
    }

    fn str_cat(&mut self) -> Result<(), VmError> {
        let rhs = self.pop()?;
        let rhs_text = as_string(&rhs, "STR_CAT")?.to_string();
        let lhs_text = as_string(self.peek(0)?, "STR_CAT")?.to_string();
        let combined = self.heap.alloc_string(lhs_text + &rhs_text);
        *self.top_mut()? = Value::obj(combined);
        Ok(())
    }

    // --- Functions ---

    fn call(&mut self, n: usize, ip: &mut usize) -> Result<(), VmError> {
        let callee = self.pop()?;
        let entry = as_ip(&callee, "CALL")?;

        let mut args = Vec::with_capacity(n);
        for _ in 0..n {
            args.push(self.pop()?);
        }

        self.push(Value::ip(*ip))?;
        self.push(Value::fp(self.fp))?;
        self.fp = self.stack.len();
        *ip = entry;

        for value in args.into_iter().rev() {
            self.push(value)?;
        }
        Ok(())
    }

    // --- Structs ---

    fn build_struct(&mut self, n: usize) -> Result<(), VmError> {
        let mut fields = vec![Value::Nil; n];
        for field in fields.iter_mut().rev() {
            *field = self.pop()?;
        }
        let obj = self.heap.alloc_struct(fields);
        self.push(Value::obj(obj))
    }

    fn get_field(&mut self, index: usize) -> Result<(), VmError> {
        let value = self.pop()?;
        let field = {
            let obj = as_struct(&value, "GET_FIELD")?;
            obj.get(index).ok_or(VmError::FieldOutOfRange {
                index,
                field_count: obj.field_count(),
            })?
        };
        self.push(field)
    }

    fn extract_field(&mut self, offset: usize, index: usize) -> Result<(), VmError> {
        let value = self.peek(offset)?.clone();
        let field = {
            let obj = as_struct(&value, "EXTRACT_FIELD")?;
            obj.get(index).ok_or(VmError::FieldOutOfRange {
                index,
                field_count: obj.field_count(),
            })?
        };
        self.push(field)
    }

    fn set_field(&mut self, index: usize) -> Result<(), VmError> {
        let value = self.pop()?;
        let struct_value = self.peek(0)?.clone();
        let obj = as_struct(&struct_value, "SET_FIELD")?;
        let field_count = obj.field_count();
        if !obj.set(index, value) {
            return Err(VmError::FieldOutOfRange { index, field_count });
        }
        Ok(())
    }

    // --- Upvalues / closures ---

    fn ref_local(&mut self, index: usize) -> Result<(), VmError> {
        if index >= self.frame_size() {
            return Err(VmError::LocalOutOfRange {
                index,
                frame_size: self.frame_size(),
            });
        }
        let absolute = self.fp + index;
        let obj = self.heap.alloc_upvalue(absolute);
        self.stack[absolute].upvalues.push(ObjRef::clone(&obj));
        self.push(Value::obj(obj))
    }

    fn deref(&mut self) -> Result<(), VmError> {
        let value = self.peek(0)?.clone();
        let cell = as_upvalue(&value, "DEREF")?;
        let state = cell.borrow().clone();
        let resolved = match state {
            UpvalueState::Open(slot) => {
                self.stack.get(slot).ok_or(VmError::StackUnderflow)?.value.clone()
            }
            UpvalueState::Closed(v) => v,
        };
        *self.top_mut()? = resolved;
        Ok(())
    }

    fn set_ref(&mut self) -> Result<(), VmError> {
        let value = self.pop()?;
        let upvalue_value = self.pop()?;
        let cell = as_upvalue(&upvalue_value, "SET_REF")?;
        let state = cell.borrow().clone();
        match state {
            UpvalueState::Open(slot) => {
                self.stack.get_mut(slot).ok_or(VmError::StackUnderflow)?.value = value;
            }
            UpvalueState::Closed(_) => {
                *cell.borrow_mut() = UpvalueState::Closed(value);
            }
        }
        Ok(())
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

fn jump_forward(opcode: &'static str, ip: usize, delta: u8, len: usize) -> Result<usize, VmError> {
    let target = ip + delta as usize;
    if target > len {
        return Err(VmError::JumpOutOfRange { opcode });
    }
    Ok(target)
}

fn jump_backward(opcode: &'static str, ip: usize, delta: u8) -> Result<usize, VmError> {
    ip.checked_sub(delta as usize).ok_or(VmError::JumpOutOfRange { opcode })
}

fn as_int(value: &Value, opcode: &'static str) -> Result<i32, VmError> {
    match value {
        Value::Int(n) => Ok(*n),
        other => type_mismatch(opcode, "int", other),
    }
}

fn as_num(value: &Value, opcode: &'static str) -> Result<f64, VmError> {
    match value {
        Value::Num(n) => Ok(*n),
        other => type_mismatch(opcode, "num", other),
    }
}

fn as_bool(value: &Value, opcode: &'static str) -> Result<bool, VmError> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => type_mismatch(opcode, "bool", other),
    }
}

fn as_ip(value: &Value, opcode: &'static str) -> Result<usize, VmError> {
    match value {
        Value::Ip(p) => Ok(*p),
        other => type_mismatch(opcode, "ip", other),
    }
}

fn as_fp(value: &Value, opcode: &'static str) -> Result<usize, VmError> {
    match value {
        Value::Fp(p) => Ok(*p),
        other => type_mismatch(opcode, "fp", other),
    }
}

fn as_string<'a>(value: &'a Value, opcode: &'static str) -> Result<&'a str, VmError> {
    match value {
        Value::Obj(o) if o.is_string() => Ok(o.as_str().expect("is_string implies as_str")),
        other => type_mismatch(opcode, "string", other),
    }
}

fn as_struct<'a>(value: &'a Value, opcode: &'static str) -> Result<&'a StructObj, VmError> {
    match value {
        Value::Obj(o) if o.is_struct() => Ok(o.as_struct().expect("is_struct implies as_struct")),
        other => type_mismatch(opcode, "struct", other),
    }
}

fn as_upvalue<'a>(
    value: &'a Value,
    opcode: &'static str,
) -> Result<&'a RefCell<UpvalueState>, VmError> {
    match value {
        Value::Obj(o) if o.is_upvalue() => Ok(o.as_upvalue().expect("is_upvalue implies as_upvalue")),
        other => type_mismatch(opcode, "upvalue", other),
    }
}

fn type_mismatch<T>(opcode: &'static str, expected: &'static str, found: &Value) -> Result<T, VmError> {
    Err(VmError::TypeMismatch {
        opcode,
        expected,
        found: found.type_name(),
    })
}
