// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Bytecode format for ClearVM.
//!
//! The VM uses a flat byte stream: one opcode byte followed by zero or more
//! operand bytes, consumed directly by the opcode's handler. There is no
//! packed instruction word and no immediate encoding for INT/NUM/STR
//! literals — those always come from the constant pool.

#[cfg(test)]
mod bytecode_test;

/// Bytecode opcodes, one byte each.
pub mod op {
    // --- Constants & literals ---

    /// Push `constants[k]`.
    pub const PUSH_CONST: u8 = 0;
    /// Push the boolean literal `true`.
    pub const PUSH_TRUE: u8 = 1;
    /// Push the boolean literal `false`.
    pub const PUSH_FALSE: u8 = 2;
    /// Push the nil literal.
    pub const PUSH_NIL: u8 = 3;

    // --- Variables ---

    /// Pop a value, store it at globals slot `k`.
    pub const SET_GLOBAL: u8 = 4;
    /// Push globals slot `k`.
    pub const PUSH_GLOBAL: u8 = 5;
    /// Pop a value, store it at `fp[k]`.
    pub const SET_LOCAL: u8 = 6;
    /// Push `fp[k]`.
    pub const PUSH_LOCAL: u8 = 7;

    // --- Type coercions ---

    /// Coerce top-of-stack to INT in place.
    pub const INT: u8 = 8;
    /// Coerce top-of-stack to BOOL in place.
    pub const BOOL: u8 = 9;
    /// Coerce top-of-stack to NUM in place.
    pub const NUM: u8 = 10;
    /// Coerce top-of-stack to a String OBJ in place.
    pub const STR: u8 = 11;

    // --- Built-ins ---

    /// Push process CPU time in seconds as NUM.
    pub const CLOCK: u8 = 12;

    // --- Statements ---

    /// Pop a String OBJ, write its contents and a newline to stdout.
    pub const PRINT: u8 = 13;
    /// Pop the top value, closing any upvalues attached to it.
    pub const POP: u8 = 14;

    // --- Arithmetic ---

    /// Negate the top-of-stack INT in place.
    pub const INT_NEG: u8 = 15;
    /// Negate the top-of-stack NUM in place.
    pub const NUM_NEG: u8 = 16;
    /// Pop RHS INT, add to LHS INT in place.
    pub const INT_ADD: u8 = 17;
    /// Pop RHS NUM, add to LHS NUM in place.
    pub const NUM_ADD: u8 = 18;
    /// Pop RHS INT, subtract from LHS INT in place.
    pub const INT_SUB: u8 = 19;
    /// Pop RHS NUM, subtract from LHS NUM in place.
    pub const NUM_SUB: u8 = 20;
    /// Pop RHS INT, multiply into LHS INT in place.
    pub const INT_MUL: u8 = 21;
    /// Pop RHS NUM, multiply into LHS NUM in place.
    pub const NUM_MUL: u8 = 22;
    /// Pop RHS INT, divide into LHS INT in place. Errors on division by zero.
    pub const INT_DIV: u8 = 23;
    /// Pop RHS NUM, divide into LHS NUM in place.
    pub const NUM_DIV: u8 = 24;
    /// Pop RHS string, concatenate onto LHS string in place.
    pub const STR_CAT: u8 = 25;
    /// Negate the top-of-stack BOOL in place.
    pub const NOT: u8 = 26;

    // --- Comparison ---

    /// Pop RHS INT, push `lhs < rhs` as BOOL.
    pub const INT_LESS: u8 = 27;
    /// Pop RHS NUM, push `lhs < rhs - EPSILON` as BOOL.
    pub const NUM_LESS: u8 = 28;
    /// Pop RHS INT, push `lhs > rhs` as BOOL.
    pub const INT_GREATER: u8 = 29;
    /// Pop RHS NUM, push `lhs > rhs + EPSILON` as BOOL.
    pub const NUM_GREATER: u8 = 30;
    /// Pop RHS, push typed equality of LHS and RHS as BOOL.
    pub const EQUAL: u8 = 31;

    // --- Control flow ---

    /// `ip += d`.
    pub const JUMP: u8 = 32;
    /// Pop BOOL; if false, `ip += d`.
    pub const JUMP_IF_FALSE: u8 = 33;
    /// `ip -= d`.
    pub const LOOP: u8 = 34;

    // --- Functions ---

    /// Push an IP value holding the current `ip`, then `ip += d`.
    pub const FUNCTION: u8 = 35;
    /// Pop callee IP and `n` arguments, push an administrative frame, and jump in.
    pub const CALL: u8 = 36;
    /// Pop an IP value, assign it to `ip`.
    pub const LOAD_IP: u8 = 37;
    /// Pop an FP value, assign it to `fp`.
    pub const LOAD_FP: u8 = 38;

    // --- Return value passing ---

    /// Pop a value into the return-slot register.
    pub const SET_RETURN: u8 = 39;
    /// Push the current return-slot value.
    pub const PUSH_RETURN: u8 = 40;

    // --- Structs ---

    /// Pop `n` values, push a new struct built from them.
    pub const STRUCT: u8 = 41;
    /// Pop a struct, push `struct.fields[k]`.
    pub const GET_FIELD: u8 = 42;
    /// Peek a struct at stack offset `o`, push `struct.fields[k]`.
    pub const EXTRACT_FIELD: u8 = 43;
    /// Pop a value, peek a struct, assign `struct.fields[k] = value`.
    pub const SET_FIELD: u8 = 44;

    // --- Upvalues / closures ---

    /// Allocate an Upvalue over `fp[k]`, push the OBJ.
    pub const REF_LOCAL: u8 = 45;
    /// Peek an Upvalue OBJ, replace in place with its current value.
    pub const DEREF: u8 = 46;
    /// Pop a value and an Upvalue OBJ, write the value through the upvalue.
    pub const SET_REF: u8 = 47;
}

/// Returns a human-readable mnemonic for an opcode byte, or `None` if it is
/// outside the defined range. Used only to name opcodes in diagnostics.
#[must_use]
pub const fn mnemonic(opcode: u8) -> Option<&'static str> {
    use op::*;
    Some(match opcode {
        PUSH_CONST => "PUSH_CONST",
        PUSH_TRUE => "PUSH_TRUE",
        PUSH_FALSE => "PUSH_FALSE",
        PUSH_NIL => "PUSH_NIL",
        SET_GLOBAL => "SET_GLOBAL",
        PUSH_GLOBAL => "PUSH_GLOBAL",
        SET_LOCAL => "SET_LOCAL",
        PUSH_LOCAL => "PUSH_LOCAL",
        INT => "INT",
        BOOL => "BOOL",
        NUM => "NUM",
        STR => "STR",
        CLOCK => "CLOCK",
        PRINT => "PRINT",
        POP => "POP",
        INT_NEG => "INT_NEG",
        NUM_NEG => "NUM_NEG",
        INT_ADD => "INT_ADD",
        NUM_ADD => "NUM_ADD",
        INT_SUB => "INT_SUB",
        NUM_SUB => "NUM_SUB",
        INT_MUL => "INT_MUL",
        NUM_MUL => "NUM_MUL",
        INT_DIV => "INT_DIV",
        NUM_DIV => "NUM_DIV",
        STR_CAT => "STR_CAT",
        NOT => "NOT",
        INT_LESS => "INT_LESS",
        NUM_LESS => "NUM_LESS",
        INT_GREATER => "INT_GREATER",
        NUM_GREATER => "NUM_GREATER",
        EQUAL => "EQUAL",
        JUMP => "JUMP",
        JUMP_IF_FALSE => "JUMP_IF_FALSE",
        LOOP => "LOOP",
        FUNCTION => "FUNCTION",
        CALL => "CALL",
        LOAD_IP => "LOAD_IP",
        LOAD_FP => "LOAD_FP",
        SET_RETURN => "SET_RETURN",
        PUSH_RETURN => "PUSH_RETURN",
        STRUCT => "STRUCT",
        GET_FIELD => "GET_FIELD",
        EXTRACT_FIELD => "EXTRACT_FIELD",
        SET_FIELD => "SET_FIELD",
        REF_LOCAL => "REF_LOCAL",
        DEREF => "DEREF",
        SET_REF => "SET_REF",
        _ => return None,
    })
}
