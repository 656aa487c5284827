// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{mnemonic, op};

#[test]
fn mnemonic_round_trips_defined_opcodes() {
    assert_eq!(mnemonic(op::PUSH_CONST), Some("PUSH_CONST"));
    assert_eq!(mnemonic(op::SET_REF), Some("SET_REF"));
    assert_eq!(mnemonic(op::INT_DIV), Some("INT_DIV"));
}

#[test]
fn mnemonic_rejects_unassigned_bytes() {
    assert_eq!(mnemonic(200), None);
}

#[test]
fn opcodes_are_distinct_bytes() {
    let all = [
        op::PUSH_CONST,
        op::PUSH_TRUE,
        op::PUSH_FALSE,
        op::PUSH_NIL,
        op::SET_GLOBAL,
        op::PUSH_GLOBAL,
        op::SET_LOCAL,
        op::PUSH_LOCAL,
        op::INT,
        op::BOOL,
        op::NUM,
        op::STR,
        op::CLOCK,
        op::PRINT,
        op::POP,
        op::INT_NEG,
        op::NUM_NEG,
        op::INT_ADD,
        op::NUM_ADD,
        op::INT_SUB,
        op::NUM_SUB,
        op::INT_MUL,
        op::NUM_MUL,
        op::INT_DIV,
        op::NUM_DIV,
        op::STR_CAT,
        op::NOT,
        op::INT_LESS,
        op::NUM_LESS,
        op::INT_GREATER,
        op::NUM_GREATER,
        op::EQUAL,
        op::JUMP,
        op::JUMP_IF_FALSE,
        op::LOOP,
        op::FUNCTION,
        op::CALL,
        op::LOAD_IP,
        op::LOAD_FP,
        op::SET_RETURN,
        op::PUSH_RETURN,
        op::STRUCT,
        op::GET_FIELD,
        op::EXTRACT_FIELD,
        op::SET_FIELD,
        op::REF_LOCAL,
        op::DEREF,
        op::SET_REF,
    ];
    for i in 0..all.len() {
        for j in (i + 1)..all.len() {
            assert_ne!(all[i], all[j], "duplicate opcode byte at {i} and {j}");
        }
    }
}
