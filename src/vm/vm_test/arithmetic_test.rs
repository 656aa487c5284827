// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

use super::{run, Program};
use crate::bytecode::op;
use crate::error::VmError;

#[test]
fn int_add_then_stringify_and_print() {
    let bytes = Program::new()
        .int_const(2)
        .int_const(3)
        .op1(op::PUSH_CONST, 0)
        .op1(op::PUSH_CONST, 1)
        .op(op::INT_ADD)
        .op(op::STR)
        .op(op::PRINT)
        .build();
    let (result, lines) = run(&bytes);
    assert_eq!(result, Ok(()));
    assert_eq!(lines, ["5"]);
}

#[test]
fn int_sub_mul_div_compute_in_place() {
    let bytes = Program::new()
        .int_const(20)
        .int_const(4)
        .op1(op::PUSH_CONST, 0)
        .op1(op::PUSH_CONST, 1)
        .op(op::INT_DIV)
        .op(op::STR)
        .op(op::PRINT)
        .build();
    let (result, lines) = run(&bytes);
    assert_eq!(result, Ok(()));
    assert_eq!(lines, ["5"]);
}

#[test]
fn int_div_by_zero_is_explicitly_guarded() {
    let bytes = Program::new()
        .int_const(1)
        .int_const(0)
        .op1(op::PUSH_CONST, 0)
        .op1(op::PUSH_CONST, 1)
        .op(op::INT_DIV)
        .build();
    let (result, _) = run(&bytes);
    assert_eq!(result, Err(VmError::DivisionByZero));
}

#[test]
fn int_add_wraps_on_overflow() {
    let bytes = Program::new()
        .int_const(i32::MAX)
        .int_const(1)
        .op1(op::PUSH_CONST, 0)
        .op1(op::PUSH_CONST, 1)
        .op(op::INT_ADD)
        .op(op::STR)
        .op(op::PRINT)
        .build();
    let (result, lines) = run(&bytes);
    assert_eq!(result, Ok(()));
    assert_eq!(lines, [i32::MIN.to_string()]);
}

#[test]
fn num_bool_coercion_is_true_only_for_small_magnitudes() {
    // Values near zero coerce to true; anything else coerces to false.
    // This is the spec's literal (inverted-looking) truthiness rule.
    let near_zero = Program::new()
        .num_const(0.0)
        .op1(op::PUSH_CONST, 0)
        .op(op::BOOL)
        .op(op::STR)
        .op(op::PRINT)
        .build();
    let (result, lines) = run(&near_zero);
    assert_eq!(result, Ok(()));
    assert_eq!(lines, ["true"]);

    let large = Program::new()
        .num_const(42.0)
        .op1(op::PUSH_CONST, 0)
        .op(op::BOOL)
        .op(op::STR)
        .op(op::PRINT)
        .build();
    let (result, lines) = run(&large);
    assert_eq!(result, Ok(()));
    assert_eq!(lines, ["false"]);
}

#[test]
fn num_less_and_greater_apply_epsilon_tolerance() {
    let bytes = Program::new()
        .num_const(1.0)
        .num_const(1.0)
        .op1(op::PUSH_CONST, 0)
        .op1(op::PUSH_CONST, 1)
        .op(op::NUM_LESS)
        .op(op::STR)
        .op(op::PRINT)
        .build();
    let (result, lines) = run(&bytes);
    assert_eq!(result, Ok(()));
    assert_eq!(lines, ["false"], "equal values are not NUM_LESS of each other");
}

#[test]
fn equal_rejects_mismatched_tags() {
    let bytes = Program::new()
        .int_const(0)
        .op1(op::PUSH_CONST, 0)
        .op(op::PUSH_NIL)
        .op(op::EQUAL)
        .op(op::STR)
        .op(op::PRINT)
        .build();
    let (result, lines) = run(&bytes);
    assert_eq!(result, Ok(()));
    assert_eq!(lines, ["false"]);
}

#[test]
fn str_cat_requires_both_operands_to_be_strings() {
    let bytes = Program::new()
        .str_const("a")
        .int_const(1)
        .op1(op::PUSH_CONST, 0)
        .op1(op::PUSH_CONST, 1)
        .op(op::STR_CAT)
        .build();
    let (result, _) = run(&bytes);
    assert!(matches!(result, Err(VmError::TypeMismatch { opcode: "STR_CAT", .. })));
}

#[test]
fn str_on_non_string_object_is_an_error() {
    let bytes = Program::new()
        .int_const(1)
        .int_const(2)
        .op1(op::PUSH_CONST, 0)
        .op1(op::PUSH_CONST, 1)
        .op1(op::STRUCT, 2)
        .op(op::STR)
        .build();
    let (result, _) = run(&bytes);
    assert!(matches!(result, Err(VmError::TypeMismatch { opcode: "STR", .. })));
}

#[test]
fn str_on_already_a_string_is_an_identity() {
    let bytes = Program::new()
        .str_const("hi")
        .op1(op::PUSH_CONST, 0)
        .op(op::STR)
        .op(op::PRINT)
        .build();
    let (result, lines) = run(&bytes);
    assert_eq!(result, Ok(()));
    assert_eq!(lines, ["hi"]);
}
