// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::stringify;
use crate::heap::Heap;
use crate::value::Value;

fn text(value: &Value, heap: &mut Heap) -> String {
    match stringify(value, heap) {
        Value::Obj(obj) => obj.as_str().expect("stringify always yields a string").to_string(),
        other => panic!("stringify returned a non-string value: {other:?}"),
    }
}

#[test]
fn nil_renders_as_nil() {
    let mut heap = Heap::new();
    assert_eq!(text(&Value::Nil, &mut heap), "nil");
}

#[test]
fn bools_render_as_true_false() {
    let mut heap = Heap::new();
    assert_eq!(text(&Value::Bool(true), &mut heap), "true");
    assert_eq!(text(&Value::Bool(false), &mut heap), "false");
}

#[test]
fn ints_render_as_decimal() {
    let mut heap = Heap::new();
    assert_eq!(text(&Value::Int(-7), &mut heap), "-7");
    assert_eq!(text(&Value::Int(0), &mut heap), "0");
}

#[test]
fn nums_trim_trailing_zeros() {
    let mut heap = Heap::new();
    assert_eq!(text(&Value::Num(1.0), &mut heap), "1");
    assert_eq!(text(&Value::Num(1.5), &mut heap), "1.5");
    assert_eq!(text(&Value::Num(0.1), &mut heap), "0.1");
}

#[test]
fn nums_keep_up_to_seven_decimals() {
    let mut heap = Heap::new();
    assert_eq!(text(&Value::Num(1.0 / 3.0), &mut heap), "0.3333333");
}

#[test]
fn string_object_stringifies_to_identity() {
    let mut heap = Heap::new();
    let s = Value::Obj(heap.alloc_string("hello".to_string()));
    let before = heap.len();
    let result = stringify(&s, &mut heap);
    assert_eq!(heap.len(), before, "stringifying a string must not allocate");
    assert_eq!(result, s);
}

#[test]
fn non_string_objects_render_as_type_tag() {
    let mut heap = Heap::new();
    let st = Value::Obj(heap.alloc_struct(vec![Value::Nil]));
    assert_eq!(text(&st, &mut heap), "<struct>");

    let up = Value::Obj(heap.alloc_upvalue(0));
    assert_eq!(text(&up, &mut heap), "<upvalue>");
}

#[test]
fn ip_and_fp_render_as_type_tag() {
    let mut heap = Heap::new();
    assert_eq!(text(&Value::Ip(3), &mut heap), "<ip>");
    assert_eq!(text(&Value::Fp(3), &mut heap), "<fp>");
}
