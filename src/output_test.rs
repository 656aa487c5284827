// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{MockOutput, Output};

#[test]
fn mock_output_captures_lines_in_order() {
    let mut out = MockOutput::new();
    out.write_line("first");
    out.write_line("second");
    assert_eq!(out.lines(), ["first", "second"]);
}

#[test]
fn mock_output_starts_empty() {
    let out = MockOutput::new();
    assert!(out.lines().is_empty());
}
