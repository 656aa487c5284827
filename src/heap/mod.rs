// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Object heap for ClearVM.
//!
//! Three object kinds live here: strings, structs, and upvalue cells. The
//! heap is an append-only list of reference-counted objects; there is no
//! individual free during execution and no GC (see the non-goals). Dropping
//! the `Heap` drops every object whose last reference it held, which is the
//! Rust-idiomatic equivalent of the source's "walk the object list and
//! invoke per-kind destructors" teardown.


use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// A reference-counted handle to a heap object.
///
/// Cloning a `Value::Obj` clones this handle, not the underlying object.
pub type ObjRef = Rc<Obj>;

/// The state of an upvalue cell.
#[derive(Debug, Clone)]
pub enum UpvalueState {
    /// Still reads through to a live stack slot, identified by its index.
    Open(usize),
    /// Has taken ownership of a snapshot of the value at closing time.
    Closed(Value),
}

/// A struct's fixed-count, index-addressed field array.
#[derive(Debug)]
pub struct StructObj {
    fields: RefCell<Vec<Value>>,
}

impl StructObj {
    /// Number of fields the struct was created with. Immutable after creation.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.borrow().len()
    }

    /// Read field `index`, or `None` if out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.fields.borrow().get(index).cloned()
    }

    /// Overwrite field `index`. Returns `false` if out of range.
    pub fn set(&self, index: usize, value: Value) -> bool {
        let mut fields = self.fields.borrow_mut();
        match fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// A heap-allocated object: a string, a struct, or an upvalue cell.
#[derive(Debug)]
pub enum Obj {
    /// An owned, immutable string.
    Str(String),
    /// A fixed-count, mutable field array.
    Struct(StructObj),
    /// A single-slot reference cell, open or closed (see `UpvalueState`).
    Upvalue(RefCell<UpvalueState>),
}

impl Obj {
    /// Check if this is a string object.
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::Str(_))
    }

    /// Check if this is a struct object.
    #[must_use]
    pub const fn is_struct(&self) -> bool {
        matches!(self, Self::Struct(_))
    }

    /// Check if this is an upvalue cell.
    #[must_use]
    pub const fn is_upvalue(&self) -> bool {
        matches!(self, Self::Upvalue(_))
    }

    /// Borrow this object's string contents, or `None` if it isn't a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Borrow this object as a struct, or `None` if it isn't one.
    #[must_use]
    pub fn as_struct(&self) -> Option<&StructObj> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow this object as an upvalue cell, or `None` if it isn't one.
    #[must_use]
    pub fn as_upvalue(&self) -> Option<&RefCell<UpvalueState>> {
        match self {
            Self::Upvalue(cell) => Some(cell),
            _ => None,
        }
    }

    /// Type name for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Struct(_) => "struct",
            Self::Upvalue(_) => "upvalue",
        }
    }
}

/// The VM's object heap.
///
/// Allocation appends to an internal list and returns a new reference;
/// there is no individual free. The whole heap is released when it is
/// dropped (VM teardown).
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<ObjRef>,
}

impl Heap {
    /// Create an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects allocated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the heap has allocated any objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn push(&mut self, obj: Obj) -> ObjRef {
        let obj_ref = Rc::new(obj);
        self.objects.push(Rc::clone(&obj_ref));
        obj_ref
    }

    /// Allocate a new string object.
    pub fn alloc_string(&mut self, contents: String) -> ObjRef {
        self.push(Obj::Str(contents))
    }

    /// Allocate a new struct object with `fields.len()` fields.
    pub fn alloc_struct(&mut self, fields: Vec<Value>) -> ObjRef {
        self.push(Obj::Struct(StructObj {
            fields: RefCell::new(fields),
        }))
    }

    /// Allocate a new open upvalue cell pointing at stack slot `slot`.
    pub fn alloc_upvalue(&mut self, slot: usize) -> ObjRef {
        self.push(Obj::Upvalue(RefCell::new(UpvalueState::Open(slot))))
    }
}
