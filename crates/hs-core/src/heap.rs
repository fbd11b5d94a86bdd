//! Object heap
//!
//! Heap objects live in a generational arena. A [`HeapRef`] names a slot and
//! the generation it was allocated in, so a handle that outlives its object
//! is detected instead of silently aliasing whatever reused the slot.
//!
//! Reclamation is explicit: [`Heap::collect`] marks everything reachable from
//! the given roots and sweeps the rest.

use crate::value::Value;
use hs_bigint::BigInt;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::fmt::Write;
use tracing::debug;

/// Handle to a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapRef {
    index: u32,
    generation: u32,
}

impl HeapRef {
    /// Slot index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Allocation generation of the slot
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Heap errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    /// Live object limit reached
    #[error("Heap object limit {0} reached")]
    LimitExceeded(usize),

    /// Slot table could not grow
    #[error("Failed to grow the heap")]
    AllocationFailed,

    /// Handle to a freed object
    #[error("Dangling reference to slot {}", .0.index)]
    DanglingReference(HeapRef),
}

/// Plain object with an optional prototype
#[derive(Debug, Clone, Default)]
pub struct Object {
    /// Object consulted when a field is missing
    pub prototype: Option<HeapRef>,
    /// Own fields
    pub fields: FxHashMap<String, Value>,
}

/// Heap-allocated data
#[derive(Debug, Clone)]
pub enum HeapObject {
    /// Arbitrary-precision integer
    BigInt(BigInt),
    /// Boxed primitive
    Boxed(Value),
    /// Immutable string
    Str(String),
    /// Fixed-position array
    Array(Vec<Value>),
    /// Double-ended list
    List(VecDeque<Value>),
    /// Unordered set
    Set(FxHashSet<Value>),
    /// Unordered map
    Map(FxHashMap<Value, Value>),
    /// Plain object
    Object(Object),
}

impl HeapObject {
    /// Get type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            HeapObject::BigInt(_) => "bigint",
            HeapObject::Boxed(_) => "boxed",
            HeapObject::Str(_) => "string",
            HeapObject::Array(_) => "array",
            HeapObject::List(_) => "list",
            HeapObject::Set(_) => "set",
            HeapObject::Map(_) => "map",
            HeapObject::Object(_) => "object",
        }
    }

    fn for_each_child(&self, mut visit: impl FnMut(Value)) {
        match self {
            HeapObject::BigInt(_) | HeapObject::Str(_) => {}
            HeapObject::Boxed(v) => visit(*v),
            HeapObject::Array(items) => items.iter().copied().for_each(visit),
            HeapObject::List(items) => items.iter().copied().for_each(visit),
            HeapObject::Set(items) => items.iter().copied().for_each(visit),
            HeapObject::Map(entries) => {
                for (k, v) in entries {
                    visit(*k);
                    visit(*v);
                }
            }
            HeapObject::Object(obj) => {
                if let Some(proto) = obj.prototype {
                    visit(Value::Object(proto));
                }
                obj.fields.values().copied().for_each(visit);
            }
        }
    }
}

/// Collection statistics
#[derive(Debug, Clone, Default)]
pub struct HeapStats {
    /// Number of collections run
    pub collections: usize,
    /// Total objects freed by collections
    pub objects_freed: usize,
    /// Highest live object count seen
    pub peak_live: usize,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    marked: bool,
    object: Option<HeapObject>,
}

/// Generational object arena
#[derive(Debug, Default)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    max_objects: Option<usize>,
    stats: HeapStats,
}

impl Heap {
    /// Create an unbounded heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a heap holding at most `max_objects` live objects
    pub fn with_limit(max_objects: Option<usize>) -> Self {
        Self {
            max_objects,
            ..Self::default()
        }
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.live
    }

    /// Check if the heap holds no live objects
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Collection statistics
    pub fn stats(&self) -> &HeapStats {
        &self.stats
    }

    /// Allocate an object
    pub fn alloc(&mut self, object: HeapObject) -> Result<HeapRef, HeapError> {
        if let Some(limit) = self.max_objects {
            if self.live >= limit {
                return Err(HeapError::LimitExceeded(limit));
            }
        }

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.object = Some(object);
                slot.marked = false;
                HeapRef {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index =
                    u32::try_from(self.slots.len()).map_err(|_| HeapError::AllocationFailed)?;
                self.slots
                    .try_reserve(1)
                    .map_err(|_| HeapError::AllocationFailed)?;
                self.slots.push(Slot {
                    generation: 0,
                    marked: false,
                    object: Some(object),
                });
                HeapRef {
                    index,
                    generation: 0,
                }
            }
        };

        self.live += 1;
        self.stats.peak_live = self.stats.peak_live.max(self.live);
        Ok(handle)
    }

    /// Check if a handle still names a live object
    pub fn contains(&self, handle: HeapRef) -> bool {
        self.get(handle).is_ok()
    }

    /// Borrow an object
    pub fn get(&self, handle: HeapRef) -> Result<&HeapObject, HeapError> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_ref())
            .ok_or(HeapError::DanglingReference(handle))
    }

    /// Mutably borrow an object
    pub fn get_mut(&mut self, handle: HeapRef) -> Result<&mut HeapObject, HeapError> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_mut())
            .ok_or(HeapError::DanglingReference(handle))
    }

    /// Free an object immediately, returning it
    pub fn free(&mut self, handle: HeapRef) -> Result<HeapObject, HeapError> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or(HeapError::DanglingReference(handle))?;
        let object = slot
            .object
            .take()
            .ok_or(HeapError::DanglingReference(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Ok(object)
    }

    /// Look up a field on an object, following the prototype chain
    pub fn get_field(&self, handle: HeapRef, key: &str) -> Result<Option<Value>, HeapError> {
        let mut current = Some(handle);
        // A chain can never be longer than the number of live objects.
        let mut remaining = self.live;
        while let Some(h) = current {
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            match self.get(h)? {
                HeapObject::Object(obj) => {
                    if let Some(v) = obj.fields.get(key) {
                        return Ok(Some(*v));
                    }
                    current = obj.prototype;
                }
                _ => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Mark everything reachable from `roots` and free the rest
    ///
    /// Returns the number of objects freed.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = Value>) -> usize {
        let mut worklist: Vec<HeapRef> = roots.into_iter().filter_map(|v| v.as_object()).collect();

        while let Some(handle) = worklist.pop() {
            let Some(slot) = self.slots.get_mut(handle.index as usize) else {
                continue;
            };
            if slot.generation != handle.generation || slot.marked {
                continue;
            }
            let Some(object) = slot.object.as_ref() else {
                continue;
            };
            slot.marked = true;
            object.for_each_child(|v| {
                if let Value::Object(child) = v {
                    worklist.push(child);
                }
            });
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.object.is_none() {
                continue;
            }
            if slot.marked {
                slot.marked = false;
            } else {
                slot.object = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                freed += 1;
            }
        }

        self.live -= freed;
        self.stats.collections += 1;
        self.stats.objects_freed += freed;
        debug!(freed, live = self.live, "heap collection");
        freed
    }

    /// Render a value for display, resolving heap objects
    pub fn render(&self, value: Value) -> String {
        let mut out = String::new();
        self.render_into(&mut out, value, 0);
        out
    }

    fn render_into(&self, out: &mut String, value: Value, depth: usize) {
        let Value::Object(handle) = value else {
            let _ = write!(out, "{}", value);
            return;
        };
        if depth > 8 {
            out.push_str("...");
            return;
        }
        let Ok(object) = self.get(handle) else {
            out.push_str("<dangling>");
            return;
        };
        match object {
            HeapObject::BigInt(n) => {
                let _ = write!(out, "{}", n);
            }
            HeapObject::Boxed(v) => self.render_into(out, *v, depth + 1),
            HeapObject::Str(s) => out.push_str(s),
            HeapObject::Array(items) => self.render_seq(out, items.iter(), depth),
            HeapObject::List(items) => self.render_seq(out, items.iter(), depth),
            HeapObject::Set(items) => {
                out.push('{');
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(out, *v, depth + 1);
                }
                out.push('}');
            }
            HeapObject::Map(entries) => {
                out.push('{');
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(out, *k, depth + 1);
                    out.push_str(": ");
                    self.render_into(out, *v, depth + 1);
                }
                out.push('}');
            }
            HeapObject::Object(_) => {
                let _ = write!(out, "<object #{}>", handle.index);
            }
        }
    }

    fn render_seq<'a>(&self, out: &mut String, items: impl Iterator<Item = &'a Value>, depth: usize) {
        out.push('[');
        for (i, v) in items.enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.render_into(out, *v, depth + 1);
        }
        out.push(']');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_get() {
        let mut heap = Heap::new();
        let s = heap.alloc(HeapObject::Str("hi".into())).unwrap();
        assert!(matches!(heap.get(s).unwrap(), HeapObject::Str(v) if v == "hi"));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_stale_handle_is_detected() {
        let mut heap = Heap::new();
        let a = heap.alloc(HeapObject::Boxed(Value::Int(1))).unwrap();
        heap.free(a).unwrap();
        let b = heap.alloc(HeapObject::Boxed(Value::Int(2))).unwrap();
        assert_eq!(a.index(), b.index());
        assert_eq!(heap.get(a).unwrap_err(), HeapError::DanglingReference(a));
        assert!(heap.contains(b));
        assert!(heap.free(a).is_err());
    }

    #[test]
    fn test_limit() {
        let mut heap = Heap::with_limit(Some(1));
        heap.alloc(HeapObject::Str(String::new())).unwrap();
        assert_eq!(
            heap.alloc(HeapObject::Str(String::new())).unwrap_err(),
            HeapError::LimitExceeded(1)
        );
    }

    #[test]
    fn test_collect_keeps_reachable_graph() {
        let mut heap = Heap::new();
        let leaf = heap.alloc(HeapObject::Str("leaf".into())).unwrap();
        let proto = heap.alloc(HeapObject::Object(Object::default())).unwrap();
        let mut obj = Object {
            prototype: Some(proto),
            ..Object::default()
        };
        obj.fields.insert("x".into(), Value::Object(leaf));
        let root = heap.alloc(HeapObject::Object(obj)).unwrap();
        let garbage = heap.alloc(HeapObject::Array(vec![Value::Int(1)])).unwrap();

        let freed = heap.collect([Value::Object(root), Value::Int(3)]);
        assert_eq!(freed, 1);
        assert!(heap.contains(root));
        assert!(heap.contains(proto));
        assert!(heap.contains(leaf));
        assert!(!heap.contains(garbage));
        assert_eq!(heap.stats().collections, 1);
    }

    #[test]
    fn test_collect_handles_cycles() {
        let mut heap = Heap::new();
        let a = heap.alloc(HeapObject::Array(Vec::new())).unwrap();
        let b = heap.alloc(HeapObject::Array(vec![Value::Object(a)])).unwrap();
        if let HeapObject::Array(items) = heap.get_mut(a).unwrap() {
            items.push(Value::Object(b));
        }
        assert_eq!(heap.collect([]), 2);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_field_lookup_walks_prototypes() {
        let mut heap = Heap::new();
        let mut base = Object::default();
        base.fields.insert("greet".into(), Value::Int(7));
        let base = heap.alloc(HeapObject::Object(base)).unwrap();
        let derived = heap
            .alloc(HeapObject::Object(Object {
                prototype: Some(base),
                ..Object::default()
            }))
            .unwrap();
        assert_eq!(heap.get_field(derived, "greet").unwrap(), Some(Value::Int(7)));
        assert_eq!(heap.get_field(derived, "missing").unwrap(), None);
    }

    #[test]
    fn test_render() {
        let mut heap = Heap::new();
        let s = heap.alloc(HeapObject::Str("a".into())).unwrap();
        let n = heap
            .alloc(HeapObject::BigInt("123456789012345678901234567890".parse().unwrap()))
            .unwrap();
        let arr = heap
            .alloc(HeapObject::Array(vec![Value::Object(s), Value::Object(n), Value::Null]))
            .unwrap();
        assert_eq!(
            heap.render(Value::Object(arr)),
            "[a, 123456789012345678901234567890, null]"
        );
    }
}
