//! Tracks the current location inside the document being converted.
//!
//! Every conversion error reports the JSON pointer of the element that
//! failed. The tracker is a stack of path segments; entering an element or
//! array slot pushes a segment and returns a guard that pops it again on
//! drop, so the stack stays balanced on every exit path, including early
//! returns from failed assertions. The guard works like an entered tracing
//! span: hold it for as long as the location applies.
//!
//! Trackers are per-request and single-threaded; they must not be shared
//! across threads.

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone)]
enum Segment {
    Element(String),
    Index(usize),
}

/// Stack-based cursor over the document tree.
#[derive(Debug, Default)]
pub struct PositionTracker {
    segments: Rc<RefCell<Vec<Segment>>>,
}

impl PositionTracker {
    pub fn new() -> PositionTracker {
        PositionTracker::default()
    }

    /// Enters a named element (`data`, `attributes`, a field name).
    #[must_use = "dropping the guard leaves the element again"]
    pub fn push_element(&self, name: impl Into<String>) -> PositionGuard {
        self.segments
            .borrow_mut()
            .push(Segment::Element(name.into()));
        PositionGuard {
            segments: Rc::clone(&self.segments),
        }
    }

    /// Enters an array slot.
    #[must_use = "dropping the guard leaves the slot again"]
    pub fn push_index(&self, index: usize) -> PositionGuard {
        self.segments.borrow_mut().push(Segment::Index(index));
        PositionGuard {
            segments: Rc::clone(&self.segments),
        }
    }

    pub fn depth(&self) -> usize {
        self.segments.borrow().len()
    }

    /// Renders the stack as a JSON pointer, outer segments first, or `None`
    /// when no element has been entered.
    ///
    /// Element segments render as `/name`, array slots as `[i]` appended to
    /// the preceding segment: `/atomic:operations[1]/data/id`.
    pub fn to_pointer(&self) -> Option<String> {
        let segments = self.segments.borrow();
        if segments.is_empty() {
            return None;
        }

        let mut pointer = String::new();
        for segment in segments.iter() {
            match segment {
                Segment::Element(name) => {
                    pointer.push('/');
                    pointer.push_str(name);
                }
                Segment::Index(index) => {
                    pointer.push('[');
                    pointer.push_str(&index.to_string());
                    pointer.push(']');
                }
            }
        }
        Some(pointer)
    }
}

/// Pops exactly one segment when dropped.
#[must_use = "dropping the guard pops the segment immediately"]
pub struct PositionGuard {
    segments: Rc<RefCell<Vec<Segment>>>,
}

impl Drop for PositionGuard {
    fn drop(&mut self) {
        self.segments.borrow_mut().pop();
    }
}
