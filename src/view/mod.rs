//! View notification protocol.
//!
//! Every structural change of the tree is announced to a [`ViewSink`] inside
//! a begin/end bracket. Brackets are RAII guards so an early return (or `?`)
//! still closes them.
//!
//! - [`ViewNotifier`] owns the sink and the [`LifecyclePhase`]; during
//!   shutdown no bracket is forwarded
//! - insert brackets must not nest; a nested one is diagnosed, counted and
//!   not forwarded
//! - remove brackets opened inside an open remove bracket are folded into the
//!   outer one, the view drops the whole range at once
//!
//! # Example
//! ```ignore
//! let notifier = ViewNotifier::new(Box::new(RecordingViewSink::new()));
//! {
//!     let _bracket = notifier.insert_rows(parent, row, 1);
//!     // link the node
//! } // end_insert forwarded here
//! ```

pub mod channel;

pub use channel::{ChannelViewSink, NullViewSink, RecordingViewSink, ViewEvent};

use crate::tree::NodeId;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Consumer of tree change notifications, normally a tree view model
pub trait ViewSink {
    fn begin_insert(&mut self, parent: NodeId, first: usize, count: usize);
    fn end_insert(&mut self);
    fn begin_remove(&mut self, parent: NodeId, first: usize, count: usize);
    fn end_remove(&mut self);
    fn begin_reset(&mut self);
    fn end_reset(&mut self);
    fn layout_about_to_change(&mut self);
    fn layout_changed(&mut self);
    fn item_changed(&mut self, node: NodeId);
}

/// Application phase gating view notifications and expensive cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecyclePhase {
    #[default]
    Running,
    ShuttingDown,
}

pub struct ViewNotifier {
    sink: RefCell<Box<dyn ViewSink>>,
    phase: Cell<LifecyclePhase>,
    insert_open: Cell<bool>,
    remove_depth: Cell<u32>,
    protocol_violations: Cell<u32>,
}

impl ViewNotifier {
    pub fn new(sink: Box<dyn ViewSink>) -> Rc<Self> {
        Rc::new(Self {
            sink: RefCell::new(sink),
            phase: Cell::new(LifecyclePhase::Running),
            insert_open: Cell::new(false),
            remove_depth: Cell::new(0),
            protocol_violations: Cell::new(0),
        })
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase.get()
    }

    pub fn set_phase(&self, phase: LifecyclePhase) {
        tracing::debug!("Lifecycle phase {:?} -> {:?}", self.phase.get(), phase);
        self.phase.set(phase);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.phase.get() == LifecyclePhase::ShuttingDown
    }

    /// Number of nested insert brackets detected
    pub fn protocol_violations(&self) -> u32 {
        self.protocol_violations.get()
    }

    fn forwarding(&self) -> bool {
        !self.is_shutting_down()
    }

    /// Open an insert bracket for `count` rows at `first` under `parent`
    pub fn insert_rows(self: &Rc<Self>, parent: NodeId, first: usize, count: usize) -> InsertRowsGuard {
        if self.insert_open.get() {
            tracing::error!(
                "Nested insert bracket under {} at row {} while another insert is open",
                parent,
                first
            );
            self.protocol_violations.set(self.protocol_violations.get() + 1);
            return InsertRowsGuard {
                notifier: Rc::clone(self),
                forwarded: false,
                owns_flag: false,
            };
        }

        self.insert_open.set(true);
        let forwarded = self.forwarding();
        if forwarded {
            self.sink.borrow_mut().begin_insert(parent, first, count);
        }
        InsertRowsGuard {
            notifier: Rc::clone(self),
            forwarded,
            owns_flag: true,
        }
    }

    /// Open a remove bracket for `count` rows at `first` under `parent`
    pub fn remove_rows(self: &Rc<Self>, parent: NodeId, first: usize, count: usize) -> RemoveRowsGuard {
        let depth = self.remove_depth.get();
        self.remove_depth.set(depth + 1);

        let forwarded = depth == 0 && self.forwarding();
        if forwarded {
            self.sink.borrow_mut().begin_remove(parent, first, count);
        }
        RemoveRowsGuard {
            notifier: Rc::clone(self),
            forwarded,
        }
    }

    pub fn reset(self: &Rc<Self>) -> ResetGuard {
        let forwarded = self.forwarding();
        if forwarded {
            self.sink.borrow_mut().begin_reset();
        }
        ResetGuard {
            notifier: Rc::clone(self),
            forwarded,
        }
    }

    pub fn layout(self: &Rc<Self>) -> LayoutGuard {
        let forwarded = self.forwarding();
        if forwarded {
            self.sink.borrow_mut().layout_about_to_change();
        }
        LayoutGuard {
            notifier: Rc::clone(self),
            forwarded,
        }
    }

    pub fn item_changed(&self, node: NodeId) {
        if self.forwarding() {
            self.sink.borrow_mut().item_changed(node);
        }
    }
}

#[must_use = "the bracket closes when the guard is dropped"]
pub struct InsertRowsGuard {
    notifier: Rc<ViewNotifier>,
    forwarded: bool,
    owns_flag: bool,
}

impl Drop for InsertRowsGuard {
    fn drop(&mut self) {
        if self.owns_flag {
            self.notifier.insert_open.set(false);
        }
        if self.forwarded {
            self.notifier.sink.borrow_mut().end_insert();
        }
    }
}

#[must_use = "the bracket closes when the guard is dropped"]
pub struct RemoveRowsGuard {
    notifier: Rc<ViewNotifier>,
    forwarded: bool,
}

impl Drop for RemoveRowsGuard {
    fn drop(&mut self) {
        let depth = self.notifier.remove_depth.get();
        self.notifier.remove_depth.set(depth.saturating_sub(1));
        if self.forwarded {
            self.notifier.sink.borrow_mut().end_remove();
        }
    }
}

#[must_use = "the bracket closes when the guard is dropped"]
pub struct ResetGuard {
    notifier: Rc<ViewNotifier>,
    forwarded: bool,
}

impl Drop for ResetGuard {
    fn drop(&mut self) {
        if self.forwarded {
            self.notifier.sink.borrow_mut().end_reset();
        }
    }
}

#[must_use = "the bracket closes when the guard is dropped"]
pub struct LayoutGuard {
    notifier: Rc<ViewNotifier>,
    forwarded: bool,
}

impl Drop for LayoutGuard {
    fn drop(&mut self) {
        if self.forwarded {
            self.notifier.sink.borrow_mut().layout_changed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (Rc<ViewNotifier>, RecordingViewSink) {
        let sink = RecordingViewSink::new();
        (ViewNotifier::new(Box::new(sink.clone())), sink)
    }

    #[test]
    fn test_insert_bracket_closes_on_drop() {
        let (notifier, sink) = recording();
        {
            let _guard = notifier.insert_rows(NodeId(0), 2, 1);
            assert_eq!(sink.events().len(), 1);
        }
        assert_eq!(
            sink.events(),
            vec![
                ViewEvent::BeginInsert {
                    parent: NodeId(0),
                    first: 2,
                    count: 1
                },
                ViewEvent::EndInsert
            ]
        );
    }

    #[test]
    fn test_nested_insert_is_a_violation() {
        let (notifier, sink) = recording();
        {
            let _outer = notifier.insert_rows(NodeId(0), 0, 1);
            let _inner = notifier.insert_rows(NodeId(0), 1, 1);
        }
        assert_eq!(notifier.protocol_violations(), 1);
        assert_eq!(sink.events().len(), 2);

        // the protocol recovers once the outer bracket closed
        drop(notifier.insert_rows(NodeId(0), 0, 1));
        assert_eq!(notifier.protocol_violations(), 1);
        assert_eq!(sink.events().len(), 4);
    }

    #[test]
    fn test_nested_remove_folds_into_outer() {
        let (notifier, sink) = recording();
        {
            let _outer = notifier.remove_rows(NodeId(0), 0, 3);
            let _inner = notifier.remove_rows(NodeId(1), 0, 2);
        }
        assert_eq!(
            sink.events(),
            vec![
                ViewEvent::BeginRemove {
                    parent: NodeId(0),
                    first: 0,
                    count: 3
                },
                ViewEvent::EndRemove
            ]
        );
    }

    #[test]
    fn test_shutdown_suppresses_brackets() {
        let (notifier, sink) = recording();
        notifier.set_phase(LifecyclePhase::ShuttingDown);
        drop(notifier.insert_rows(NodeId(0), 0, 1));
        drop(notifier.remove_rows(NodeId(0), 0, 1));
        drop(notifier.reset());
        notifier.item_changed(NodeId(3));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_layout_and_reset_brackets() {
        let (notifier, sink) = recording();
        drop(notifier.layout());
        drop(notifier.reset());
        assert_eq!(
            sink.events(),
            vec![
                ViewEvent::LayoutAboutToChange,
                ViewEvent::LayoutChanged,
                ViewEvent::BeginReset,
                ViewEvent::EndReset
            ]
        );
    }
}
