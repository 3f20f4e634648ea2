use super::ViewSink;
use crate::tree::NodeId;
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::broadcast;

/// A single view notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewEvent {
    BeginInsert {
        parent: NodeId,
        first: usize,
        count: usize,
    },
    EndInsert,
    BeginRemove {
        parent: NodeId,
        first: usize,
        count: usize,
    },
    EndRemove,
    BeginReset,
    EndReset,
    LayoutAboutToChange,
    LayoutChanged,
    ItemChanged(NodeId),
}

/// Publishes view notifications on a tokio broadcast channel.
///
/// Observers mirror the tree by subscribing; events published while nobody
/// is subscribed are dropped.
#[derive(Clone)]
pub struct ChannelViewSink {
    tx: broadcast::Sender<ViewEvent>,
}

impl ChannelViewSink {
    /// Create a sink with a buffer of 100 events
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: ViewEvent) {
        // no subscribers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for ChannelViewSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewSink for ChannelViewSink {
    fn begin_insert(&mut self, parent: NodeId, first: usize, count: usize) {
        self.publish(ViewEvent::BeginInsert {
            parent,
            first,
            count,
        });
    }

    fn end_insert(&mut self) {
        self.publish(ViewEvent::EndInsert);
    }

    fn begin_remove(&mut self, parent: NodeId, first: usize, count: usize) {
        self.publish(ViewEvent::BeginRemove {
            parent,
            first,
            count,
        });
    }

    fn end_remove(&mut self) {
        self.publish(ViewEvent::EndRemove);
    }

    fn begin_reset(&mut self) {
        self.publish(ViewEvent::BeginReset);
    }

    fn end_reset(&mut self) {
        self.publish(ViewEvent::EndReset);
    }

    fn layout_about_to_change(&mut self) {
        self.publish(ViewEvent::LayoutAboutToChange);
    }

    fn layout_changed(&mut self) {
        self.publish(ViewEvent::LayoutChanged);
    }

    fn item_changed(&mut self, node: NodeId) {
        self.publish(ViewEvent::ItemChanged(node));
    }
}

/// Keeps every event in memory. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingViewSink {
    events: Rc<RefCell<Vec<ViewEvent>>>,
}

impl RecordingViewSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn push(&self, event: ViewEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl ViewSink for RecordingViewSink {
    fn begin_insert(&mut self, parent: NodeId, first: usize, count: usize) {
        self.push(ViewEvent::BeginInsert {
            parent,
            first,
            count,
        });
    }

    fn end_insert(&mut self) {
        self.push(ViewEvent::EndInsert);
    }

    fn begin_remove(&mut self, parent: NodeId, first: usize, count: usize) {
        self.push(ViewEvent::BeginRemove {
            parent,
            first,
            count,
        });
    }

    fn end_remove(&mut self) {
        self.push(ViewEvent::EndRemove);
    }

    fn begin_reset(&mut self) {
        self.push(ViewEvent::BeginReset);
    }

    fn end_reset(&mut self) {
        self.push(ViewEvent::EndReset);
    }

    fn layout_about_to_change(&mut self) {
        self.push(ViewEvent::LayoutAboutToChange);
    }

    fn layout_changed(&mut self) {
        self.push(ViewEvent::LayoutChanged);
    }

    fn item_changed(&mut self, node: NodeId) {
        self.push(ViewEvent::ItemChanged(node));
    }
}

/// Discards every notification
#[derive(Clone, Copy, Default)]
pub struct NullViewSink;

impl ViewSink for NullViewSink {
    fn begin_insert(&mut self, _parent: NodeId, _first: usize, _count: usize) {}
    fn end_insert(&mut self) {}
    fn begin_remove(&mut self, _parent: NodeId, _first: usize, _count: usize) {}
    fn end_remove(&mut self) {}
    fn begin_reset(&mut self) {}
    fn end_reset(&mut self) {}
    fn layout_about_to_change(&mut self) {}
    fn layout_changed(&mut self) {}
    fn item_changed(&mut self, _node: NodeId) {}
}
