use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::{FetchKey, NodeId};

/// Signals emitted by the store for its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// A view, function, procedure or trigger was selected; the editor inserts
    /// this text at its cursor.
    InsertDefinition { definition: String },

    /// Detail panel visibility, selection or tab changed.
    PanelChanged,

    /// A node's children were materialized.
    NodeLoaded { id: NodeId },

    /// A fetch failed and its node was reverted.
    FetchFailed { key: FetchKey, message: String },
}

#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Vec<UnboundedSender<TreeEvent>>,
}

impl EventBus {
    pub(crate) fn subscribe(&mut self) -> UnboundedReceiver<TreeEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn emit(&mut self, event: TreeEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_fans_out_and_prunes_closed_receivers() {
        let mut bus = EventBus::default();
        let mut first = bus.subscribe();
        let second = bus.subscribe();
        drop(second);

        bus.emit(TreeEvent::PanelChanged);

        assert_eq!(first.try_recv().unwrap(), TreeEvent::PanelChanged);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
