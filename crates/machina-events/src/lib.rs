use crossbeam_channel::{unbounded, Receiver, Sender};
use machina_core::ComponentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Expansion cycle
    ExpandRequested {
        id: ComponentId,
    },
    GenerationStarted {
        id: ComponentId,
    },
    /// Successful merge; carries the immediate children just appended.
    GenerationFinished {
        parent: ComponentId,
        new_children: Vec<ComponentId>,
    },
    /// The collaborator call failed; the tree was not mutated.
    GenerationFailed {
        parent: Option<ComponentId>,
        message: String,
    },

    // Bootstrap
    MachineReady {
        root: ComponentId,
    },

    // Tree & layout
    TreeChanged {
        revision: u64,
    },
    LayoutReady {
        positions: HashMap<String, (f32, f32)>,
    },

    // Camera / animation
    FocusNode {
        id: ComponentId,
    },
    ClearTransientMarks,

    // Notifications
    ShowError {
        message: String,
    },
    ShowInfo {
        message: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Drain all pending events into a listener. Called once per UI frame.
    pub fn dispatch_to<L: EventListener>(&self, listener: &mut L) {
        while let Ok(event) = self.rx.try_recv() {
            listener.handle_event(&event);
        }
    }
}

/// Trait for components that respond to events.
pub trait EventListener {
    fn handle_event(&mut self, event: &Event);
}
