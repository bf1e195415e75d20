//! Start/stop notification for animation state transitions

/// A state transition on one running animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationEvent {
    /// The animation was activated this tick
    Started { code: String },
    /// The animation fully stopped this tick (both flags cleared)
    Stopped { code: String },
}

/// Handle returned by [`Observers::register`]; pass back to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverHandle(u64);

/// Explicit observer registration: a list of callback handles invoked
/// synchronously at the point of the state transition.
#[derive(Default)]
pub struct Observers {
    next_id: u64,
    handlers: Vec<(u64, Box<dyn FnMut(&AnimationEvent)>)>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Box<dyn FnMut(&AnimationEvent)>) -> ObserverHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers.push((id, handler));
        ObserverHandle(id)
    }

    /// Remove a handler. Returns false if the handle was already gone.
    pub fn unregister(&mut self, handle: ObserverHandle) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(id, _)| *id != handle.0);
        self.handlers.len() != before
    }

    pub fn emit(&mut self, event: &AnimationEvent) {
        for (_, handler) in &mut self.handlers {
            handler(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}
