//! Typed publish/subscribe surface
//!
//! Listeners are called synchronously, in registration order, from inside the
//! call that emits. There is no queue: an event is fully delivered before
//! `emit` returns.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::transform::Coordinates;

/// Handle returned by [`Emitter::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Synchronous observer list for events of type `E`
pub struct Emitter<E> {
    next_id: u64,
    listeners: Vec<(ListenerId, Box<dyn FnMut(&E)>)>,
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<E> Emitter<E> {
    /// Create an emitter with no listeners
    pub fn new() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    /// Register a listener
    pub fn on(&mut self, listener: impl FnMut(&E) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Deliver an event to every listener
    pub fn emit(&mut self, event: &E) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    /// Remove every listener
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

/// Pointer interaction reported on a node, an edge or the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerAction {
    Enter,
    Leave,
    Down,
    Up,
    Click,
    RightClick,
    DoubleClick,
    Wheel,
}

impl PointerAction {
    fn prefix(&self) -> &'static str {
        match self {
            PointerAction::Enter => "enter",
            PointerAction::Leave => "leave",
            PointerAction::Down => "down",
            PointerAction::Up => "up",
            PointerAction::Click => "click",
            PointerAction::RightClick => "rightClick",
            PointerAction::DoubleClick => "doubleClick",
            PointerAction::Wheel => "wheel",
        }
    }
}

/// Flag shared by every listener of one input event. Setting it cancels
/// the captor's default camera behavior for that event.
#[derive(Debug, Clone, Default)]
pub struct DefaultPrevented(Rc<Cell<bool>>);

impl DefaultPrevented {
    pub fn prevent(&self) {
        self.0.set(true);
    }

    pub fn is_prevented(&self) -> bool {
        self.0.get()
    }
}

/// The flag is bookkeeping and never makes two events differ
impl PartialEq for DefaultPrevented {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// Where the pointer was when an entity event fired
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointerPayload {
    /// Viewport position in pixels
    pub position: Coordinates,
    /// Normalised wheel delta, only for wheel events
    pub delta: Option<f64>,
    pub prevented: DefaultPrevented,
}

impl PointerPayload {
    pub fn new(position: Coordinates) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Cancel the camera behavior attached to the originating input
    pub fn prevent_default(&self) {
        self.prevented.prevent();
    }
}

/// Events emitted by the renderer
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    Node {
        action: PointerAction,
        node: String,
        payload: PointerPayload,
    },
    Edge {
        action: PointerAction,
        edge: String,
        payload: PointerPayload,
    },
    Stage {
        action: PointerAction,
        payload: PointerPayload,
    },
    BeforeProcess,
    AfterProcess,
    BeforeRender,
    AfterRender,
    Resize {
        width: f64,
        height: f64,
    },
    Kill,
}

impl RendererEvent {
    /// Conventional event name, e.g. `clickNode`, `leaveEdge`, `afterRender`
    pub fn name(&self) -> String {
        match self {
            RendererEvent::Node { action, .. } => format!("{}Node", action.prefix()),
            RendererEvent::Edge { action, .. } => format!("{}Edge", action.prefix()),
            RendererEvent::Stage { action, .. } => format!("{}Stage", action.prefix()),
            RendererEvent::BeforeProcess => "beforeProcess".to_string(),
            RendererEvent::AfterProcess => "afterProcess".to_string(),
            RendererEvent::BeforeRender => "beforeRender".to_string(),
            RendererEvent::AfterRender => "afterRender".to_string(),
            RendererEvent::Resize { .. } => "resize".to_string(),
            RendererEvent::Kill => "kill".to_string(),
        }
    }
}
