//! Cooperative frame scheduling
//!
//! Everything runs on one timeline driven by the host's "next frame" tick.
//! Requests are coalesced: scheduling twice before the frame runs yields a
//! single frame, and a highlighted-only request is dropped when a full
//! render is already pending.

use std::cell::RefCell;
use std::rc::Rc;

/// Work to perform on the next frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    /// Full render of every layer
    Render,
    /// Repaint of the hover overlay only
    RenderHighlighted,
}

#[derive(Debug, Default)]
struct SchedulerState {
    render: bool,
    highlighted: bool,
    frames: u64,
}

/// Shared handle over the pending frame requests. Clones observe and update
/// the same state, so graph and camera listeners can hold one.
#[derive(Debug, Clone, Default)]
pub struct FrameScheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a full render. Returns false if one was already pending.
    pub fn schedule_render(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.render {
            return false;
        }
        state.render = true;
        true
    }

    /// Request an overlay repaint. Returns false if any frame is already
    /// pending, since a full render repaints the overlay too.
    pub fn schedule_highlighted_render(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.render || state.highlighted {
            return false;
        }
        state.highlighted = true;
        true
    }

    pub fn is_pending(&self) -> bool {
        let state = self.state.borrow();
        state.render || state.highlighted
    }

    pub fn is_render_pending(&self) -> bool {
        self.state.borrow().render
    }

    /// Drop every pending request
    pub fn cancel(&self) {
        let mut state = self.state.borrow_mut();
        state.render = false;
        state.highlighted = false;
    }

    /// Consume the pending request for this frame
    pub fn take(&self) -> Option<FrameRequest> {
        let mut state = self.state.borrow_mut();
        let request = if state.render {
            Some(FrameRequest::Render)
        } else if state.highlighted {
            Some(FrameRequest::RenderHighlighted)
        } else {
            None
        };
        state.render = false;
        state.highlighted = false;
        if request.is_some() {
            state.frames += 1;
        }
        request
    }

    /// Number of frames consumed so far
    pub fn frames(&self) -> u64 {
        self.state.borrow().frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_requests_coalesce() {
        let scheduler = FrameScheduler::new();
        assert!(scheduler.schedule_render());
        assert!(!scheduler.schedule_render());
        assert_eq!(scheduler.take(), Some(FrameRequest::Render));
        assert_eq!(scheduler.take(), None);
        assert_eq!(scheduler.frames(), 1);
    }

    #[test]
    fn highlighted_request_yields_to_render() {
        let scheduler = FrameScheduler::new();
        scheduler.schedule_render();
        assert!(!scheduler.schedule_highlighted_render());
        assert_eq!(scheduler.take(), Some(FrameRequest::Render));

        assert!(scheduler.schedule_highlighted_render());
        assert!(!scheduler.schedule_highlighted_render());
        // a full render supersedes the overlay repaint
        scheduler.schedule_render();
        assert_eq!(scheduler.take(), Some(FrameRequest::Render));
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn clones_share_state() {
        let scheduler = FrameScheduler::new();
        let handle = scheduler.clone();
        handle.schedule_render();
        assert!(scheduler.is_render_pending());
        scheduler.cancel();
        assert!(!handle.is_pending());
    }
}
