//! Pointer input: hover tracking, entity events and picking queries
//!
//! Each input goes through three steps. The captor recognizes gestures,
//! the renderer reports them on the entity under the pointer, then the
//! captor applies the camera behavior of every gesture that no listener
//! prevented.

use std::time::Instant;

use tracing::trace;

use super::Renderer;
use crate::captors::{CaptorEvent, CaptorEventKind, MouseInput, TouchInput};
use crate::color::color_to_index;
use crate::error::{EntityKind, RendererResult};
use crate::events::{PointerAction, PointerPayload, RendererEvent};
use crate::gpu::{PickingLayer, RenderBackend};
use crate::transform::Coordinates;

impl<B: RenderBackend> Renderer<B> {
    /// Node drawn at a viewport position at the last render
    pub fn get_node_at_position(
        &mut self,
        position: Coordinates,
    ) -> RendererResult<Option<String>> {
        self.entity_at(PickingLayer::Nodes, EntityKind::Node, position)
    }

    /// Edge drawn at a viewport position at the last render. Always `None`
    /// unless edge events are enabled.
    pub fn get_edge_at_position(
        &mut self,
        position: Coordinates,
    ) -> RendererResult<Option<String>> {
        if !self.settings.enable_edge_events {
            return Ok(None);
        }
        self.entity_at(PickingLayer::Edges, EntityKind::Edge, position)
    }

    fn entity_at(
        &mut self,
        layer: PickingLayer,
        kind: EntityKind,
        position: Coordinates,
    ) -> RendererResult<Option<String>> {
        self.ensure_alive()?;
        let Some(pixel) = self.backend.read_picking_pixel(layer, position)? else {
            return Ok(None);
        };
        Ok(match self.picking.resolve(color_to_index(pixel)) {
            Some((found, key)) if found == kind => Some(key.to_string()),
            _ => None,
        })
    }

    /// Feed one mouse input
    pub fn handle_mouse(&mut self, input: MouseInput, now: Instant) -> RendererResult<()> {
        self.ensure_alive()?;
        let events = self.mouse.handle(input, now);
        for event in &events {
            self.dispatch(event)?;
        }
        let context = self.view_context();
        for event in &events {
            self.mouse
                .apply_default(event, &mut self.camera, &context, now);
        }
        self.mouse.finish(&events);
        Ok(())
    }

    /// Feed one touch input
    pub fn handle_touch(&mut self, input: TouchInput, now: Instant) -> RendererResult<()> {
        self.ensure_alive()?;
        let events = self.touch.handle(input, now);
        for event in &events {
            self.dispatch(event)?;
        }
        let context = self.view_context();
        for event in &events {
            self.touch
                .apply_default(event, &mut self.camera, &context, now);
        }
        Ok(())
    }

    fn dispatch(&mut self, event: &CaptorEvent) -> RendererResult<()> {
        trace!(kind = ?event.kind, x = event.position.x, y = event.position.y, "captor event");
        let payload = PointerPayload {
            position: event.position,
            delta: event.delta,
            prevented: event.prevented.clone(),
        };
        match event.kind {
            CaptorEventKind::MouseMoveBody => self.update_hover(&payload),
            CaptorEventKind::MouseLeave => {
                self.leave_stage(payload);
                Ok(())
            }
            CaptorEventKind::MouseEnter => {
                self.events.emit(&RendererEvent::Stage {
                    action: PointerAction::Enter,
                    payload,
                });
                Ok(())
            }
            CaptorEventKind::Click | CaptorEventKind::Tap => {
                self.emit_at(PointerAction::Click, payload)
            }
            CaptorEventKind::RightClick => self.emit_at(PointerAction::RightClick, payload),
            CaptorEventKind::DoubleClick | CaptorEventKind::DoubleTap => {
                self.emit_at(PointerAction::DoubleClick, payload)
            }
            CaptorEventKind::MouseDown | CaptorEventKind::TouchDown => {
                self.emit_at(PointerAction::Down, payload)
            }
            CaptorEventKind::MouseUp | CaptorEventKind::TouchUp => {
                // edges hidden during the drag come back
                if self.settings.hide_edges_on_move {
                    self.scheduler.schedule_render();
                }
                self.emit_at(PointerAction::Up, payload)
            }
            CaptorEventKind::Wheel => self.emit_at(PointerAction::Wheel, payload),
            CaptorEventKind::MouseMove | CaptorEventKind::TouchMove => Ok(()),
        }
    }

    /// Report an action on the node under the pointer, else the edge, else
    /// the stage
    fn emit_at(&mut self, action: PointerAction, payload: PointerPayload) -> RendererResult<()> {
        if let Some(node) = self.get_node_at_position(payload.position)? {
            self.events.emit(&RendererEvent::Node {
                action,
                node,
                payload,
            });
            return Ok(());
        }
        if let Some(edge) = self.get_edge_at_position(payload.position)? {
            self.events.emit(&RendererEvent::Edge {
                action,
                edge,
                payload,
            });
            return Ok(());
        }
        self.events.emit(&RendererEvent::Stage { action, payload });
        Ok(())
    }

    fn is_visible_node(&self, key: &str) -> bool {
        self.node_data
            .get(key)
            .is_some_and(|node| !node.data.hidden)
    }

    /// Emit enter and leave events as the pointer crosses entities. Nodes
    /// occlude edges.
    fn update_hover(&mut self, payload: &PointerPayload) -> RendererResult<()> {
        let node = self
            .get_node_at_position(payload.position)?
            .filter(|key| self.is_visible_node(key));

        if node.is_some() && node != self.hovered_node {
            if let Some(previous) = self.hovered_node.take() {
                self.emit_node(PointerAction::Leave, previous, payload);
            }
            self.hovered_node = node.clone();
            if let Some(node) = node {
                self.emit_node(PointerAction::Enter, node, payload);
            }
            self.scheduler.schedule_highlighted_render();
            return Ok(());
        }
        if node.is_none() {
            if let Some(previous) = self.hovered_node.take() {
                self.emit_node(PointerAction::Leave, previous, payload);
                self.scheduler.schedule_highlighted_render();
                return Ok(());
            }
        }

        if self.settings.enable_edge_events {
            let edge = if self.hovered_node.is_some() {
                None
            } else {
                self.get_edge_at_position(payload.position)?
            };
            if edge != self.hovered_edge {
                if let Some(previous) = self.hovered_edge.take() {
                    self.emit_edge(PointerAction::Leave, previous, payload);
                }
                if let Some(edge) = &edge {
                    self.emit_edge(PointerAction::Enter, edge.clone(), payload);
                }
                self.hovered_edge = edge;
            }
        }
        Ok(())
    }

    /// The pointer left the viewport: whatever was hovered is left too
    fn leave_stage(&mut self, payload: PointerPayload) {
        if let Some(previous) = self.hovered_node.take() {
            self.emit_node(PointerAction::Leave, previous, &payload);
            self.scheduler.schedule_highlighted_render();
        }
        if self.settings.enable_edge_events {
            if let Some(previous) = self.hovered_edge.take() {
                self.emit_edge(PointerAction::Leave, previous, &payload);
            }
        }
        self.events.emit(&RendererEvent::Stage {
            action: PointerAction::Leave,
            payload,
        });
    }

    fn emit_node(&mut self, action: PointerAction, node: String, payload: &PointerPayload) {
        self.events.emit(&RendererEvent::Node {
            action,
            node,
            payload: payload.clone(),
        });
    }

    fn emit_edge(&mut self, action: PointerAction, edge: String, payload: &PointerPayload) {
        self.events.emit(&RendererEvent::Edge {
            action,
            edge,
            payload: payload.clone(),
        });
    }
}
