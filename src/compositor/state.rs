//! Global compositor state
//!
//! This module contains the central compositor state that owns every
//! registry, and the router that hands each collaborator event to its
//! handler. View lifecycle handlers live here as well.

use std::time::{Duration, Instant};

use log::{debug, info, trace};

use crate::backend::{
    Backend, BackendEvent, InputEvent, OutputEvent, SeatRequest, SurfaceEvent,
};
use crate::compositor::{
    GrabState, OutputRegistry, ResizeEdges, SurfaceId, SurfaceRole, View, ViewRegistry,
};
use crate::config::Config;
use crate::input::{Cursor, Seat};

/// The global compositor state
///
/// This struct holds all the state needed to run the compositor, and the
/// collaborator it drives.
pub struct CompositorState<B: Backend> {
    pub config: Config,

    /// Display collaborator
    pub backend: B,

    /// Floating toplevels in stacking order
    pub views: ViewRegistry,

    /// Output manager - tracks displays/monitors
    pub outputs: OutputRegistry,

    /// Input seat - manages keyboards and pointers
    pub seat: Seat,

    pub cursor: Cursor,

    /// Interactive move/resize
    pub grab: GrabState,

    /// Base for frame-done timestamps
    started: Instant,

    running: bool,
}

impl<B: Backend> CompositorState<B> {
    /// Create a new compositor state
    pub fn new(config: Config, backend: B) -> Self {
        let seat = Seat::new(config.seat_name.clone());
        Self {
            config,
            backend,
            views: ViewRegistry::new(),
            outputs: OutputRegistry::new(),
            seat,
            cursor: Cursor::new(),
            grab: GrabState::new(),
            started: Instant::now(),
            running: true,
        }
    }

    /// Time since the compositor started
    pub fn now(&self) -> Duration {
        self.started.elapsed()
    }

    /// Ask the event loop to exit
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Route one collaborator event to its handler
    pub fn handle_event(&mut self, event: BackendEvent) {
        trace!("Event: {:?}", event);
        match event {
            BackendEvent::Surface(event) => self.handle_surface_event(event),
            BackendEvent::Input(event) => self.handle_input_event(event),
            BackendEvent::Output(event) => self.handle_output_event(event),
            BackendEvent::Seat(request) => self.handle_seat_request(request),
        }
    }

    fn handle_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::New { surface, role } => self.handle_new_surface(surface, role),
            SurfaceEvent::Map { surface } => self.handle_map(surface),
            SurfaceEvent::Unmap { surface } => self.handle_unmap(surface),
            SurfaceEvent::Destroy { surface } => self.handle_destroy(surface),
            SurfaceEvent::RequestMove { surface } => self.handle_move_request(surface),
            SurfaceEvent::RequestResize { surface, edges } => {
                self.handle_resize_request(surface, ResizeEdges::from(edges))
            }
        }
    }

    fn handle_input_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::DeviceAdded { device, kind } => self.handle_device_added(device, kind),
            InputEvent::DeviceRemoved { device } => self.handle_device_removed(device),
            InputEvent::PointerMotion {
                device,
                time,
                dx,
                dy,
            } => self.handle_pointer_motion(device, time, dx, dy),
            InputEvent::PointerMotionAbsolute { device, time, x, y } => {
                self.handle_pointer_motion_absolute(device, time, x, y)
            }
            InputEvent::PointerButton {
                time,
                button,
                state,
                ..
            } => self.handle_pointer_button(time, button, state),
            InputEvent::PointerAxis {
                time,
                orientation,
                delta,
                delta_discrete,
                source,
                ..
            } => self.handle_pointer_axis(time, orientation, delta, delta_discrete, source),
            InputEvent::PointerFrame { .. } => self.handle_pointer_frame(),
            InputEvent::KeyboardKey {
                device,
                time,
                keycode,
                state,
                keysyms,
            } => self.handle_keyboard_key(device, time, keycode, state, &keysyms),
            InputEvent::KeyboardModifiers { device, modifiers } => {
                self.handle_keyboard_modifiers(device, modifiers)
            }
        }
    }

    fn handle_output_event(&mut self, event: OutputEvent) {
        match event {
            OutputEvent::Connected {
                output,
                name,
                modes,
                scale,
                transform,
            } => self.handle_output_connected(output, name, modes, scale, transform),
            OutputEvent::Frame { output } => self.render_output(output),
            OutputEvent::Disconnected { output } => self.handle_output_disconnected(output),
        }
    }

    fn handle_seat_request(&mut self, request: SeatRequest) {
        match request {
            SeatRequest::SetCursor {
                client,
                surface,
                hotspot_x,
                hotspot_y,
            } => self.handle_set_cursor_request(client, surface, hotspot_x, hotspot_y),
            SeatRequest::SetSelection { source, serial } => {
                self.handle_set_selection_request(source, serial)
            }
        }
    }

    /// A surface got a role; toplevels become views on top of the stack
    pub fn handle_new_surface(&mut self, surface: SurfaceId, role: SurfaceRole) {
        if role != SurfaceRole::XdgToplevel {
            trace!("Ignoring {:?} surface {:?}", role, surface);
            return;
        }
        if self.views.find_by_surface(surface).is_some() {
            debug!("Surface {:?} already has a view", surface);
            return;
        }

        let id = self.views.insert_front(View::new(surface));
        info!("New view {:?} for {:?}", id, surface);
    }

    /// The surface committed its first buffer
    pub fn handle_map(&mut self, surface: SurfaceId) {
        let Some(view) = self
            .views
            .find_by_surface(surface)
            .and_then(|id| self.views.get_mut(id))
        else {
            debug!("Map for unknown surface {:?}", surface);
            return;
        };
        view.mapped = true;
        debug!("Mapped {:?}", surface);
    }

    pub fn handle_unmap(&mut self, surface: SurfaceId) {
        let Some(id) = self.views.find_by_surface(surface) else {
            debug!("Unmap for unknown surface {:?}", surface);
            return;
        };
        if self.grab.target() == Some(id) {
            self.end_grab();
        }
        if self.seat.keyboard_focus() == Some(surface) {
            self.raise_and_activate(None);
        }
        if let Some(view) = self.views.get_mut(id) {
            view.mapped = false;
        }
        debug!("Unmapped {:?}", surface);
    }

    /// The toplevel is gone; every reference to the view is dropped before
    /// the view itself
    pub fn handle_destroy(&mut self, surface: SurfaceId) {
        let Some(id) = self.views.find_by_surface(surface) else {
            debug!("Destroy for unknown surface {:?}", surface);
            return;
        };

        if self.grab.target() == Some(id) {
            self.end_grab();
        }
        if self.seat.keyboard_focus() == Some(surface) {
            self.seat.set_keyboard_focus(None);
            self.backend.keyboard_clear_focus();
        }
        if self.seat.pointer_focus().is_some_and(|focus| focus.view == id) {
            self.clear_pointer_focus();
        }

        self.views.remove(id);
        info!("View {:?} destroyed", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;
    use crate::compositor::{ClientId, GrabMode};
    use crate::input::DeviceId;
    use wayland_server::protocol::wl_pointer::ButtonState;

    fn state() -> CompositorState<HeadlessBackend> {
        CompositorState::new(Config::default(), HeadlessBackend::new())
    }

    fn add_toplevel(state: &mut CompositorState<HeadlessBackend>, surface: u64) {
        let surface = SurfaceId(surface);
        state.backend.add_toplevel(surface, ClientId(surface.0), 100, 100);
        state.handle_event(
            SurfaceEvent::New {
                surface,
                role: SurfaceRole::XdgToplevel,
            }
            .into(),
        );
    }

    #[test]
    fn test_compositor_state_new() {
        let state = state();
        assert!(state.views.is_empty());
        assert!(state.outputs.is_empty());
        assert!(state.is_running());
        assert_eq!(state.grab.mode(), GrabMode::None);
    }

    #[test]
    fn test_stop() {
        let mut state = state();
        state.stop();
        assert!(!state.is_running());
    }

    #[test]
    fn test_only_toplevels_become_views() {
        let mut state = state();
        state.handle_new_surface(SurfaceId(1), SurfaceRole::XdgPopup);
        state.handle_new_surface(SurfaceId(2), SurfaceRole::Subsurface);
        assert!(state.views.is_empty());

        add_toplevel(&mut state, 3);
        add_toplevel(&mut state, 3);
        assert_eq!(state.views.len(), 1);
    }

    #[test]
    fn test_new_view_starts_unmapped_at_origin() {
        let mut state = state();
        add_toplevel(&mut state, 1);
        let id = state.views.find_by_surface(SurfaceId(1)).unwrap();
        let view = state.views.get(id).unwrap();
        assert!(!view.mapped);
        assert_eq!((view.x, view.y), (0, 0));
        assert_eq!(state.views.front(), Some(id));
    }

    #[test]
    fn test_map_unmap_keeps_entry() {
        let mut state = state();
        add_toplevel(&mut state, 1);
        state.handle_event(SurfaceEvent::Map { surface: SurfaceId(1) }.into());
        assert_eq!(state.views.iter_back_to_front().count(), 1);

        state.handle_event(SurfaceEvent::Unmap { surface: SurfaceId(1) }.into());
        assert_eq!(state.views.iter_back_to_front().count(), 0);
        assert_eq!(state.views.len(), 1);
    }

    #[test]
    fn test_destroy_clears_references() {
        let mut state = state();
        add_toplevel(&mut state, 1);
        state.handle_map(SurfaceId(1));

        state.handle_pointer_motion(DeviceId(1), 0, 50.0, 50.0);
        state.handle_pointer_button(0, 0x110, ButtonState::Pressed);
        state.handle_move_request(SurfaceId(1));
        assert_eq!(state.grab.mode(), GrabMode::Move);
        assert_eq!(state.seat.keyboard_focus(), Some(SurfaceId(1)));

        state.handle_event(SurfaceEvent::Destroy { surface: SurfaceId(1) }.into());
        assert_eq!(state.grab.mode(), GrabMode::None);
        assert!(state.seat.keyboard_focus().is_none());
        assert!(state.seat.pointer_focus().is_none());
        assert!(state.views.is_empty());
        assert_eq!(state.backend.keyboard_focus(), None);
        assert_eq!(state.backend.pointer_focus(), None);
    }

    #[test]
    fn test_unmap_ends_grab() {
        let mut state = state();
        add_toplevel(&mut state, 1);
        state.handle_map(SurfaceId(1));
        state.handle_pointer_motion(DeviceId(1), 0, 50.0, 50.0);
        state.handle_move_request(SurfaceId(1));
        assert!(state.grab.is_active());

        state.handle_unmap(SurfaceId(1));
        assert!(!state.grab.is_active());
    }

    #[test]
    fn test_unmap_drops_keyboard_focus() {
        let mut state = state();
        add_toplevel(&mut state, 1);
        add_toplevel(&mut state, 2);
        state.handle_map(SurfaceId(1));
        state.handle_map(SurfaceId(2));
        let v1 = state.views.find_by_surface(SurfaceId(1)).unwrap();
        state.raise_and_activate(Some(v1));

        // Unmapping another view leaves focus alone
        state.handle_unmap(SurfaceId(2));
        assert_eq!(state.seat.keyboard_focus(), Some(SurfaceId(1)));

        state.handle_unmap(SurfaceId(1));
        assert!(state.seat.keyboard_focus().is_none());
        assert_eq!(state.backend.keyboard_focus(), None);
        assert!(!state.backend.is_activated(SurfaceId(1)));
        assert!(!state.views.get(v1).unwrap().activated);
        assert_eq!(state.views.len(), 2);
    }

    #[test]
    fn test_events_for_unknown_surfaces_ignored() {
        let mut state = state();
        state.handle_map(SurfaceId(9));
        state.handle_unmap(SurfaceId(9));
        state.handle_destroy(SurfaceId(9));
        state.handle_move_request(SurfaceId(9));
        assert!(state.views.is_empty());
        assert!(!state.grab.is_active());
    }
}
