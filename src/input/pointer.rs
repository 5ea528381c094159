//! Pointer routing
//!
//! The cursor lives in desktop coordinates. Every motion runs the grab first;
//! without a grab the view stack is hit-tested and pointer focus follows the
//! topmost surface under the cursor.

use log::{debug, trace};
use wayland_server::protocol::wl_pointer::{Axis, AxisSource, ButtonState};

use super::{DeviceId, PointerFocus};
use crate::backend::Backend;
use crate::compositor::{ClientId, CompositorState, DataSourceId, SurfaceId, ViewHit};

/// What the cursor currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorImage {
    /// An image from the cursor theme
    Named(String),
    /// A client-provided surface; `None` hides the cursor
    Surface {
        surface: Option<SurfaceId>,
        hotspot_x: i32,
        hotspot_y: i32,
    },
}

/// Cursor state
#[derive(Debug, Default)]
pub struct Cursor {
    /// Position in desktop coordinates
    position: (f64, f64),
    /// Last image sent to the collaborator
    image: Option<CursorImage>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current position
    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    pub fn warp(&mut self, x: f64, y: f64) {
        self.position = (x, y);
    }

    pub fn image(&self) -> Option<&CursorImage> {
        self.image.as_ref()
    }

    /// Remember the new image; `false` if it was already showing
    pub fn set_image(&mut self, image: CursorImage) -> bool {
        if self.image.as_ref() == Some(&image) {
            return false;
        }
        self.image = Some(image);
        true
    }
}

impl<B: Backend> CompositorState<B> {
    /// Relative pointer motion
    pub fn handle_pointer_motion(&mut self, device: DeviceId, time: u32, dx: f64, dy: f64) {
        trace!("Motion ({}, {}) from {:?}", dx, dy, device);
        let (x, y) = self.cursor.position();
        let (x, y) = self.outputs.closest_point(x + dx, y + dy);
        self.cursor.warp(x, y);
        self.process_cursor_motion(time);
    }

    /// Absolute pointer motion, normalized over the whole layout
    pub fn handle_pointer_motion_absolute(&mut self, device: DeviceId, time: u32, x: f64, y: f64) {
        trace!("Absolute motion ({}, {}) from {:?}", x, y, device);
        if let Some((x, y)) = self.outputs.absolute_to_layout(x, y) {
            self.cursor.warp(x, y);
        }
        self.process_cursor_motion(time);
    }

    /// Button press or release.
    ///
    /// The client under the pointer hears about the button before focus moves.
    pub fn handle_pointer_button(&mut self, time: u32, button: u32, state: ButtonState) {
        self.backend.pointer_notify_button(time, button, state);

        if state == ButtonState::Released {
            self.end_grab();
        }

        let (x, y) = self.cursor.position();
        let hit = self.views.hit_test(&self.backend, x, y);
        self.raise_and_activate(hit.map(|hit| hit.view));
    }

    pub fn handle_pointer_axis(
        &mut self,
        time: u32,
        orientation: Axis,
        delta: f64,
        delta_discrete: i32,
        source: AxisSource,
    ) {
        self.backend
            .pointer_notify_axis(time, orientation, delta, delta_discrete, source);
    }

    pub fn handle_pointer_frame(&mut self) {
        self.backend.pointer_notify_frame();
    }

    /// A client asked for its own cursor image
    pub fn handle_set_cursor_request(
        &mut self,
        client: ClientId,
        surface: Option<SurfaceId>,
        hotspot_x: i32,
        hotspot_y: i32,
    ) {
        if self.seat.pointer_focus_client() != Some(client) {
            debug!("Ignoring cursor request from unfocused client {:?}", client);
            return;
        }

        let image = CursorImage::Surface {
            surface,
            hotspot_x,
            hotspot_y,
        };
        self.backend.set_cursor_image(&image);
        self.cursor.set_image(image);
    }

    pub fn handle_set_selection_request(&mut self, source: Option<DataSourceId>, serial: u32) {
        self.backend.set_selection(source, serial);
    }

    /// Run the grab or re-route pointer focus after the cursor moved
    pub(crate) fn process_cursor_motion(&mut self, time: u32) {
        if self.update_grab() {
            return;
        }

        let (x, y) = self.cursor.position();
        match self.views.hit_test(&self.backend, x, y) {
            Some(hit) => self.notify_pointer_over(hit, time),
            None => {
                self.set_default_cursor();
                self.clear_pointer_focus();
            }
        }
    }

    fn notify_pointer_over(&mut self, hit: ViewHit, time: u32) {
        let current = self.seat.pointer_focus().map(|focus| focus.surface);
        if current != Some(hit.surface) {
            let client = self.backend.surface_client(hit.surface);
            self.seat.set_pointer_focus(Some(PointerFocus {
                surface: hit.surface,
                view: hit.view,
                client,
            }));
            self.backend.pointer_notify_enter(hit.surface, hit.sx, hit.sy);
        }
        self.backend.pointer_notify_motion(time, hit.sx, hit.sy);
    }

    pub(crate) fn clear_pointer_focus(&mut self) {
        if self.seat.pointer_focus().is_some() {
            self.seat.set_pointer_focus(None);
            self.backend.pointer_clear_focus();
        }
    }

    fn set_default_cursor(&mut self) {
        let image = CursorImage::Named(self.config.default_cursor.clone());
        if self.cursor.image() != Some(&image) {
            self.backend.set_cursor_image(&image);
            self.cursor.set_image(image);
        }
    }
}
