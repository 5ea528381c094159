//! Backend module
//!
//! The display collaborator sits behind these traits: it owns protocol
//! surfaces, input devices, outputs and the renderer, and the core talks to
//! it only through handles.
//!
//! - `SurfaceBackend`: surface geometry queries and toplevel control
//! - `SeatBackend`: seat-level delegation (focus, input notifications, cursor)
//! - `OutputBackend`: mode setting and the per-frame render pass
//! - Event loop integration with calloop

pub mod event;
pub mod event_loop;
pub mod headless;

use std::time::Duration;

use wayland_server::protocol::wl_keyboard::KeyState;
use wayland_server::protocol::wl_pointer::{Axis, AxisSource, ButtonState};
use wayland_server::protocol::wl_seat::Capability;

use crate::compositor::{
    ClientId, DataSourceId, OutputId, OutputMode, Rect, SubSurface, SurfaceId, Transform,
};
use crate::input::{CursorImage, DeviceId, Keymap, KeymapNames, ModifierState};

pub use event::{BackendEvent, InputEvent, OutputEvent, SeatRequest, SurfaceEvent};
pub use event_loop::EventLoop;
pub use headless::HeadlessBackend;

/// Surface queries and toplevel control
pub trait SurfaceBackend {
    /// Find the surface in `toplevel`'s tree under the toplevel-local point.
    ///
    /// Returns the surface and the point translated into its local coordinates.
    fn surface_at(&self, toplevel: SurfaceId, sx: f64, sy: f64) -> Option<(SurfaceId, f64, f64)>;

    /// The window geometry box of a toplevel, relative to its surface origin
    fn surface_geometry(&self, toplevel: SurfaceId) -> Rect;

    /// The client owning a surface
    fn surface_client(&self, surface: SurfaceId) -> Option<ClientId>;

    /// Every surface of the toplevel's tree, in paint order
    fn surface_tree(&self, toplevel: SurfaceId) -> Vec<SubSurface>;

    /// Send the activated state to a toplevel
    fn set_activated(&mut self, toplevel: SurfaceId, activated: bool);

    /// Ask a toplevel to resize; the client answers with its own commit
    fn set_size(&mut self, toplevel: SurfaceId, width: i32, height: i32);
}

/// Seat-level delegation
pub trait SeatBackend {
    fn set_capabilities(&mut self, capabilities: Capability);

    /// Compile a keymap from rule names and attach it to the device
    fn load_keymap(&mut self, device: DeviceId, names: &KeymapNames)
        -> Result<Keymap, BackendError>;

    fn release_keymap(&mut self, keymap: Keymap);

    fn set_repeat_info(&mut self, device: DeviceId, rate: i32, delay: i32);

    /// Make `device` the seat's active keyboard
    fn set_keyboard(&mut self, device: DeviceId);

    fn keyboard_notify_enter(
        &mut self,
        surface: SurfaceId,
        keycodes: &[u32],
        modifiers: &ModifierState,
    );

    fn keyboard_clear_focus(&mut self);

    fn keyboard_notify_key(&mut self, time: u32, keycode: u32, state: KeyState);

    fn keyboard_notify_modifiers(&mut self, modifiers: &ModifierState);

    fn pointer_notify_enter(&mut self, surface: SurfaceId, sx: f64, sy: f64);

    fn pointer_notify_motion(&mut self, time: u32, sx: f64, sy: f64);

    fn pointer_notify_button(&mut self, time: u32, button: u32, state: ButtonState);

    fn pointer_notify_axis(
        &mut self,
        time: u32,
        axis: Axis,
        delta: f64,
        delta_discrete: i32,
        source: AxisSource,
    );

    fn pointer_notify_frame(&mut self);

    fn pointer_clear_focus(&mut self);

    fn set_cursor_image(&mut self, image: &CursorImage);

    /// Clipboard passthrough
    fn set_selection(&mut self, source: Option<DataSourceId>, serial: u32);
}

/// Output configuration and rendering
pub trait OutputBackend {
    fn set_mode(&mut self, output: OutputId, mode: &OutputMode);

    fn enable(&mut self, output: OutputId, enabled: bool);

    fn commit(&mut self, output: OutputId) -> Result<(), BackendError>;

    /// Acquire a render pass for the output's effective resolution
    fn begin_render(&mut self, output: OutputId, width: i32, height: i32)
        -> Result<(), BackendError>;

    fn clear(&mut self, color: [f32; 4]);

    /// Draw a surface's texture into `dest` (output pixels) with its transform
    fn render_surface(&mut self, surface: SurfaceId, dest: Rect, transform: Transform);

    /// Let the client draw its next frame
    fn send_frame_done(&mut self, surface: SurfaceId, time: Duration);

    /// Software cursor overlay
    fn render_cursor(&mut self, output: OutputId);

    fn end_render(&mut self);
}

/// Everything the compositor core needs from its collaborator
pub trait Backend: SurfaceBackend + SeatBackend + OutputBackend {}

impl<T: SurfaceBackend + SeatBackend + OutputBackend> Backend for T {}

/// Collaborator failures the core recovers from
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Failed to compile keymap: {0}")]
    Keymap(String),
    #[error("Commit failed on output {0:?}")]
    OutputCommit(OutputId),
    #[error("Cannot acquire a render pass on output {0:?}")]
    RenderUnavailable(OutputId),
    #[error("Unknown output {0:?}")]
    UnknownOutput(OutputId),
}
