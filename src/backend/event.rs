//! Events delivered by the collaborator
//!
//! Every signal the core reacts to is one variant here. The compositor state
//! routes each kind to its handler in `CompositorState::handle_event`.

use wayland_protocols::xdg::shell::server::xdg_toplevel::ResizeEdge;
use wayland_server::protocol::wl_keyboard::KeyState;
use wayland_server::protocol::wl_pointer::{Axis, AxisSource, ButtonState};

use crate::compositor::{
    ClientId, DataSourceId, OutputId, OutputMode, SurfaceId, SurfaceRole, Transform,
};
use crate::input::{DeviceId, DeviceKind, ModifierState};

/// Any event from the collaborator
#[derive(Debug, Clone)]
pub enum BackendEvent {
    Surface(SurfaceEvent),
    Input(InputEvent),
    Output(OutputEvent),
    Seat(SeatRequest),
}

/// Protocol surface lifecycle
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    /// A shell surface got a role
    New { surface: SurfaceId, role: SurfaceRole },
    Map { surface: SurfaceId },
    Unmap { surface: SurfaceId },
    Destroy { surface: SurfaceId },
    /// Client asked to start an interactive move
    RequestMove { surface: SurfaceId },
    /// Client asked to start an interactive resize
    RequestResize { surface: SurfaceId, edges: ResizeEdge },
}

/// Device hotplug and input
#[derive(Debug, Clone)]
pub enum InputEvent {
    DeviceAdded {
        device: DeviceId,
        kind: DeviceKind,
    },
    DeviceRemoved {
        device: DeviceId,
    },
    /// Relative motion in layout units
    PointerMotion {
        device: DeviceId,
        time: u32,
        dx: f64,
        dy: f64,
    },
    /// Absolute motion, normalized to `[0, 1]`
    PointerMotionAbsolute {
        device: DeviceId,
        time: u32,
        x: f64,
        y: f64,
    },
    PointerButton {
        device: DeviceId,
        time: u32,
        button: u32,
        state: ButtonState,
    },
    PointerAxis {
        device: DeviceId,
        time: u32,
        orientation: Axis,
        delta: f64,
        delta_discrete: i32,
        source: AxisSource,
    },
    PointerFrame {
        device: DeviceId,
    },
    /// Key press or release with the keysyms the active layout produced
    KeyboardKey {
        device: DeviceId,
        time: u32,
        keycode: u32,
        state: KeyState,
        keysyms: Vec<u32>,
    },
    KeyboardModifiers {
        device: DeviceId,
        modifiers: ModifierState,
    },
}

/// Output hotplug and frame pacing
#[derive(Debug, Clone)]
pub enum OutputEvent {
    Connected {
        output: OutputId,
        name: String,
        modes: Vec<OutputMode>,
        scale: f64,
        transform: Transform,
    },
    /// The output is ready for a new frame
    Frame {
        output: OutputId,
    },
    Disconnected {
        output: OutputId,
    },
}

/// Client requests made through the seat
#[derive(Debug, Clone)]
pub enum SeatRequest {
    SetCursor {
        client: ClientId,
        surface: Option<SurfaceId>,
        hotspot_x: i32,
        hotspot_y: i32,
    },
    SetSelection {
        source: Option<DataSourceId>,
        serial: u32,
    },
}

impl From<SurfaceEvent> for BackendEvent {
    fn from(event: SurfaceEvent) -> Self {
        BackendEvent::Surface(event)
    }
}

impl From<InputEvent> for BackendEvent {
    fn from(event: InputEvent) -> Self {
        BackendEvent::Input(event)
    }
}

impl From<OutputEvent> for BackendEvent {
    fn from(event: OutputEvent) -> Self {
        BackendEvent::Output(event)
    }
}

impl From<SeatRequest> for BackendEvent {
    fn from(event: SeatRequest) -> Self {
        BackendEvent::Seat(event)
    }
}
