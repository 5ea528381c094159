//! Input seat coordination
//!
//! The seat owns the attached devices and the core's view of keyboard and
//! pointer focus. Capabilities are derived from the device set.

use log::{debug, info, warn};
use wayland_server::protocol::wl_seat::Capability;

use super::Keyboard;
use crate::backend::Backend;
use crate::compositor::{ClientId, CompositorState, SurfaceId, ViewId};

/// Opaque handle to a collaborator-owned input device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u64);

/// Kind of an input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Keyboard,
    Pointer,
    Touch,
    Other,
}

/// The surface under the pointer and who owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerFocus {
    pub surface: SurfaceId,
    pub view: ViewId,
    pub client: Option<ClientId>,
}

/// Input seat that coordinates keyboards and pointers
#[derive(Debug)]
pub struct Seat {
    /// Seat name
    name: String,
    /// Keyboards in attach order
    keyboards: Vec<Keyboard>,
    pointers: Vec<DeviceId>,
    /// Sticks once the first pointer shows up
    pointer_seen: bool,
    /// Keyboard whose events were forwarded last
    active_keyboard: Option<DeviceId>,
    capabilities: Capability,
    keyboard_focus: Option<SurfaceId>,
    pointer_focus: Option<PointerFocus>,
}

impl Seat {
    pub fn new(name: String) -> Self {
        Self {
            name,
            keyboards: Vec::new(),
            pointers: Vec::new(),
            pointer_seen: false,
            active_keyboard: None,
            capabilities: Capability::empty(),
            keyboard_focus: None,
            pointer_focus: None,
        }
    }

    /// Get the seat name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get seat capabilities
    pub fn capabilities(&self) -> Capability {
        self.capabilities
    }

    /// Recompute capabilities from the device set, returning them if they changed
    pub fn update_capabilities(&mut self) -> Option<Capability> {
        let mut capabilities = Capability::empty();
        if self.pointer_seen {
            capabilities |= Capability::Pointer;
        }
        if !self.keyboards.is_empty() {
            capabilities |= Capability::Keyboard;
        }

        if capabilities == self.capabilities {
            return None;
        }
        self.capabilities = capabilities;
        Some(capabilities)
    }

    pub fn has_device(&self, device: DeviceId) -> bool {
        self.keyboard(device).is_some() || self.pointers.contains(&device)
    }

    pub fn add_keyboard(&mut self, keyboard: Keyboard) {
        self.keyboards.push(keyboard);
    }

    pub fn remove_keyboard(&mut self, device: DeviceId) -> Option<Keyboard> {
        let idx = self.keyboards.iter().position(|k| k.device() == device)?;
        if self.active_keyboard == Some(device) {
            self.active_keyboard = None;
        }
        Some(self.keyboards.remove(idx))
    }

    pub fn keyboard(&self, device: DeviceId) -> Option<&Keyboard> {
        self.keyboards.iter().find(|k| k.device() == device)
    }

    pub fn keyboard_mut(&mut self, device: DeviceId) -> Option<&mut Keyboard> {
        self.keyboards.iter_mut().find(|k| k.device() == device)
    }

    pub fn keyboards(&self) -> impl Iterator<Item = &Keyboard> {
        self.keyboards.iter()
    }

    pub fn active_keyboard(&self) -> Option<&Keyboard> {
        self.active_keyboard.and_then(|device| self.keyboard(device))
    }

    pub fn set_active_keyboard(&mut self, device: DeviceId) {
        self.active_keyboard = Some(device);
    }

    pub fn add_pointer(&mut self, device: DeviceId) {
        self.pointers.push(device);
        self.pointer_seen = true;
    }

    pub fn remove_pointer(&mut self, device: DeviceId) -> bool {
        let len = self.pointers.len();
        self.pointers.retain(|p| *p != device);
        self.pointers.len() != len
    }

    pub fn pointers(&self) -> &[DeviceId] {
        &self.pointers
    }

    /// Surface holding keyboard focus
    pub fn keyboard_focus(&self) -> Option<SurfaceId> {
        self.keyboard_focus
    }

    pub fn set_keyboard_focus(&mut self, surface: Option<SurfaceId>) {
        self.keyboard_focus = surface;
    }

    pub fn pointer_focus(&self) -> Option<PointerFocus> {
        self.pointer_focus
    }

    pub fn set_pointer_focus(&mut self, focus: Option<PointerFocus>) {
        self.pointer_focus = focus;
    }

    /// Client owning the pointer-focused surface
    pub fn pointer_focus_client(&self) -> Option<ClientId> {
        self.pointer_focus.and_then(|focus| focus.client)
    }
}

impl<B: Backend> CompositorState<B> {
    /// A device was plugged in
    pub fn handle_device_added(&mut self, device: DeviceId, kind: DeviceKind) {
        if self.seat.has_device(device) {
            debug!("Device {:?} already attached", device);
            return;
        }

        match kind {
            DeviceKind::Keyboard => {
                let keymap = match self.backend.load_keymap(device, &self.config.keymap) {
                    Ok(keymap) => keymap,
                    Err(err) => {
                        warn!("Failed to set up keyboard {:?}: {}", device, err);
                        return;
                    }
                };
                let (rate, delay) = (self.config.repeat_rate, self.config.repeat_delay);
                self.backend.set_repeat_info(device, rate, delay);
                self.backend.set_keyboard(device);

                self.seat.add_keyboard(Keyboard::new(device, keymap, rate, delay));
                self.seat.set_active_keyboard(device);
                info!("Keyboard {:?} attached", device);
            }
            DeviceKind::Pointer => {
                self.seat.add_pointer(device);
                info!("Pointer {:?} attached", device);
            }
            DeviceKind::Touch | DeviceKind::Other => {
                debug!("Ignoring {:?} device {:?}", kind, device);
            }
        }

        self.update_capabilities();
    }

    /// A device was unplugged
    pub fn handle_device_removed(&mut self, device: DeviceId) {
        if let Some(keyboard) = self.seat.remove_keyboard(device) {
            self.backend.release_keymap(keyboard.keymap());
            info!("Keyboard {:?} detached", device);

            if self.seat.active_keyboard().is_none() {
                let next = self.seat.keyboards().last().map(|k| k.device());
                if let Some(next) = next {
                    self.seat.set_active_keyboard(next);
                    self.backend.set_keyboard(next);
                }
            }
        } else if self.seat.remove_pointer(device) {
            info!("Pointer {:?} detached", device);
        } else {
            debug!("Removal of unknown device {:?}", device);
            return;
        }

        self.update_capabilities();
    }

    fn update_capabilities(&mut self) {
        if let Some(capabilities) = self.seat.update_capabilities() {
            debug!("Seat capabilities now {:?}", capabilities);
            self.backend.set_capabilities(capabilities);
        }
    }
}
