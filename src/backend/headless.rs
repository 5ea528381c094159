//! Headless backend
//!
//! An in-process collaborator with no display and no devices of its own.
//! Surfaces are plain rectangles registered by the driver, render passes
//! only count frames, and every call can be journaled for inspection.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use log::trace;
use wayland_server::protocol::wl_keyboard::KeyState;
use wayland_server::protocol::wl_pointer::{Axis, AxisSource, ButtonState};
use wayland_server::protocol::wl_seat::Capability;

use super::{BackendError, OutputBackend, SeatBackend, SurfaceBackend};
use crate::compositor::{
    ClientId, DataSourceId, OutputId, OutputMode, Rect, SubSurface, SurfaceId, Transform,
};
use crate::input::{CursorImage, DeviceId, Keymap, KeymapNames, ModifierState};

/// One call made into the backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    SetActivated {
        surface: SurfaceId,
        activated: bool,
    },
    SetSize {
        surface: SurfaceId,
        width: i32,
        height: i32,
    },
    SetCapabilities {
        capabilities: Capability,
    },
    LoadKeymap {
        device: DeviceId,
    },
    ReleaseKeymap {
        keymap: Keymap,
    },
    SetRepeatInfo {
        device: DeviceId,
        rate: i32,
        delay: i32,
    },
    SetKeyboard {
        device: DeviceId,
    },
    KeyboardEnter {
        surface: SurfaceId,
        keycodes: Vec<u32>,
        modifiers: ModifierState,
    },
    KeyboardClearFocus,
    KeyboardKey {
        time: u32,
        keycode: u32,
        state: KeyState,
    },
    KeyboardModifiers {
        modifiers: ModifierState,
    },
    PointerEnter {
        surface: SurfaceId,
        sx: f64,
        sy: f64,
    },
    PointerMotion {
        time: u32,
        sx: f64,
        sy: f64,
    },
    PointerButton {
        time: u32,
        button: u32,
        state: ButtonState,
    },
    PointerAxis {
        time: u32,
        axis: Axis,
        delta: f64,
        delta_discrete: i32,
        source: AxisSource,
    },
    PointerFrame,
    PointerClearFocus,
    SetCursorImage {
        image: CursorImage,
    },
    SetSelection {
        source: Option<DataSourceId>,
        serial: u32,
    },
    SetMode {
        output: OutputId,
        mode: OutputMode,
    },
    Enable {
        output: OutputId,
        enabled: bool,
    },
    Commit {
        output: OutputId,
    },
    BeginRender {
        output: OutputId,
        width: i32,
        height: i32,
    },
    Clear {
        color: [f32; 4],
    },
    RenderSurface {
        surface: SurfaceId,
        dest: Rect,
        transform: Transform,
    },
    FrameDone {
        surface: SurfaceId,
    },
    RenderCursor {
        output: OutputId,
    },
    EndRender,
}

#[derive(Debug, Clone)]
struct HeadlessSurface {
    client: ClientId,
    /// Offset from the parent; zero for toplevels
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    /// Window geometry set by the client, if any
    geometry: Option<Rect>,
    parent: Option<SurfaceId>,
    children: Vec<SurfaceId>,
    has_buffer: bool,
    transform: Transform,
    activated: bool,
    requested_size: Option<(i32, i32)>,
}

impl HeadlessSurface {
    fn new(client: ClientId, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            client,
            x,
            y,
            width,
            height,
            geometry: None,
            parent: None,
            children: Vec::new(),
            has_buffer: false,
            transform: Transform::Normal,
            activated: false,
            requested_size: None,
        }
    }

    fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Backend with no display attached
#[derive(Debug)]
pub struct HeadlessBackend {
    surfaces: HashMap<SurfaceId, HeadlessSurface>,
    capabilities: Capability,
    keymaps: HashSet<Keymap>,
    next_keymap: u64,
    active_keyboard: Option<DeviceId>,
    keyboard_focus: Option<SurfaceId>,
    pointer_focus: Option<SurfaceId>,
    cursor_image: Option<CursorImage>,
    selection: Option<DataSourceId>,
    enabled_outputs: HashSet<OutputId>,
    failing_commits: HashSet<OutputId>,
    failing_renders: HashSet<OutputId>,
    failing_keymaps: bool,
    frames_done: HashMap<SurfaceId, usize>,
    frames_rendered: usize,
    journal: Option<Vec<BackendCall>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            surfaces: HashMap::new(),
            capabilities: Capability::empty(),
            keymaps: HashSet::new(),
            next_keymap: 1,
            active_keyboard: None,
            keyboard_focus: None,
            pointer_focus: None,
            cursor_image: None,
            selection: None,
            enabled_outputs: HashSet::new(),
            failing_commits: HashSet::new(),
            failing_renders: HashSet::new(),
            failing_keymaps: false,
            frames_done: HashMap::new(),
            frames_rendered: 0,
            journal: None,
        }
    }

    /// A backend that records every call it receives
    pub fn with_journal() -> Self {
        Self {
            journal: Some(Vec::new()),
            ..Self::new()
        }
    }

    /// Calls recorded so far; empty without a journal
    pub fn journal(&self) -> &[BackendCall] {
        self.journal.as_deref().unwrap_or(&[])
    }

    pub fn clear_journal(&mut self) {
        if let Some(journal) = &mut self.journal {
            journal.clear();
        }
    }

    fn record(&mut self, call: BackendCall) {
        trace!("Headless: {:?}", call);
        if let Some(journal) = &mut self.journal {
            journal.push(call);
        }
    }

    /// Register a toplevel surface of `width`x`height`
    pub fn add_toplevel(&mut self, surface: SurfaceId, client: ClientId, width: i32, height: i32) {
        self.surfaces
            .insert(surface, HeadlessSurface::new(client, 0, 0, width, height));
    }

    /// Register a child surface at `(x, y)` relative to `parent`, painted
    /// above the existing children
    pub fn add_subsurface(
        &mut self,
        parent: SurfaceId,
        surface: SurfaceId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) {
        let Some(parent_surface) = self.surfaces.get_mut(&parent) else {
            return;
        };
        parent_surface.children.push(surface);
        let mut child = HeadlessSurface::new(parent_surface.client, x, y, width, height);
        child.parent = Some(parent);
        self.surfaces.insert(surface, child);
    }

    /// Forget a surface and its children
    pub fn remove_surface(&mut self, surface: SurfaceId) {
        let Some(removed) = self.surfaces.remove(&surface) else {
            return;
        };
        if let Some(parent) = removed.parent.and_then(|p| self.surfaces.get_mut(&p)) {
            parent.children.retain(|c| *c != surface);
        }
        for child in removed.children {
            self.remove_surface(child);
        }
    }

    /// Set the window geometry, relative to the surface origin
    pub fn set_geometry(&mut self, surface: SurfaceId, geometry: Rect) {
        if let Some(s) = self.surfaces.get_mut(&surface) {
            s.geometry = Some(geometry);
        }
    }

    /// Attach or detach a buffer
    pub fn set_buffer(&mut self, surface: SurfaceId, has_buffer: bool) {
        if let Some(s) = self.surfaces.get_mut(&surface) {
            s.has_buffer = has_buffer;
        }
    }

    pub fn set_transform(&mut self, surface: SurfaceId, transform: Transform) {
        if let Some(s) = self.surfaces.get_mut(&surface) {
            s.transform = transform;
        }
    }

    /// Act like a client that accepted the last requested size
    pub fn ack_size(&mut self, surface: SurfaceId) {
        if let Some(s) = self.surfaces.get_mut(&surface) {
            if let Some((width, height)) = s.requested_size.take() {
                s.width = width;
                s.height = height;
            }
        }
    }

    pub fn is_activated(&self, surface: SurfaceId) -> bool {
        self.surfaces.get(&surface).is_some_and(|s| s.activated)
    }

    pub fn requested_size(&self, surface: SurfaceId) -> Option<(i32, i32)> {
        self.surfaces.get(&surface).and_then(|s| s.requested_size)
    }

    pub fn keyboard_focus(&self) -> Option<SurfaceId> {
        self.keyboard_focus
    }

    pub fn pointer_focus(&self) -> Option<SurfaceId> {
        self.pointer_focus
    }

    pub fn cursor_image(&self) -> Option<&CursorImage> {
        self.cursor_image.as_ref()
    }

    pub fn capabilities(&self) -> Capability {
        self.capabilities
    }

    pub fn selection(&self) -> Option<DataSourceId> {
        self.selection
    }

    pub fn active_keyboard(&self) -> Option<DeviceId> {
        self.active_keyboard
    }

    /// Keymaps handed out and not yet released
    pub fn live_keymaps(&self) -> usize {
        self.keymaps.len()
    }

    /// How many frame-done events `surface` received
    pub fn frames_done(&self, surface: SurfaceId) -> usize {
        self.frames_done.get(&surface).copied().unwrap_or(0)
    }

    /// Completed render passes
    pub fn frames_rendered(&self) -> usize {
        self.frames_rendered
    }

    /// Make every commit on `output` fail
    pub fn fail_commits_on(&mut self, output: OutputId) {
        self.failing_commits.insert(output);
    }

    /// Refuse render passes on `output`
    pub fn fail_renders_on(&mut self, output: OutputId) {
        self.failing_renders.insert(output);
    }

    /// Make keymap compilation fail
    pub fn fail_keymaps(&mut self) {
        self.failing_keymaps = true;
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceBackend for HeadlessBackend {
    fn surface_at(&self, toplevel: SurfaceId, sx: f64, sy: f64) -> Option<(SurfaceId, f64, f64)> {
        let surface = self.surfaces.get(&toplevel)?;
        for child in surface.children.iter().rev() {
            let Some(bounds) = self.surfaces.get(child).map(HeadlessSurface::bounds) else {
                continue;
            };
            if bounds.contains(sx, sy) {
                return Some((*child, sx - f64::from(bounds.x), sy - f64::from(bounds.y)));
            }
        }
        Rect::new(0, 0, surface.width, surface.height)
            .contains(sx, sy)
            .then_some((toplevel, sx, sy))
    }

    fn surface_geometry(&self, toplevel: SurfaceId) -> Rect {
        self.surfaces
            .get(&toplevel)
            .map(|s| {
                s.geometry
                    .unwrap_or_else(|| Rect::new(0, 0, s.width, s.height))
            })
            .unwrap_or_default()
    }

    fn surface_client(&self, surface: SurfaceId) -> Option<ClientId> {
        self.surfaces.get(&surface).map(|s| s.client)
    }

    fn surface_tree(&self, toplevel: SurfaceId) -> Vec<SubSurface> {
        let Some(surface) = self.surfaces.get(&toplevel) else {
            return Vec::new();
        };
        std::iter::once((toplevel, surface))
            .chain(
                surface
                    .children
                    .iter()
                    .filter_map(|c| self.surfaces.get(c).map(|s| (*c, s))),
            )
            .map(|(id, s)| SubSurface {
                surface: id,
                sx: s.x,
                sy: s.y,
                width: s.width,
                height: s.height,
                transform: s.transform,
                has_texture: s.has_buffer,
            })
            .collect()
    }

    fn set_activated(&mut self, toplevel: SurfaceId, activated: bool) {
        if let Some(s) = self.surfaces.get_mut(&toplevel) {
            s.activated = activated;
        }
        self.record(BackendCall::SetActivated {
            surface: toplevel,
            activated,
        });
    }

    fn set_size(&mut self, toplevel: SurfaceId, width: i32, height: i32) {
        if let Some(s) = self.surfaces.get_mut(&toplevel) {
            s.requested_size = Some((width, height));
        }
        self.record(BackendCall::SetSize {
            surface: toplevel,
            width,
            height,
        });
    }
}

impl SeatBackend for HeadlessBackend {
    fn set_capabilities(&mut self, capabilities: Capability) {
        self.capabilities = capabilities;
        self.record(BackendCall::SetCapabilities { capabilities });
    }

    fn load_keymap(
        &mut self,
        device: DeviceId,
        names: &KeymapNames,
    ) -> Result<Keymap, BackendError> {
        self.record(BackendCall::LoadKeymap { device });
        if self.failing_keymaps {
            return Err(BackendError::Keymap(format!(
                "no keymap for layout {:?}",
                names.layout
            )));
        }
        let keymap = Keymap(self.next_keymap);
        self.next_keymap += 1;
        self.keymaps.insert(keymap);
        Ok(keymap)
    }

    fn release_keymap(&mut self, keymap: Keymap) {
        self.keymaps.remove(&keymap);
        self.record(BackendCall::ReleaseKeymap { keymap });
    }

    fn set_repeat_info(&mut self, device: DeviceId, rate: i32, delay: i32) {
        self.record(BackendCall::SetRepeatInfo {
            device,
            rate,
            delay,
        });
    }

    fn set_keyboard(&mut self, device: DeviceId) {
        self.active_keyboard = Some(device);
        self.record(BackendCall::SetKeyboard { device });
    }

    fn keyboard_notify_enter(
        &mut self,
        surface: SurfaceId,
        keycodes: &[u32],
        modifiers: &ModifierState,
    ) {
        self.keyboard_focus = Some(surface);
        self.record(BackendCall::KeyboardEnter {
            surface,
            keycodes: keycodes.to_vec(),
            modifiers: *modifiers,
        });
    }

    fn keyboard_clear_focus(&mut self) {
        self.keyboard_focus = None;
        self.record(BackendCall::KeyboardClearFocus);
    }

    fn keyboard_notify_key(&mut self, time: u32, keycode: u32, state: KeyState) {
        self.record(BackendCall::KeyboardKey {
            time,
            keycode,
            state,
        });
    }

    fn keyboard_notify_modifiers(&mut self, modifiers: &ModifierState) {
        self.record(BackendCall::KeyboardModifiers {
            modifiers: *modifiers,
        });
    }

    fn pointer_notify_enter(&mut self, surface: SurfaceId, sx: f64, sy: f64) {
        self.pointer_focus = Some(surface);
        self.record(BackendCall::PointerEnter { surface, sx, sy });
    }

    fn pointer_notify_motion(&mut self, time: u32, sx: f64, sy: f64) {
        self.record(BackendCall::PointerMotion { time, sx, sy });
    }

    fn pointer_notify_button(&mut self, time: u32, button: u32, state: ButtonState) {
        self.record(BackendCall::PointerButton {
            time,
            button,
            state,
        });
    }

    fn pointer_notify_axis(
        &mut self,
        time: u32,
        axis: Axis,
        delta: f64,
        delta_discrete: i32,
        source: AxisSource,
    ) {
        self.record(BackendCall::PointerAxis {
            time,
            axis,
            delta,
            delta_discrete,
            source,
        });
    }

    fn pointer_notify_frame(&mut self) {
        self.record(BackendCall::PointerFrame);
    }

    fn pointer_clear_focus(&mut self) {
        self.pointer_focus = None;
        self.record(BackendCall::PointerClearFocus);
    }

    fn set_cursor_image(&mut self, image: &CursorImage) {
        self.cursor_image = Some(image.clone());
        self.record(BackendCall::SetCursorImage {
            image: image.clone(),
        });
    }

    fn set_selection(&mut self, source: Option<DataSourceId>, serial: u32) {
        self.selection = source;
        self.record(BackendCall::SetSelection { source, serial });
    }
}

impl OutputBackend for HeadlessBackend {
    fn set_mode(&mut self, output: OutputId, mode: &OutputMode) {
        self.record(BackendCall::SetMode {
            output,
            mode: *mode,
        });
    }

    fn enable(&mut self, output: OutputId, enabled: bool) {
        if enabled {
            self.enabled_outputs.insert(output);
        } else {
            self.enabled_outputs.remove(&output);
        }
        self.record(BackendCall::Enable { output, enabled });
    }

    fn commit(&mut self, output: OutputId) -> Result<(), BackendError> {
        self.record(BackendCall::Commit { output });
        if self.failing_commits.contains(&output) {
            return Err(BackendError::OutputCommit(output));
        }
        Ok(())
    }

    fn begin_render(
        &mut self,
        output: OutputId,
        width: i32,
        height: i32,
    ) -> Result<(), BackendError> {
        if !self.enabled_outputs.contains(&output) {
            return Err(BackendError::UnknownOutput(output));
        }
        if self.failing_renders.contains(&output) {
            return Err(BackendError::RenderUnavailable(output));
        }
        self.record(BackendCall::BeginRender {
            output,
            width,
            height,
        });
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.record(BackendCall::Clear { color });
    }

    fn render_surface(&mut self, surface: SurfaceId, dest: Rect, transform: Transform) {
        self.record(BackendCall::RenderSurface {
            surface,
            dest,
            transform,
        });
    }

    fn send_frame_done(&mut self, surface: SurfaceId, _time: Duration) {
        *self.frames_done.entry(surface).or_insert(0) += 1;
        self.record(BackendCall::FrameDone { surface });
    }

    fn render_cursor(&mut self, output: OutputId) {
        self.record(BackendCall::RenderCursor { output });
    }

    fn end_render(&mut self) {
        self.frames_rendered += 1;
        self.record(BackendCall::EndRender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_at_prefers_topmost_child() {
        let mut backend = HeadlessBackend::new();
        backend.add_toplevel(SurfaceId(1), ClientId(1), 100, 100);
        backend.add_subsurface(SurfaceId(1), SurfaceId(2), 10, 10, 50, 50);
        backend.add_subsurface(SurfaceId(1), SurfaceId(3), 40, 40, 50, 50);

        assert_eq!(
            backend.surface_at(SurfaceId(1), 45.0, 45.0),
            Some((SurfaceId(3), 5.0, 5.0))
        );
        assert_eq!(
            backend.surface_at(SurfaceId(1), 15.0, 20.0),
            Some((SurfaceId(2), 5.0, 10.0))
        );
        assert_eq!(
            backend.surface_at(SurfaceId(1), 5.0, 5.0),
            Some((SurfaceId(1), 5.0, 5.0))
        );
        assert_eq!(backend.surface_at(SurfaceId(1), 100.0, 5.0), None);
        assert_eq!(backend.surface_client(SurfaceId(3)), Some(ClientId(1)));
    }

    #[test]
    fn test_geometry_defaults_to_surface_size() {
        let mut backend = HeadlessBackend::new();
        backend.add_toplevel(SurfaceId(1), ClientId(1), 120, 80);
        assert_eq!(backend.surface_geometry(SurfaceId(1)), Rect::new(0, 0, 120, 80));

        backend.set_geometry(SurfaceId(1), Rect::new(10, 10, 100, 60));
        assert_eq!(backend.surface_geometry(SurfaceId(1)), Rect::new(10, 10, 100, 60));
        assert_eq!(backend.surface_geometry(SurfaceId(9)), Rect::default());
    }

    #[test]
    fn test_ack_size() {
        let mut backend = HeadlessBackend::new();
        backend.add_toplevel(SurfaceId(1), ClientId(1), 100, 100);
        backend.set_size(SurfaceId(1), 200, 150);
        assert_eq!(backend.requested_size(SurfaceId(1)), Some((200, 150)));

        backend.ack_size(SurfaceId(1));
        assert_eq!(backend.requested_size(SurfaceId(1)), None);
        assert_eq!(backend.surface_geometry(SurfaceId(1)), Rect::new(0, 0, 200, 150));
    }

    #[test]
    fn test_remove_surface_drops_children() {
        let mut backend = HeadlessBackend::new();
        backend.add_toplevel(SurfaceId(1), ClientId(1), 100, 100);
        backend.add_subsurface(SurfaceId(1), SurfaceId(2), 0, 0, 10, 10);
        backend.remove_surface(SurfaceId(1));
        assert!(backend.surface_tree(SurfaceId(1)).is_empty());
        assert!(backend.surface_client(SurfaceId(2)).is_none());
    }

    #[test]
    fn test_keymaps_tracked() {
        let mut backend = HeadlessBackend::new();
        let keymap = backend
            .load_keymap(DeviceId(1), &KeymapNames::default())
            .unwrap();
        assert_eq!(backend.live_keymaps(), 1);
        backend.release_keymap(keymap);
        assert_eq!(backend.live_keymaps(), 0);

        backend.fail_keymaps();
        assert!(matches!(
            backend.load_keymap(DeviceId(1), &KeymapNames::default()),
            Err(BackendError::Keymap(_))
        ));
    }

    #[test]
    fn test_journal_only_when_enabled() {
        let mut backend = HeadlessBackend::new();
        backend.pointer_notify_frame();
        assert!(backend.journal().is_empty());

        let mut backend = HeadlessBackend::with_journal();
        backend.pointer_notify_frame();
        assert_eq!(backend.journal(), &[BackendCall::PointerFrame]);
        backend.clear_journal();
        assert!(backend.journal().is_empty());
    }

    #[test]
    fn test_render_requires_enabled_output() {
        let mut backend = HeadlessBackend::new();
        assert_eq!(
            backend.begin_render(OutputId(1), 10, 10),
            Err(BackendError::UnknownOutput(OutputId(1)))
        );
        backend.enable(OutputId(1), true);
        assert!(backend.begin_render(OutputId(1), 10, 10).is_ok());

        backend.fail_renders_on(OutputId(1));
        assert_eq!(
            backend.begin_render(OutputId(1), 10, 10),
            Err(BackendError::RenderUnavailable(OutputId(1)))
        );
    }
}
