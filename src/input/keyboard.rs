//! Keyboard handling
//!
//! Keymap compilation belongs to the collaborator; a keyboard only keeps the
//! handle it got back, its pressed keys and the last modifier state.

use std::collections::HashSet;

use log::{debug, info, warn};
use wayland_server::protocol::wl_keyboard::KeyState;
use xkbcommon::xkb::keysyms;

use super::DeviceId;
use crate::backend::Backend;
use crate::compositor::CompositorState;

/// Compositor actions bound to modifier + key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Quit,
    CycleFocus,
}

impl KeyAction {
    #[allow(non_upper_case_globals)]
    fn for_keysym(keysym: u32) -> Option<Self> {
        match keysym {
            keysyms::KEY_Escape => Some(Self::Quit),
            keysyms::KEY_F1 => Some(Self::CycleFocus),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Effective modifier mask, in xkb modifier index order
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const CAPS = 1 << 1;
        const CTRL = 1 << 2;
        const ALT = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const LOGO = 1 << 6;
        const MOD5 = 1 << 7;
    }
}

/// Keyboard modifier state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    /// Depressed modifiers (currently held down)
    pub depressed: u32,
    /// Latched modifiers (sticky, cleared on next key)
    pub latched: u32,
    /// Locked modifiers (toggled, like caps lock)
    pub locked: u32,
    /// Keyboard group/layout
    pub group: u32,
}

impl ModifierState {
    /// All modifiers currently in effect
    pub fn effective(&self) -> Modifiers {
        Modifiers::from_bits_truncate(self.depressed | self.latched | self.locked)
    }
}

/// XKB rule names, passed to the keymap compiler untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeymapNames {
    pub rules: Option<String>,
    pub model: Option<String>,
    pub layout: Option<String>,
    pub variant: Option<String>,
    pub options: Option<String>,
}

impl KeymapNames {
    /// Read the `XKB_DEFAULT_*` variables through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            rules: lookup("XKB_DEFAULT_RULES"),
            model: lookup("XKB_DEFAULT_MODEL"),
            layout: lookup("XKB_DEFAULT_LAYOUT"),
            variant: lookup("XKB_DEFAULT_VARIANT"),
            options: lookup("XKB_DEFAULT_OPTIONS"),
        }
    }
}

/// Handle to a keymap compiled by the collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keymap(pub u64);

/// An attached keyboard device
#[derive(Debug)]
pub struct Keyboard {
    device: DeviceId,
    /// Released when the keyboard goes away
    keymap: Keymap,
    /// Currently pressed keys (keycodes)
    pressed_keys: Vec<u32>,
    /// Presses eaten by a binding; their releases are eaten too
    consumed: HashSet<u32>,
    /// Modifier state
    modifiers: ModifierState,
    /// Repeat rate (characters per second)
    repeat_rate: i32,
    /// Repeat delay (milliseconds)
    repeat_delay: i32,
}

impl Keyboard {
    pub fn new(device: DeviceId, keymap: Keymap, repeat_rate: i32, repeat_delay: i32) -> Self {
        Self {
            device,
            keymap,
            pressed_keys: Vec::new(),
            consumed: HashSet::new(),
            modifiers: ModifierState::default(),
            repeat_rate,
            repeat_delay,
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn keymap(&self) -> Keymap {
        self.keymap
    }

    /// Handle a key press
    pub fn key_press(&mut self, keycode: u32) -> bool {
        if !self.pressed_keys.contains(&keycode) {
            self.pressed_keys.push(keycode);
            true
        } else {
            false // Key already pressed (repeat)
        }
    }

    /// Handle a key release
    pub fn key_release(&mut self, keycode: u32) -> bool {
        if let Some(idx) = self.pressed_keys.iter().position(|&k| k == keycode) {
            self.pressed_keys.remove(idx);
            true
        } else {
            false
        }
    }

    /// Mark a pressed key as taken by the compositor
    pub fn consume(&mut self, keycode: u32) {
        self.key_release(keycode);
        self.consumed.insert(keycode);
    }

    /// Forget a consumed key on release; true if it was consumed
    pub fn release_consumed(&mut self, keycode: u32) -> bool {
        self.consumed.remove(&keycode)
    }

    /// Update modifier state
    pub fn update_modifiers(&mut self, modifiers: ModifierState) {
        self.modifiers = modifiers;
    }

    /// Get current modifier state
    pub fn modifiers(&self) -> ModifierState {
        self.modifiers
    }

    /// Get currently pressed keys
    pub fn pressed_keys(&self) -> &[u32] {
        &self.pressed_keys
    }

    /// Get repeat info
    pub fn repeat_info(&self) -> (i32, i32) {
        (self.repeat_rate, self.repeat_delay)
    }
}

impl<B: Backend> CompositorState<B> {
    /// Key press or release from `device`.
    ///
    /// With the compositor modifier held, presses go to the bindings first;
    /// anything not bound is forwarded to the focused client. A bound press
    /// never reaches the client, and neither does its release.
    pub fn handle_keyboard_key(
        &mut self,
        device: DeviceId,
        time: u32,
        keycode: u32,
        state: KeyState,
        keysyms: &[u32],
    ) {
        let mod_key = self.config.mod_key;
        let Some(keyboard) = self.seat.keyboard_mut(device) else {
            warn!("Key event from unknown keyboard {:?}", device);
            return;
        };

        let actions: Vec<KeyAction> = if state == KeyState::Pressed {
            let bound: Vec<KeyAction> = if keyboard.modifiers().effective().contains(mod_key) {
                keysyms.iter().filter_map(|&sym| KeyAction::for_keysym(sym)).collect()
            } else {
                Vec::new()
            };
            if bound.is_empty() {
                keyboard.key_press(keycode);
            } else {
                keyboard.consume(keycode);
            }
            bound
        } else {
            if keyboard.release_consumed(keycode) {
                debug!("Swallowing release of bound key {}", keycode);
                return;
            }
            keyboard.key_release(keycode);
            Vec::new()
        };

        if actions.is_empty() {
            self.seat.set_active_keyboard(device);
            self.backend.set_keyboard(device);
            self.backend.keyboard_notify_key(time, keycode, state);
            return;
        }
        for action in actions {
            self.run_key_action(action);
        }
    }

    /// Modifier change from `device`; it becomes the seat keyboard
    pub fn handle_keyboard_modifiers(&mut self, device: DeviceId, modifiers: ModifierState) {
        let Some(keyboard) = self.seat.keyboard_mut(device) else {
            warn!("Modifier event from unknown keyboard {:?}", device);
            return;
        };
        keyboard.update_modifiers(modifiers);

        self.seat.set_active_keyboard(device);
        self.backend.set_keyboard(device);
        self.backend.keyboard_notify_modifiers(&modifiers);
    }

    fn run_key_action(&mut self, action: KeyAction) {
        match action {
            KeyAction::Quit => {
                info!("Quit requested from keyboard");
                self.stop();
            }
            KeyAction::CycleFocus => {
                debug!("Cycling focus");
                self.cycle_focus();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{BackendCall, HeadlessBackend};
    use crate::compositor::{ClientId, SurfaceId, SurfaceRole};
    use crate::config::Config;
    use crate::input::DeviceKind;

    fn state_with_keyboards(devices: &[u64]) -> CompositorState<HeadlessBackend> {
        let mut state = CompositorState::new(Config::default(), HeadlessBackend::with_journal());
        for &device in devices {
            state.handle_device_added(DeviceId(device), DeviceKind::Keyboard);
        }
        state
    }

    fn add_view(state: &mut CompositorState<HeadlessBackend>, surface: u64) {
        let surface = SurfaceId(surface);
        state.backend.add_toplevel(surface, ClientId(surface.0), 100, 100);
        state.handle_new_surface(surface, SurfaceRole::XdgToplevel);
        state.handle_map(surface);
    }

    fn hold_logo(state: &mut CompositorState<HeadlessBackend>, device: u64) {
        state.handle_keyboard_modifiers(
            DeviceId(device),
            ModifierState {
                depressed: Modifiers::LOGO.bits(),
                ..Default::default()
            },
        );
    }

    #[test]
    fn test_key_press_release() {
        let mut keyboard = Keyboard::new(DeviceId(1), Keymap(1), 25, 600);

        // Press a key
        assert!(keyboard.key_press(30)); // 'A' key
        assert!(keyboard.pressed_keys().contains(&30));

        // Press same key again should return false (already pressed)
        assert!(!keyboard.key_press(30));

        // Release the key
        assert!(keyboard.key_release(30));
        assert!(!keyboard.pressed_keys().contains(&30));

        // Release again should return false
        assert!(!keyboard.key_release(30));
    }

    #[test]
    fn test_effective_modifiers() {
        let mods = ModifierState {
            depressed: Modifiers::LOGO.bits(),
            latched: 0,
            locked: Modifiers::CAPS.bits(),
            group: 0,
        };
        assert!(mods.effective().contains(Modifiers::LOGO));
        assert!(mods.effective().contains(Modifiers::CAPS));
        assert!(!mods.effective().contains(Modifiers::ALT));
    }

    #[test]
    fn test_keymap_names_from_lookup() {
        let names = KeymapNames::from_lookup(|key| match key {
            "XKB_DEFAULT_LAYOUT" => Some("de".to_string()),
            "XKB_DEFAULT_OPTIONS" => Some("caps:escape".to_string()),
            _ => None,
        });
        assert_eq!(names.layout.as_deref(), Some("de"));
        assert_eq!(names.options.as_deref(), Some("caps:escape"));
        assert!(names.rules.is_none());
    }

    #[test]
    fn test_repeat_info() {
        let keyboard = Keyboard::new(DeviceId(1), Keymap(1), 30, 500);
        assert_eq!(keyboard.repeat_info(), (30, 500));
    }

    #[test]
    fn test_consume_hides_key() {
        let mut keyboard = Keyboard::new(DeviceId(1), Keymap(1), 25, 600);
        keyboard.key_press(59);
        keyboard.consume(59);
        assert!(keyboard.pressed_keys().is_empty());

        assert!(keyboard.release_consumed(59));
        assert!(!keyboard.release_consumed(59));
    }

    #[test]
    fn test_bound_key_release_swallowed() {
        let mut state = state_with_keyboards(&[1]);
        add_view(&mut state, 1);
        add_view(&mut state, 2);
        hold_logo(&mut state, 1);
        state.backend.clear_journal();

        state.handle_keyboard_key(DeviceId(1), 0, 59, KeyState::Pressed, &[keysyms::KEY_F1]);
        state.handle_keyboard_key(DeviceId(1), 1, 59, KeyState::Released, &[keysyms::KEY_F1]);

        let journal = state.backend.journal();
        assert!(journal.contains(&BackendCall::KeyboardEnter {
            surface: SurfaceId(1),
            keycodes: vec![],
            modifiers: ModifierState {
                depressed: Modifiers::LOGO.bits(),
                ..Default::default()
            },
        }));
        assert!(!journal
            .iter()
            .any(|call| matches!(call, BackendCall::KeyboardKey { .. })));
        assert!(state.seat.keyboard(DeviceId(1)).unwrap().pressed_keys().is_empty());

        // The next press of the same key without the modifier is delivered
        state.handle_keyboard_modifiers(DeviceId(1), ModifierState::default());
        state.handle_keyboard_key(DeviceId(1), 2, 59, KeyState::Pressed, &[keysyms::KEY_F1]);
        state.handle_keyboard_key(DeviceId(1), 3, 59, KeyState::Released, &[keysyms::KEY_F1]);
        let keys: Vec<(u32, KeyState)> = state
            .backend
            .journal()
            .iter()
            .filter_map(|call| match call {
                BackendCall::KeyboardKey { time, state, .. } => Some((*time, *state)),
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec![(2, KeyState::Pressed), (3, KeyState::Released)]);
    }

    #[test]
    fn test_unbound_key_with_modifier_forwarded() {
        let mut state = state_with_keyboards(&[1]);
        hold_logo(&mut state, 1);
        state.backend.clear_journal();

        state.handle_keyboard_key(DeviceId(1), 0, 30, KeyState::Pressed, &[keysyms::KEY_a]);
        assert_eq!(
            state.backend.journal().last(),
            Some(&BackendCall::KeyboardKey {
                time: 0,
                keycode: 30,
                state: KeyState::Pressed,
            })
        );
        assert_eq!(state.seat.keyboard(DeviceId(1)).unwrap().pressed_keys(), &[30]);
    }

    #[test]
    fn test_modifiers_forwarded_and_switch_keyboard() {
        let mut state = state_with_keyboards(&[1, 2]);
        assert_eq!(state.backend.active_keyboard(), Some(DeviceId(2)));
        state.backend.clear_journal();

        let modifiers = ModifierState {
            depressed: Modifiers::CTRL.bits(),
            locked: Modifiers::CAPS.bits(),
            ..Default::default()
        };
        state.handle_keyboard_modifiers(DeviceId(1), modifiers);

        assert_eq!(
            state.backend.journal(),
            &[
                BackendCall::SetKeyboard { device: DeviceId(1) },
                BackendCall::KeyboardModifiers { modifiers },
            ]
        );
        assert_eq!(state.backend.active_keyboard(), Some(DeviceId(1)));
        assert_eq!(
            state.seat.active_keyboard().map(|k| k.device()),
            Some(DeviceId(1))
        );
        assert_eq!(state.seat.keyboard(DeviceId(1)).unwrap().modifiers(), modifiers);

        // Unknown devices change nothing
        state.backend.clear_journal();
        state.handle_keyboard_modifiers(DeviceId(9), modifiers);
        assert!(state.backend.journal().is_empty());
    }
}
