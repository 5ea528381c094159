//! Keyboard focus
//!
//! At most one view is activated at a time: the one whose toplevel holds the
//! seat's keyboard focus. The old view is always deactivated before the new
//! one is activated.

use log::debug;

use crate::backend::Backend;
use crate::compositor::{CompositorState, ViewId};
use crate::input::ModifierState;

impl<B: Backend> CompositorState<B> {
    /// Give keyboard focus to `view` and raise it, or drop focus with `None`
    pub fn raise_and_activate(&mut self, view: Option<ViewId>) {
        let surface = view.and_then(|id| self.views.get(id)).map(|v| v.surface);
        let previous = self.seat.keyboard_focus();
        if surface == previous {
            return;
        }

        if let Some(previous) = previous {
            if let Some(id) = self.views.find_by_surface(previous) {
                self.backend.set_activated(previous, false);
                if let Some(view) = self.views.get_mut(id) {
                    view.activated = false;
                }
            }
        }

        match (view, surface) {
            (Some(id), Some(surface)) => {
                self.views.raise(id);
                self.backend.set_activated(surface, true);
                if let Some(view) = self.views.get_mut(id) {
                    view.activated = true;
                }

                let (keycodes, modifiers) = match self.seat.active_keyboard() {
                    Some(keyboard) => (keyboard.pressed_keys().to_vec(), keyboard.modifiers()),
                    None => (Vec::new(), ModifierState::default()),
                };
                self.backend
                    .keyboard_notify_enter(surface, &keycodes, &modifiers);
                self.seat.set_keyboard_focus(Some(surface));
                debug!("Keyboard focus on {:?}", surface);
            }
            _ => {
                self.seat.set_keyboard_focus(None);
                self.backend.keyboard_clear_focus();
                debug!("Keyboard focus cleared");
            }
        }
    }

    /// The view holding keyboard focus
    pub fn focused_view(&self) -> Option<ViewId> {
        self.seat
            .keyboard_focus()
            .and_then(|surface| self.views.find_by_surface(surface))
    }

    /// Focus the bottom-most mapped view, bringing it to the top
    pub fn cycle_focus(&mut self) {
        if self.views.iter_back_to_front().nth(1).is_none() {
            return;
        }
        let next = self.views.iter_back_to_front().next().map(|(id, _)| id);
        self.raise_and_activate(next);
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::headless::{BackendCall, HeadlessBackend};
    use crate::compositor::{ClientId, CompositorState, SurfaceId, SurfaceRole};
    use crate::config::Config;

    fn state_with_views(count: u64) -> CompositorState<HeadlessBackend> {
        let mut state = CompositorState::new(Config::default(), HeadlessBackend::with_journal());
        for i in 1..=count {
            let surface = SurfaceId(i);
            state.backend.add_toplevel(surface, ClientId(i), 100, 100);
            state.handle_new_surface(surface, SurfaceRole::XdgToplevel);
            state.handle_map(surface);
        }
        state
    }

    #[test]
    fn test_activation_is_exclusive() {
        let mut state = state_with_views(2);
        let v1 = state.views.find_by_surface(SurfaceId(1)).unwrap();
        let v2 = state.views.find_by_surface(SurfaceId(2)).unwrap();

        state.raise_and_activate(Some(v1));
        state.backend.clear_journal();
        state.raise_and_activate(Some(v2));

        assert!(!state.backend.is_activated(SurfaceId(1)));
        assert!(state.backend.is_activated(SurfaceId(2)));
        assert_eq!(state.focused_view(), Some(v2));

        let activations: Vec<&BackendCall> = state
            .backend
            .journal()
            .iter()
            .filter(|call| matches!(call, BackendCall::SetActivated { .. }))
            .collect();
        assert_eq!(
            activations,
            vec![
                &BackendCall::SetActivated {
                    surface: SurfaceId(1),
                    activated: false
                },
                &BackendCall::SetActivated {
                    surface: SurfaceId(2),
                    activated: true
                },
            ]
        );
    }

    #[test]
    fn test_refocus_is_noop() {
        let mut state = state_with_views(1);
        let v1 = state.views.find_by_surface(SurfaceId(1)).unwrap();
        state.raise_and_activate(Some(v1));
        state.backend.clear_journal();

        state.raise_and_activate(Some(v1));
        assert!(state.backend.journal().is_empty());
    }

    #[test]
    fn test_activate_none_clears_focus() {
        let mut state = state_with_views(1);
        let v1 = state.views.find_by_surface(SurfaceId(1)).unwrap();
        state.raise_and_activate(Some(v1));

        state.raise_and_activate(None);
        assert!(state.focused_view().is_none());
        assert!(!state.backend.is_activated(SurfaceId(1)));
        assert!(!state.views.get(v1).unwrap().activated);
        assert_eq!(state.backend.keyboard_focus(), None);
    }

    #[test]
    fn test_activate_raises() {
        let mut state = state_with_views(2);
        let v1 = state.views.find_by_surface(SurfaceId(1)).unwrap();
        assert_ne!(state.views.front(), Some(v1));

        state.raise_and_activate(Some(v1));
        assert_eq!(state.views.front(), Some(v1));
        assert_eq!(state.backend.keyboard_focus(), Some(SurfaceId(1)));
    }

    #[test]
    fn test_cycle_focus() {
        let mut state = state_with_views(3);
        let v1 = state.views.find_by_surface(SurfaceId(1)).unwrap();
        let v2 = state.views.find_by_surface(SurfaceId(2)).unwrap();

        state.cycle_focus();
        assert_eq!(state.focused_view(), Some(v1));
        assert_eq!(state.views.front(), Some(v1));

        state.cycle_focus();
        assert_eq!(state.focused_view(), Some(v2));
    }

    #[test]
    fn test_cycle_focus_needs_two_views() {
        let mut state = state_with_views(1);
        state.cycle_focus();
        assert!(state.focused_view().is_none());
    }
}
