//! View registry
//!
//! Views are the floating toplevel windows. They live in a generational arena
//! owned by the compositor state; the stacking order is a separate deque of
//! handles whose front is the topmost view.

use std::collections::{HashMap, VecDeque};

use log::trace;

use crate::backend::SurfaceBackend;
use crate::compositor::SurfaceId;

/// Generation-checked handle to a view.
///
/// A handle outlives its view safely: once the view is removed the slot's
/// generation moves on and every lookup through the old handle fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId {
    index: u32,
    generation: u32,
}

/// A floating toplevel window
#[derive(Debug, Clone)]
pub struct View {
    /// The toplevel surface, owned by the collaborator
    pub surface: SurfaceId,
    /// Position in desktop coordinates
    pub x: i32,
    pub y: i32,
    /// Participates in hit-testing and rendering
    pub mapped: bool,
    /// Last activation state sent to the surface
    pub activated: bool,
}

impl View {
    /// Create a new unmapped view at the desktop origin
    pub fn new(surface: SurfaceId) -> Self {
        Self {
            surface,
            x: 0,
            y: 0,
            mapped: false,
            activated: false,
        }
    }

    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }
}

/// Result of a successful hit-test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewHit {
    pub view: ViewId,
    /// The surface under the point (the toplevel or one of its children)
    pub surface: SurfaceId,
    /// Point in `surface`-local coordinates
    pub sx: f64,
    pub sy: f64,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    view: Option<View>,
}

/// Ordered collection of views
#[derive(Debug, Default)]
pub struct ViewRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Front is topmost
    stack: VecDeque<ViewId>,
    by_surface: HashMap<SurfaceId, ViewId>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a view on top of the stack
    pub fn insert_front(&mut self, view: View) -> ViewId {
        let surface = view.surface;
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.view = Some(view);
                ViewId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    view: Some(view),
                });
                ViewId {
                    index,
                    generation: 0,
                }
            }
        };

        self.stack.push_front(id);
        self.by_surface.insert(surface, id);
        id
    }

    /// Move a view to the top of the stack.
    ///
    /// Returns `false` if the view was already on top or no longer exists.
    pub fn raise(&mut self, id: ViewId) -> bool {
        if self.stack.front() == Some(&id) {
            return false;
        }
        let Some(pos) = self.stack.iter().position(|v| *v == id) else {
            return false;
        };
        self.stack.remove(pos);
        self.stack.push_front(id);
        trace!("Raised {:?}", id);
        true
    }

    /// Remove a view, invalidating every outstanding handle to it
    pub fn remove(&mut self, id: ViewId) -> Option<View> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let view = slot.view.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        self.stack.retain(|v| *v != id);
        self.by_surface.remove(&view.surface);
        Some(view)
    }

    pub fn get(&self, id: ViewId) -> Option<&View> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.view.as_ref())
    }

    pub fn get_mut(&mut self, id: ViewId) -> Option<&mut View> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.view.as_mut())
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.get(id).is_some()
    }

    /// Look up the view whose toplevel is `surface`
    pub fn find_by_surface(&self, surface: SurfaceId) -> Option<ViewId> {
        self.by_surface.get(&surface).copied()
    }

    /// The topmost view, mapped or not
    pub fn front(&self) -> Option<ViewId> {
        self.stack.front().copied()
    }

    /// Find the topmost mapped view containing the desktop point `(x, y)`
    pub fn hit_test<B>(&self, backend: &B, x: f64, y: f64) -> Option<ViewHit>
    where
        B: SurfaceBackend + ?Sized,
    {
        self.stack.iter().find_map(|&id| {
            let view = self.get(id).filter(|view| view.mapped)?;
            let local_x = x - f64::from(view.x);
            let local_y = y - f64::from(view.y);
            backend
                .surface_at(view.surface, local_x, local_y)
                .map(|(surface, sx, sy)| ViewHit {
                    view: id,
                    surface,
                    sx,
                    sy,
                })
        })
    }

    /// Mapped views, topmost first
    pub fn iter_front_to_back(&self) -> impl Iterator<Item = (ViewId, &View)> + '_ {
        self.stack
            .iter()
            .filter_map(|&id| self.get(id).map(|view| (id, view)))
            .filter(|(_, view)| view.mapped)
    }

    /// Mapped views in paint order, topmost last
    pub fn iter_back_to_front(&self) -> impl Iterator<Item = (ViewId, &View)> + '_ {
        self.stack
            .iter()
            .rev()
            .filter_map(|&id| self.get(id).map(|view| (id, view)))
            .filter(|(_, view)| view.mapped)
    }

    /// Count of views, mapped or not
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;
    use crate::compositor::ClientId;

    fn mapped_view(
        backend: &mut HeadlessBackend,
        registry: &mut ViewRegistry,
        surface: u64,
        x: i32,
        y: i32,
    ) -> ViewId {
        let surface = SurfaceId(surface);
        backend.add_toplevel(surface, ClientId(surface.0), 100, 100);
        let mut view = View::new(surface);
        view.set_position(x, y);
        view.mapped = true;
        registry.insert_front(view)
    }

    #[test]
    fn test_insert_front_is_topmost() {
        let mut backend = HeadlessBackend::new();
        let mut registry = ViewRegistry::new();
        let a = mapped_view(&mut backend, &mut registry, 1, 0, 0);
        let b = mapped_view(&mut backend, &mut registry, 2, 0, 0);
        assert_eq!(registry.front(), Some(b));
        assert_eq!(registry.hit_test(&backend, 5.0, 5.0).unwrap().view, b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_raise() {
        let mut backend = HeadlessBackend::new();
        let mut registry = ViewRegistry::new();
        let a = mapped_view(&mut backend, &mut registry, 1, 0, 0);
        let b = mapped_view(&mut backend, &mut registry, 2, 0, 0);

        assert!(registry.raise(a));
        assert!(!registry.raise(a));
        assert_eq!(registry.front(), Some(a));

        let order: Vec<ViewId> = registry.iter_back_to_front().map(|(id, _)| id).collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn test_hit_test_overlap() {
        let mut backend = HeadlessBackend::new();
        let mut registry = ViewRegistry::new();
        let b = mapped_view(&mut backend, &mut registry, 1, 50, 50);
        let a = mapped_view(&mut backend, &mut registry, 2, 0, 0);

        // Inside both
        let hit = registry.hit_test(&backend, 60.0, 60.0).unwrap();
        assert_eq!(hit.view, a);
        assert_eq!((hit.sx, hit.sy), (60.0, 60.0));

        // Inside only B
        let hit = registry.hit_test(&backend, 120.0, 130.0).unwrap();
        assert_eq!(hit.view, b);
        assert_eq!((hit.sx, hit.sy), (70.0, 80.0));

        // Inside neither
        assert!(registry.hit_test(&backend, 400.0, 400.0).is_none());
    }

    #[test]
    fn test_unmapped_excluded() {
        let mut backend = HeadlessBackend::new();
        let mut registry = ViewRegistry::new();
        let below = mapped_view(&mut backend, &mut registry, 1, 0, 0);
        let top = mapped_view(&mut backend, &mut registry, 2, 0, 0);
        registry.get_mut(top).unwrap().mapped = false;

        assert_eq!(registry.hit_test(&backend, 10.0, 10.0).unwrap().view, below);
        assert_eq!(registry.iter_back_to_front().count(), 1);
        // Still holds its place in the stack
        assert_eq!(registry.front(), Some(top));
    }

    #[test]
    fn test_remove_invalidates_handle() {
        let mut backend = HeadlessBackend::new();
        let mut registry = ViewRegistry::new();
        let a = mapped_view(&mut backend, &mut registry, 1, 0, 0);
        assert!(registry.remove(a).is_some());
        assert!(registry.get(a).is_none());
        assert!(registry.remove(a).is_none());
        assert!(registry.find_by_surface(SurfaceId(1)).is_none());

        // The slot is reused under a new generation
        let b = mapped_view(&mut backend, &mut registry, 2, 0, 0);
        assert_ne!(a, b);
        assert!(registry.get(a).is_none());
        assert!(registry.get(b).is_some());
        assert_eq!(registry.len(), 1);
    }
}
