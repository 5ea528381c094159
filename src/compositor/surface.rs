//! Surface handles and geometry
//!
//! Surfaces belong to the display collaborator. The core only ever holds
//! their opaque handles, plus the small geometry types shared by hit-testing,
//! grabs and rendering.

/// Opaque handle to a collaborator-owned `wl_surface`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Opaque handle to a connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

/// Opaque handle to a clipboard data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataSourceId(pub u64);

/// Surface role determines whether a surface becomes a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceRole {
    /// No role assigned yet
    #[default]
    None,
    /// XDG toplevel window
    XdgToplevel,
    /// XDG popup
    XdgPopup,
    /// Subsurface
    Subsurface,
    /// Cursor surface
    Cursor,
}

/// An integer rectangle in some coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Offset the rectangle by `(dx, dy)`
    pub fn translated(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    /// Whether the point lies inside (right/bottom edges exclusive)
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= f64::from(self.x)
            && y >= f64::from(self.y)
            && x < f64::from(self.x + self.width)
            && y < f64::from(self.y + self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Buffer or output transform (rotation/flip)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transform {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    Flipped,
    Flipped90,
    Flipped180,
    Flipped270,
}

impl Transform {
    /// The transform that undoes this one.
    ///
    /// Plain 90/270 rotations swap; every other transform is its own inverse.
    pub fn invert(self) -> Self {
        match self {
            Transform::Rotate90 => Transform::Rotate270,
            Transform::Rotate270 => Transform::Rotate90,
            other => other,
        }
    }

    /// Whether width and height swap under this transform
    pub fn swaps_axes(&self) -> bool {
        matches!(
            self,
            Transform::Rotate90
                | Transform::Rotate270
                | Transform::Flipped90
                | Transform::Flipped270
        )
    }
}

/// A renderable surface within a view's surface tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubSurface {
    pub surface: SurfaceId,
    /// Offset from the view origin
    pub sx: i32,
    pub sy: i32,
    /// Current size in surface-local units
    pub width: i32,
    pub height: i32,
    /// Buffer transform set by the client
    pub transform: Transform,
    /// Whether a texture is available for this commit
    pub has_texture: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains() {
        let rect = Rect::new(10, 10, 100, 100);
        assert!(rect.contains(10.0, 10.0));
        assert!(rect.contains(109.5, 50.0));
        assert!(!rect.contains(110.0, 50.0));
        assert!(!rect.contains(9.9, 50.0));
    }

    #[test]
    fn test_transform_invert() {
        assert_eq!(Transform::Rotate90.invert(), Transform::Rotate270);
        assert_eq!(Transform::Rotate270.invert(), Transform::Rotate90);
        assert_eq!(Transform::Flipped90.invert(), Transform::Flipped90);
        assert_eq!(Transform::Normal.invert(), Transform::Normal);
    }

    #[test]
    fn test_transform_swaps_axes() {
        assert!(Transform::Rotate90.swaps_axes());
        assert!(!Transform::Rotate180.swaps_axes());
    }
}
