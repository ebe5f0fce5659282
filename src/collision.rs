use crate::position::Position;

/// Collision test between an entity and another entity or position.
pub trait CollidesWith<T: ?Sized> {
    fn collides_with(&self, other: &T) -> bool;
}

impl CollidesWith<Position> for Position {
    fn collides_with(&self, other: &Position) -> bool {
        self == other
    }
}

/// Axis-aligned bounding rectangle over a set of positions.
///
/// `width` and `height` are extents (`max - min`), so a single cell has a
/// box of width and height 0 and every edge is inclusive. Extents are
/// unsigned so that any pair of `i32` coordinates fits.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CollisionBox {
    pub origin: Position,
    pub width: u32,
    pub height: u32,
}

impl CollisionBox {
    /// Computes the bounding box of `positions`, or `None` when empty.
    #[must_use]
    pub fn from_positions<'a, I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Position>,
    {
        let mut iter = positions.into_iter();
        let first = *iter.next()?;
        let (mut min, mut max) = (first, first);

        for position in iter {
            min.x = min.x.min(position.x);
            min.y = min.y.min(position.y);
            max.x = max.x.max(position.x);
            max.y = max.y.max(position.y);
        }

        Some(Self {
            origin: min,
            width: max.x.abs_diff(min.x),
            height: max.y.abs_diff(min.y),
        })
    }

    #[must_use]
    pub fn right(self) -> i32 {
        self.origin.x.saturating_add_unsigned(self.width)
    }

    #[must_use]
    pub fn bottom(self) -> i32 {
        self.origin.y.saturating_add_unsigned(self.height)
    }

    /// Returns true when `position` lies on or inside the box edges.
    #[must_use]
    pub fn contains(self, position: Position) -> bool {
        position.x >= self.origin.x
            && position.x <= self.right()
            && position.y >= self.origin.y
            && position.y <= self.bottom()
    }

    #[must_use]
    pub fn intersects(self, other: CollisionBox) -> bool {
        self.origin.x <= other.right()
            && other.origin.x <= self.right()
            && self.origin.y <= other.bottom()
            && other.origin.y <= self.bottom()
    }
}
