//! Grid geometry shared by the sense crates: points, rectangles, compass
//! directions, distance metrics and adjacency rules.
#![forbid(unsafe_code)]

use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

mod direction;
mod distance;
mod rect;

pub use direction::Direction;
pub use distance::{AdjacencyRule, DistanceMetric};
pub use rect::Rect;

/// A cell coordinate on a single z-level. `y` grows towards the south.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn step(self, dir: Direction) -> Point {
        let (dx, dy) = dir.delta();
        Point::new(self.x + dx, self.y + dy)
    }

    #[inline]
    pub fn at_level(self, z: i32) -> Position {
        Position::new(self.x, self.y, z)
    }
}

impl Add for Point {
    type Output = Point;
    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    #[inline]
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;
    #[inline]
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point {
    #[inline]
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Neg for Point {
    type Output = Point;
    #[inline]
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl From<(i32, i32)> for Point {
    #[inline]
    fn from((x, y): (i32, i32)) -> Self {
        Point::new(x, y)
    }
}

/// A cell coordinate including its z-level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn point(self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn point_sub_inverts_add(a: Point, b: Point) {
            prop_assume!(a.x.checked_add(b.x).is_some() && a.y.checked_add(b.y).is_some());
            prop_assert_eq!((a + b) - b, a);
        }
    }

    #[test]
    fn step_follows_direction_delta() {
        let p = Point::new(3, 4);
        assert_eq!(p.step(Direction::North), Point::new(3, 3));
        assert_eq!(p.step(Direction::SouthWest), Point::new(2, 5));
        assert_eq!(p.step(Direction::None), p);
    }

    #[test]
    fn position_roundtrips_point() {
        let pos = Point::new(-2, 7).at_level(3);
        assert_eq!(pos, Position::new(-2, 7, 3));
        assert_eq!(pos.point(), Point::new(-2, 7));
    }
}
