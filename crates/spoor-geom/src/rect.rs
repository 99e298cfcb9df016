use crate::Point;

/// Axis-aligned cell rectangle. `width`/`height` of zero mean empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const EMPTY: Rect = Rect {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning `min..=max` on both axes.
    #[inline]
    pub fn from_min_max(min: Point, max: Point) -> Self {
        if max.x < min.x || max.y < min.y {
            return Rect::EMPTY;
        }
        Rect::new(min.x, min.y, max.x - min.x + 1, max.y - min.y + 1)
    }

    /// Square of side `2 * radius + 1` centered on `center`.
    #[inline]
    pub fn around(center: Point, radius: i32) -> Self {
        let r = radius.max(0);
        Rect::new(center.x - r, center.y - r, 2 * r + 1, 2 * r + 1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    #[inline]
    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width as usize * self.height as usize
        }
    }

    #[inline]
    pub fn min(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Inclusive maximum corner.
    #[inline]
    pub fn max(&self) -> Point {
        Point::new(self.x + self.width - 1, self.y + self.height - 1)
    }

    #[inline]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.x + self.width && p.y < self.y + self.height
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        if self.is_empty() || other.is_empty() {
            return None;
        }
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.intersect(other).is_some()
    }

    /// Smallest rectangle covering both; empty inputs are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    #[inline]
    pub fn expand(&self, n: i32) -> Rect {
        if self.is_empty() {
            return *self;
        }
        Rect::new(self.x - n, self.y - n, self.width + 2 * n, self.height + 2 * n)
    }

    /// Row-major iteration over all cells.
    pub fn points(&self) -> impl Iterator<Item = Point> + use<> {
        let r = *self;
        let (w, h) = if r.is_empty() { (0, 0) } else { (r.width, r.height) };
        (0..h).flat_map(move |dy| (0..w).map(move |dx| Point::new(r.x + dx, r.y + dy)))
    }
}
