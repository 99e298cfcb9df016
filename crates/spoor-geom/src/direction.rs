/// Compass directions on a y-down grid. `None` marks "no direction", e.g.
/// the origin cell of a propagated field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Direction {
    #[default]
    None = 0,
    North = 1,
    NorthEast = 2,
    East = 3,
    SouthEast = 4,
    South = 5,
    SouthWest = 6,
    West = 7,
    NorthWest = 8,
}

// Indexed by `Direction as usize`.
const DELTAS: [(i32, i32); 9] = [
    (0, 0),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

// Indexed by (dy + 1) * 3 + (dx + 1).
const FROM_DELTA: [Direction; 9] = [
    Direction::NorthWest,
    Direction::North,
    Direction::NorthEast,
    Direction::West,
    Direction::None,
    Direction::East,
    Direction::SouthWest,
    Direction::South,
    Direction::SouthEast,
];

impl Direction {
    /// The eight compass directions, clockwise from north.
    pub const EIGHT_WAY: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];
    pub const CARDINALS: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];
    pub const DIAGONALS: [Direction; 4] = [
        Direction::NorthEast,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::NorthWest,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn from_index(idx: u8) -> Direction {
        match idx {
            1 => Direction::North,
            2 => Direction::NorthEast,
            3 => Direction::East,
            4 => Direction::SouthEast,
            5 => Direction::South,
            6 => Direction::SouthWest,
            7 => Direction::West,
            8 => Direction::NorthWest,
            _ => Direction::None,
        }
    }

    #[inline]
    pub const fn delta(self) -> (i32, i32) {
        DELTAS[self as usize]
    }

    /// Maps any delta onto the direction of its signs; `(0, 0)` maps to `None`.
    #[inline]
    pub fn from_delta(dx: i32, dy: i32) -> Direction {
        let ix = (dx.signum() + 1) as usize;
        let iy = (dy.signum() + 1) as usize;
        FROM_DELTA[iy * 3 + ix]
    }

    #[inline]
    pub fn opposite(self) -> Direction {
        let (dx, dy) = self.delta();
        Direction::from_delta(-dx, -dy)
    }

    #[inline]
    pub fn rotate_cw(self) -> Direction {
        match self {
            Direction::None => Direction::None,
            Direction::NorthWest => Direction::North,
            d => Direction::from_index(d as u8 + 1),
        }
    }

    #[inline]
    pub fn is_cardinal(self) -> bool {
        matches!(
            self,
            Direction::North | Direction::East | Direction::South | Direction::West
        )
    }

    #[inline]
    pub fn is_diagonal(self) -> bool {
        matches!(
            self,
            Direction::NorthEast
                | Direction::SouthEast
                | Direction::SouthWest
                | Direction::NorthWest
        )
    }

    /// Bit position used by 8-bit direction masks; `None` has no bit.
    #[inline]
    pub fn bit(self) -> Option<u8> {
        match self {
            Direction::None => None,
            d => Some(d as u8 - 1),
        }
    }

    /// The two cardinal components of a diagonal, e.g. `NorthEast` →
    /// `(North, East)`. Cardinals and `None` return `None`.
    #[inline]
    pub fn components(self) -> Option<(Direction, Direction)> {
        let (dx, dy) = self.delta();
        if dx == 0 || dy == 0 {
            return None;
        }
        Some((Direction::from_delta(0, dy), Direction::from_delta(dx, 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_roundtrip_for_all_directions() {
        for d in Direction::EIGHT_WAY {
            let (dx, dy) = d.delta();
            assert_eq!(Direction::from_delta(dx, dy), d);
        }
        assert_eq!(Direction::from_delta(0, 0), Direction::None);
        assert_eq!(Direction::from_delta(5, -9), Direction::NorthEast);
    }

    #[test]
    fn rotate_cw_cycles_through_eight() {
        let mut d = Direction::North;
        for expected in Direction::EIGHT_WAY {
            assert_eq!(d, expected);
            d = d.rotate_cw();
        }
        assert_eq!(d, Direction::North);
    }

    #[test]
    fn diagonal_components() {
        assert_eq!(
            Direction::SouthWest.components(),
            Some((Direction::South, Direction::West))
        );
        assert_eq!(Direction::East.components(), None);
    }
}
