use serde::Deserialize;

use crate::{Direction, Point};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Chebyshev,
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    #[inline]
    pub fn calculate(self, dx: i32, dy: i32) -> f32 {
        let (ax, ay) = (dx.unsigned_abs() as f32, dy.unsigned_abs() as f32);
        match self {
            DistanceMetric::Chebyshev => ax.max(ay),
            DistanceMetric::Euclidean => (ax * ax + ay * ay).sqrt(),
            DistanceMetric::Manhattan => ax + ay,
        }
    }

    #[inline]
    pub fn between(self, a: Point, b: Point) -> f32 {
        self.calculate(b.x - a.x, b.y - a.y)
    }

    /// The adjacency under which this metric's unit steps are natural.
    #[inline]
    pub fn natural_adjacency(self) -> AdjacencyRule {
        match self {
            DistanceMetric::Manhattan => AdjacencyRule::Cardinals,
            DistanceMetric::Chebyshev | DistanceMetric::Euclidean => AdjacencyRule::EightWay,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjacencyRule {
    Cardinals,
    Diagonals,
    #[default]
    EightWay,
}

impl AdjacencyRule {
    /// Neighbour directions in clockwise order starting at north.
    #[inline]
    pub fn directions(self) -> &'static [Direction] {
        match self {
            AdjacencyRule::Cardinals => &Direction::CARDINALS,
            AdjacencyRule::Diagonals => &Direction::DIAGONALS,
            AdjacencyRule::EightWay => &Direction::EIGHT_WAY,
        }
    }

    pub fn neighbors(self, p: Point) -> impl Iterator<Item = (Direction, Point)> {
        self.directions().iter().map(move |&d| (d, p.step(d)))
    }

    #[inline]
    pub fn allows(self, dir: Direction) -> bool {
        match self {
            AdjacencyRule::Cardinals => dir.is_cardinal(),
            AdjacencyRule::Diagonals => dir.is_diagonal(),
            AdjacencyRule::EightWay => dir != Direction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_on_knight_move() {
        assert_eq!(DistanceMetric::Chebyshev.calculate(1, -2), 2.0);
        assert_eq!(DistanceMetric::Manhattan.calculate(1, -2), 3.0);
        let e = DistanceMetric::Euclidean.calculate(1, -2);
        assert!((e - 5f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn adjacency_tables() {
        assert_eq!(AdjacencyRule::Cardinals.directions().len(), 4);
        assert_eq!(AdjacencyRule::EightWay.directions().len(), 8);
        assert!(AdjacencyRule::Diagonals.directions().iter().all(|d| d.is_diagonal()));
        let n: Vec<Point> = AdjacencyRule::Cardinals
            .neighbors(Point::ZERO)
            .map(|(_, p)| p)
            .collect();
        assert_eq!(
            n,
            vec![Point::new(0, -1), Point::new(1, 0), Point::new(0, 1), Point::new(-1, 0)]
        );
    }
}
