use proptest::prelude::*;
use spoor_geom::{Direction, DistanceMetric, Point, Rect};

fn small_i32() -> impl Strategy<Value = i32> {
    -1_000i32..1_000
}

fn arb_point() -> impl Strategy<Value = Point> {
    (small_i32(), small_i32()).prop_map(|(x, y)| Point::new(x, y))
}

fn arb_rect() -> impl Strategy<Value = Rect> {
    (small_i32(), small_i32(), 0i32..64, 0i32..64).prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    (0u8..=8).prop_map(Direction::from_index)
}

proptest! {
    #[test]
    fn opposite_is_involution(d in arb_direction()) {
        prop_assert_eq!(d.opposite().opposite(), d);
        let (dx, dy) = d.delta();
        let (ox, oy) = d.opposite().delta();
        prop_assert_eq!((dx + ox, dy + oy), (0, 0));
    }

    // Metrics are ordered: chebyshev <= euclidean <= manhattan
    #[test]
    fn metric_ordering(a in arb_point(), b in arb_point()) {
        let c = DistanceMetric::Chebyshev.between(a, b);
        let e = DistanceMetric::Euclidean.between(a, b);
        let m = DistanceMetric::Manhattan.between(a, b);
        prop_assert!(c <= e + 1e-3);
        prop_assert!(e <= m + 1e-3);
    }

    #[test]
    fn metric_symmetry(a in arb_point(), b in arb_point()) {
        for metric in [DistanceMetric::Chebyshev, DistanceMetric::Euclidean, DistanceMetric::Manhattan] {
            prop_assert_eq!(metric.between(a, b), metric.between(b, a));
        }
    }

    #[test]
    fn intersection_is_contained_in_both(a in arb_rect(), b in arb_rect()) {
        if let Some(i) = a.intersect(&b) {
            prop_assert!(i.points().all(|p| a.contains(p) && b.contains(p)));
            prop_assert!(i.area() <= a.area().min(b.area()));
        } else {
            prop_assert!(a.points().all(|p| !b.contains(p)));
        }
    }

    #[test]
    fn union_covers_both(a in arb_rect(), b in arb_rect()) {
        let u = a.union(&b);
        prop_assert!(a.points().chain(b.points()).all(|p| u.contains(p)));
    }

    #[test]
    fn around_contains_radius(c in arb_point(), r in 0i32..20, dx in -20i32..=20, dy in -20i32..=20) {
        let rect = Rect::around(c, r);
        let p = Point::new(c.x + dx, c.y + dy);
        let inside = dx.abs() <= r && dy.abs() <= r;
        prop_assert_eq!(rect.contains(p), inside);
    }
}
