use std::f32::consts::{FRAC_PI_2, PI};

/// Polynomial atan2 approximation, max error around 1e-4 rad.
#[inline]
pub fn fast_atan2(y: f32, x: f32) -> f32 {
    if x == 0.0 && y == 0.0 {
        return 0.0;
    }
    let ax = x.abs();
    let ay = y.abs();
    let a = ax.min(ay) / ax.max(ay);
    let s = a * a;
    let mut r = ((-0.046_496_473 * s + 0.159_314_22) * s - 0.327_622_76) * s * a + a;
    if ay > ax {
        r = FRAC_PI_2 - r;
    }
    if x < 0.0 {
        r = PI - r;
    }
    if y < 0.0 {
        r = -r;
    }
    r
}

/// Angle of a grid offset in degrees in `[0, 360)`. 0° points east and
/// angles grow towards the south (clockwise on a y-down grid).
#[inline]
pub fn angle_degrees(dx: i32, dy: i32) -> f32 {
    fast_atan2(dy as f32, dx as f32).to_degrees().rem_euclid(360.0)
}
