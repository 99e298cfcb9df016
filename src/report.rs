use std::fmt::Write;

use spoor_geom::Rect;
use spoor_grid::SenseChannel;
use spoor_runtime::{AggregatorStats, SenseSystem, TickReport};

const CELL_WIDTH: usize = 6;

fn cell_text(intensity: f32, blocked: bool) -> String {
    if intensity != 0.0 {
        format!("{:>w$.1}", intensity, w = CELL_WIDTH)
    } else if blocked {
        format!("{:>w$}", "#", w = CELL_WIDTH)
    } else {
        format!("{:>w$}", ".", w = CELL_WIDTH)
    }
}

/// Numeric table of the composite on level `z` over `rect`. Blocking
/// cells without signal print as `#`, empty open cells as `.`.
pub fn render_level<S: SenseChannel>(system: &SenseSystem<S>, z: i32, rect: Rect) -> String {
    let mut out = String::new();
    let Some(view) = system.try_get_level(z) else {
        let _ = writeln!(out, "z={}: no active sources", z);
        return out;
    };
    let _ = writeln!(out, "z={} {}x{} at ({}, {})", z, rect.width, rect.height, rect.x, rect.y);
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            let blocked = system.get_resistance(x, y, z) >= 1.0;
            out.push_str(&cell_text(view.intensity(x, y), blocked));
        }
        out.push('\n');
    }
    out
}

pub fn summary(report: &TickReport, stats: &AggregatorStats) -> String {
    format!(
        "tick {}: {} regions, {} recomputed, {} collected, {} levels ({} evicted), {} tiles blitted",
        report.tick,
        report.regions_refreshed,
        report.sources_recomputed,
        report.sources_collected,
        stats.levels,
        stats.levels_evicted,
        stats.tiles_processed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;
    use spoor_grid::Vision;

    #[test]
    fn cells_are_fixed_width() {
        assert_eq!(cell_text(9.0, false), "   9.0");
        assert_eq!(cell_text(-2.5, true), "  -2.5");
        assert_eq!(cell_text(0.0, true), "     #");
        assert_eq!(cell_text(0.0, false), "     .");
    }

    #[test]
    fn corridor_table() {
        let s = Scenario::parse(
            r######"
            [[levels]]
            rows = ["#####", "...##", "#####"]

            [[sources]]
            x = 0
            y = 1
            intensity = 4.0
            "######,
        )
        .unwrap();
        let sim = s.simulate::<Vision>(1).unwrap();
        let table = render_level(&sim.system, 0, s.levels[0].rect());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "z=0 5x3 at (0, 0)");
        assert_eq!(lines[1], "     #     #     #     #     #");
        assert_eq!(lines[2], "   4.0   3.0   2.0     #     #");
        assert_eq!(render_level(&sim.system, 3, Rect::new(0, 0, 1, 1)), "z=3: no active sources\n");
    }
}
