//! Archive priority of a destination directory.

use crate::phase::Phase;

/// (threshold in GB, bonus once free space drops below it)
const FULLNESS_STEPS: &[(f64, i64)] = &[
    (250.0, 10),
    (110.0, 1_000),
    (50.0, 10_000),
    (25.0, 100_000),
    (12.0, 1_000_000),
    (6.0, 10_000_000),
    (3.0, 100_000_000),
];

/// Scores how urgently a destination directory should be drained.
///
/// Every fullness threshold dominates everything below it, so a nearly full
/// drive always wins over phase penalties and plot counts. Directories about
/// to receive a finished plot (late phase 3 and beyond) are penalized to
/// avoid concurrent I/O; an unknown phase is not penalized. The plot count
/// breaks remaining ties.
pub fn compute_priority(phase: Phase, gb_free: f64, plot_count: usize) -> i64 {
    let mut priority: i64 = 50;

    if phase.is_known() {
        if phase == Phase::new(3, 4) {
            priority -= 4;
        } else if phase == Phase::new(3, 5) {
            priority -= 8;
        } else if phase == Phase::new(3, 6) {
            priority -= 16;
        } else if phase >= Phase::new(3, 7) {
            priority -= 32;
        }
    }

    if gb_free < 1000.0 {
        priority += 1 + ((1000.0 - gb_free) / 100.0) as i64;
    }
    if gb_free < 500.0 {
        priority += 1 + ((500.0 - gb_free) / 100.0) as i64;
    }
    for &(threshold, bonus) in FULLNESS_STEPS {
        if gb_free < threshold {
            priority += bonus;
        }
    }
    if gb_free == 0.0 {
        priority += 1_000_000_000;
    }

    priority + plot_count as i64
}
