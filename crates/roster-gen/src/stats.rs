//! Stat allocation for both stat groups.
//!
//! Untrainable stats are steered toward a random target sum inside the
//! grade's range by small random increments, then nudged back into range.
//! The procedure is a bounded heuristic: when per-stat bounds cannot reach
//! the range, the result stays as close as the bounds allow.

use rand::Rng;
use roster_core::{
    Grade, GradeRule, TrainableStats, UntrainableStats, STATS_PER_GROUP, STAT_MAX, STAT_MIN,
};
use tracing::trace;

/// Largest single increment handed to one stat per allocation step.
const MAX_STEP: u32 = 3;

/// Allocate untrainable stats for `grade`.
pub fn allocate_untrainable<R: Rng + ?Sized>(grade: Grade, rng: &mut R) -> UntrainableStats {
    allocate_for_rule(&grade.rule(), rng)
}

/// Allocate untrainable stats against an explicit rule.
///
/// Every stat starts at `stat_min`. A target is drawn from
/// `[sum_min, sum_max]`; if the floors already reach it they are returned
/// unchanged. Otherwise increments of 1..=3 go to uniformly chosen stats
/// with headroom until the target is met or every stat sits at
/// `stat_max`, after which [`correct_into_range`] runs.
pub fn allocate_for_rule<R: Rng + ?Sized>(rule: &GradeRule, rng: &mut R) -> UntrainableStats {
    let mut stats = [rule.stat_min; STATS_PER_GROUP];
    let floor_sum = total(&stats);
    let target = rng.gen_range(rule.sum_min..=rule.sum_max);
    if floor_sum >= target {
        trace!(floor_sum, target, "floors already reach target");
        return UntrainableStats::from_array(stats);
    }

    let mut remaining = target - floor_sum;
    let mut open: Vec<usize> = (0..STATS_PER_GROUP)
        .filter(|&i| stats[i] < rule.stat_max)
        .collect();
    while remaining > 0 && !open.is_empty() {
        let slot = rng.gen_range(0..open.len());
        let i = open[slot];
        let headroom = u32::from(rule.stat_max - stats[i]);
        let step = rng.gen_range(1..=MAX_STEP).min(headroom).min(remaining);
        stats[i] += step as u8;
        remaining -= step;
        if stats[i] >= rule.stat_max {
            open.swap_remove(slot);
        }
    }

    correct_into_range(&mut stats, rule);
    UntrainableStats::from_array(stats)
}

/// Greedy fix-up in field order: raise toward `sum_min` or lower toward
/// `sum_max`, never crossing a stat's own bounds.
pub fn correct_into_range(stats: &mut [u8; STATS_PER_GROUP], rule: &GradeRule) {
    let sum = total(stats);
    if sum < rule.sum_min {
        let mut short = rule.sum_min - sum;
        for v in stats.iter_mut() {
            if short == 0 {
                break;
            }
            let add = u32::from(rule.stat_max.saturating_sub(*v)).min(short);
            *v += add as u8;
            short -= add;
        }
        if short > 0 {
            trace!(short, "allocation ends below sum_min");
        }
    } else if sum > rule.sum_max {
        let mut over = sum - rule.sum_max;
        for v in stats.iter_mut() {
            if over == 0 {
                break;
            }
            let sub = u32::from(v.saturating_sub(rule.stat_min)).min(over);
            *v -= sub as u8;
            over -= sub;
        }
        if over > 0 {
            trace!(over, "allocation ends above sum_max");
        }
    }
}

/// Ten independent uniform draws over `[1, 99]`.
pub fn sample_trainable<R: Rng + ?Sized>(rng: &mut R) -> TrainableStats {
    let mut values = [STAT_MIN; STATS_PER_GROUP];
    for v in values.iter_mut() {
        *v = rng.gen_range(STAT_MIN..=STAT_MAX);
    }
    TrainableStats::from_array(values)
}

fn total(stats: &[u8; STATS_PER_GROUP]) -> u32 {
    stats.iter().map(|&v| u32::from(v)).sum()
}
