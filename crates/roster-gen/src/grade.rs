//! Weighted grade selection.

use rand::distributions::Distribution;
use rand::Rng;
use roster_core::Grade;

/// The fixed grade distribution from [`Grade::weight`].
///
/// Sample it with `rng.sample(GradeDistribution)` or [`pick_grade`].
#[derive(Clone, Copy, Debug, Default)]
pub struct GradeDistribution;

impl Distribution<Grade> for GradeDistribution {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Grade {
        let total: f64 = Grade::ALL.iter().map(|g| g.weight()).sum();
        let r = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        for grade in Grade::ALL {
            cumulative += grade.weight();
            if r < cumulative {
                return grade;
            }
        }
        // Only reachable through float rounding at the very top of the range.
        Grade::SSR
    }
}

/// Draw one grade.
pub fn pick_grade<R: Rng + ?Sized>(rng: &mut R) -> Grade {
    GradeDistribution.sample(rng)
}
