//! Height generation and height-driven position assignment.

use rand::Rng;
use roster_core::{Position, HEIGHT_MAX_CM, HEIGHT_MIN_CM};
use std::f64::consts::TAU;

/// Parameters of the approximately normal height draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightModel {
    pub mean: f64,
    pub std_dev: f64,
    pub min_cm: u16,
    pub max_cm: u16,
    /// Upper bound of the uniform integer jitter added after acceptance.
    pub jitter_max: u16,
}

impl HeightModel {
    pub const STANDARD: HeightModel = HeightModel {
        mean: 195.0,
        std_dev: 10.0,
        min_cm: HEIGHT_MIN_CM,
        max_cm: HEIGHT_MAX_CM,
        jitter_max: 10,
    };

    /// Draw a height in `[min_cm, max_cm]`.
    ///
    /// Values of the normal draw outside the range are rejected and redrawn.
    /// An accepted value is rounded, jittered by `0..=jitter_max` and capped
    /// at `max_cm`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u16 {
        let (lo, hi) = (f64::from(self.min_cm), f64::from(self.max_cm));
        loop {
            let height = self.mean + standard_normal(rng) * self.std_dev;
            if (lo..=hi).contains(&height) {
                let jitter = rng.gen_range(0..=self.jitter_max);
                let base = height.round() as u16;
                return base.saturating_add(jitter).min(self.max_cm);
            }
        }
    }
}

impl Default for HeightModel {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// One Box–Muller draw.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // gen::<f64>() yields [0, 1); flipping gives (0, 1] so ln() stays finite.
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = 1.0 - rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Height ranges with their own position table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeightBand {
    /// Below 190 cm
    Under190,
    /// 190–199 cm
    From190,
    /// 200–209 cm
    From200,
    /// 210 cm and up
    From210,
}

const UNDER_190: &[(Position, f64)] = &[(Position::PG, 0.60), (Position::SG, 1.0)];
const FROM_190: &[(Position, f64)] = &[
    (Position::PG, 0.35),
    (Position::SG, 0.80),
    (Position::SF, 1.0),
];
const FROM_200: &[(Position, f64)] = &[
    (Position::PG, 0.05),
    (Position::SG, 0.15),
    (Position::SF, 0.35),
    (Position::PF, 0.85),
    (Position::C, 1.0),
];
const FROM_210: &[(Position, f64)] = &[
    (Position::PG, 0.05),
    (Position::SG, 0.15),
    (Position::SF, 0.25),
    (Position::PF, 0.55),
    (Position::C, 1.0),
];

impl HeightBand {
    pub fn of(height_cm: u16) -> Self {
        match height_cm {
            0..=189 => HeightBand::Under190,
            190..=199 => HeightBand::From190,
            200..=209 => HeightBand::From200,
            _ => HeightBand::From210,
        }
    }

    /// Cumulative thresholds; the last entry is always 1.0.
    pub fn cumulative(self) -> &'static [(Position, f64)] {
        match self {
            HeightBand::Under190 => UNDER_190,
            HeightBand::From190 => FROM_190,
            HeightBand::From200 => FROM_200,
            HeightBand::From210 => FROM_210,
        }
    }

    /// Probability of `position` in this band.
    pub fn probability(self, position: Position) -> f64 {
        let mut previous = 0.0;
        for &(p, threshold) in self.cumulative() {
            if p == position {
                return threshold - previous;
            }
            previous = threshold;
        }
        0.0
    }

    pub fn allows(self, position: Position) -> bool {
        self.cumulative().iter().any(|&(p, _)| p == position)
    }
}

/// Draw a position from the table of the height's band.
pub fn assign_position<R: Rng + ?Sized>(height_cm: u16, rng: &mut R) -> Position {
    let r: f64 = rng.gen();
    position_for_roll(HeightBand::of(height_cm), r)
}

fn position_for_roll(band: HeightBand, r: f64) -> Position {
    let table = band.cumulative();
    table
        .iter()
        .find(|&&(_, threshold)| r < threshold)
        .or_else(|| table.last())
        .map_or(Position::C, |&(p, _)| p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;

    const BANDS: [(HeightBand, u16); 4] = [
        (HeightBand::Under190, 180),
        (HeightBand::From190, 195),
        (HeightBand::From200, 205),
        (HeightBand::From210, 220),
    ];

    #[test]
    fn band_edges() {
        assert_eq!(HeightBand::of(160), HeightBand::Under190);
        assert_eq!(HeightBand::of(189), HeightBand::Under190);
        assert_eq!(HeightBand::of(190), HeightBand::From190);
        assert_eq!(HeightBand::of(199), HeightBand::From190);
        assert_eq!(HeightBand::of(200), HeightBand::From200);
        assert_eq!(HeightBand::of(209), HeightBand::From200);
        assert_eq!(HeightBand::of(210), HeightBand::From210);
        assert_eq!(HeightBand::of(230), HeightBand::From210);
    }

    #[test]
    fn band_tables_agree_with_record_validation() {
        for height in HEIGHT_MIN_CM..=HEIGHT_MAX_CM {
            let band = HeightBand::of(height);
            for p in Position::ALL {
                assert_eq!(band.allows(p), p.fits_height(height), "{p} at {height}cm");
            }
        }
    }

    #[test]
    fn thresholds_are_compared_in_order() {
        assert_eq!(position_for_roll(HeightBand::Under190, 0.0), Position::PG);
        assert_eq!(position_for_roll(HeightBand::Under190, 0.599), Position::PG);
        assert_eq!(position_for_roll(HeightBand::Under190, 0.60), Position::SG);
        assert_eq!(position_for_roll(HeightBand::From200, 0.84), Position::PF);
        assert_eq!(position_for_roll(HeightBand::From200, 0.85), Position::C);
        assert_eq!(position_for_roll(HeightBand::From210, 0.999_999), Position::C);
    }

    #[test]
    fn band_tables_close_at_one() {
        for (band, _) in BANDS {
            let table = band.cumulative();
            assert_eq!(table.last().map(|&(_, t)| t), Some(1.0));
            assert!(table.windows(2).all(|w| w[0].1 < w[1].1));
            let total: f64 = Position::ALL.iter().map(|&p| band.probability(p)).sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn large_sample_matches_band_weights() {
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let n = 100_000u32;
        for (band, height) in BANDS {
            let mut counts: BTreeMap<Position, u32> = BTreeMap::new();
            for _ in 0..n {
                *counts.entry(assign_position(height, &mut rng)).or_default() += 1;
            }
            for p in Position::ALL {
                let observed = f64::from(counts.get(&p).copied().unwrap_or(0)) / f64::from(n);
                let expected = band.probability(p);
                assert!(
                    (observed - expected).abs() < 0.01,
                    "{band:?} {p}: observed {observed}, expected {expected}"
                );
                if expected == 0.0 {
                    assert!(!band.allows(p));
                }
            }
        }
    }

    #[test]
    fn height_mean_is_near_model() {
        // Jitter adds 5 on average on top of a slightly truncated normal.
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let n = 50_000u32;
        let total: u64 = (0..n)
            .map(|_| u64::from(HeightModel::STANDARD.sample(&mut rng)))
            .sum();
        let mean = total as f64 / f64::from(n);
        assert!((198.0..=202.0).contains(&mean), "mean {mean}");
    }

    #[test]
    fn narrow_model_caps_at_max() {
        let model = HeightModel {
            mean: 229.0,
            std_dev: 0.5,
            min_cm: 160,
            max_cm: 230,
            jitter_max: 10,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..1_000 {
            assert!(model.sample(&mut rng) <= 230);
        }
    }

    proptest! {
        #[test]
        fn heights_stay_in_range(seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let h = HeightModel::STANDARD.sample(&mut rng);
            prop_assert!((HEIGHT_MIN_CM..=HEIGHT_MAX_CM).contains(&h));
            let p = assign_position(h, &mut rng);
            prop_assert!(HeightBand::of(h).allows(p));
        }
    }
}
