#![deny(warnings)]

//! Calibration reporter: runs the player generator many times and tabulates
//! grade, stat-total, height and position distributions.

use chrono::{SubsecRound, Utc};
use rand::Rng;
use roster_core::{Grade, NamePool, PlayerRecord, Position, ValidationError};
use roster_gen::generate_player;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Owner id stamped on simulated players; they are never persisted.
const SIMULATION_OWNER: i64 = 0;
/// Totals below this share one bucket.
const TOTAL_FLOOR: u32 = 1000;
const TOTAL_BUCKET_WIDTH: u32 = 100;
/// Non-zero digits kept by [`format_percentage`].
const SIGNIFICANT_DIGITS: usize = 3;

// ── Sections ────────────────────────────────────────────────────────

/// Which tables a run collects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ReportSections {
    pub overall: bool,
    pub total: bool,
    pub height_position: bool,
}

impl ReportSections {
    pub const ALL: ReportSections = ReportSections {
        overall: true,
        total: true,
        height_position: true,
    };

    /// Sections selected by `--only-*` flags. No flag means every section;
    /// each set flag enables its own section.
    pub fn from_only_flags(
        only_height_position: bool,
        only_overall: bool,
        only_total: bool,
    ) -> Self {
        Self {
            overall: !(only_height_position || only_total) || only_overall,
            total: !(only_height_position || only_overall) || only_total,
            height_position: !(only_overall || only_total) || only_height_position,
        }
    }
}

impl Default for ReportSections {
    fn default() -> Self {
        Self::ALL
    }
}

// ── Buckets ─────────────────────────────────────────────────────────

/// Bucket of the 20-stat total. Orders `<1000` first, then by lower bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TotalBucket {
    BelowFloor,
    /// Lower bound of a 100-wide bucket.
    From(u32),
}

impl TotalBucket {
    pub fn of(total: u32) -> Self {
        if total < TOTAL_FLOOR {
            TotalBucket::BelowFloor
        } else {
            TotalBucket::From(total / TOTAL_BUCKET_WIDTH * TOTAL_BUCKET_WIDTH)
        }
    }
}

impl fmt::Display for TotalBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TotalBucket::BelowFloor => write!(f, "<{TOTAL_FLOOR}"),
            TotalBucket::From(lower) => write!(f, "{}-{}", lower, lower + TOTAL_BUCKET_WIDTH - 1),
        }
    }
}

/// 10 cm height bucket for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeightBucket {
    Under180,
    From180,
    From190,
    From200,
    From210,
    From220,
}

impl HeightBucket {
    pub const ALL: [HeightBucket; 6] = [
        HeightBucket::Under180,
        HeightBucket::From180,
        HeightBucket::From190,
        HeightBucket::From200,
        HeightBucket::From210,
        HeightBucket::From220,
    ];

    pub fn of(height_cm: u16) -> Self {
        match height_cm {
            0..=179 => HeightBucket::Under180,
            180..=189 => HeightBucket::From180,
            190..=199 => HeightBucket::From190,
            200..=209 => HeightBucket::From200,
            210..=219 => HeightBucket::From210,
            _ => HeightBucket::From220,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HeightBucket::Under180 => "<180",
            HeightBucket::From180 => "180-189",
            HeightBucket::From190 => "190-199",
            HeightBucket::From200 => "200-209",
            HeightBucket::From210 => "210-219",
            HeightBucket::From220 => ">=220",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CountRow {
    pub label: String,
    pub count: u64,
    pub percentage: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GradeRow {
    pub grade: Grade,
    pub count: u64,
    pub percentage: String,
    /// Players of this grade whose untrainable sum fell inside the grade's range.
    pub in_range: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub samples: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grades: Option<Vec<GradeRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals: Option<Vec<CountRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heights: Option<Vec<CountRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<CountRow>>,
}

impl SimulationReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "==== Simulation results ====")?;
        writeln!(f, "samples: {}", self.samples)?;
        if let Some(grades) = &self.grades {
            writeln!(f, "\nOverall grade:")?;
            for row in grades {
                writeln!(
                    f,
                    "{}: count={}, share={}, in_range={}",
                    row.grade, row.count, row.percentage, row.in_range
                )?;
            }
        }
        let tables = [
            ("Total stats sum:", &self.totals),
            ("Height:", &self.heights),
            ("Position:", &self.positions),
        ];
        for (title, rows) in tables {
            if let Some(rows) = rows {
                writeln!(f, "\n{title}")?;
                for row in rows {
                    writeln!(f, "{}: count={}, share={}", row.label, row.count, row.percentage)?;
                }
            }
        }
        Ok(())
    }
}

// ── Tally ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Tally {
    grades: [u64; 7],
    in_range: [u64; 7],
    totals: BTreeMap<TotalBucket, u64>,
    heights: [u64; 6],
    positions: [u64; 5],
}

impl Tally {
    fn record(&mut self, player: &PlayerRecord, sections: ReportSections) {
        if sections.overall {
            let g = grade_index(player.overall_grade);
            self.grades[g] += 1;
            let rule = player.overall_grade.rule();
            if (rule.sum_min..=rule.sum_max).contains(&player.untrainable_sum) {
                self.in_range[g] += 1;
            }
        }
        if sections.total {
            *self.totals.entry(TotalBucket::of(player.sum_all_stats())).or_default() += 1;
        }
        if sections.height_position {
            self.heights[HeightBucket::of(player.height_cm).index()] += 1;
            self.positions[position_index(player.position)] += 1;
        }
    }

    fn into_report(self, samples: u64, sections: ReportSections) -> SimulationReport {
        let row = |label: String, count: u64| CountRow {
            label,
            count,
            percentage: format_percentage(count, samples),
        };
        SimulationReport {
            samples,
            grades: sections.overall.then(|| {
                Grade::ALL
                    .iter()
                    .enumerate()
                    .map(|(i, &grade)| GradeRow {
                        grade,
                        count: self.grades[i],
                        percentage: format_percentage(self.grades[i], samples),
                        in_range: self.in_range[i],
                    })
                    .collect()
            }),
            totals: sections.total.then(|| {
                self.totals
                    .iter()
                    .map(|(bucket, &count)| row(bucket.to_string(), count))
                    .collect()
            }),
            heights: sections.height_position.then(|| {
                HeightBucket::ALL
                    .iter()
                    .map(|b| row(b.label().to_string(), self.heights[b.index()]))
                    .collect()
            }),
            positions: sections.height_position.then(|| {
                Position::ALL
                    .iter()
                    .enumerate()
                    .map(|(i, p)| row(p.label().to_string(), self.positions[i]))
                    .collect()
            }),
        }
    }
}

fn grade_index(grade: Grade) -> usize {
    Grade::ALL.iter().position(|g| *g == grade).unwrap_or(0)
}

fn position_index(position: Position) -> usize {
    Position::ALL.iter().position(|p| *p == position).unwrap_or(0)
}

/// Generate `n` players and tabulate the enabled `sections`.
pub fn simulate<R: Rng + ?Sized>(
    n: u64,
    pool: &NamePool,
    rng: &mut R,
    sections: ReportSections,
) -> Result<SimulationReport, ValidationError> {
    let created_at = Utc::now().naive_utc().trunc_subsecs(0);
    let progress_every = (n / 10).max(1);
    let mut tally = Tally::default();
    info!(samples = n, ?sections, "simulation started");
    for i in 0..n {
        let player = generate_player(SIMULATION_OWNER, pool, rng, created_at)?;
        tally.record(&player, sections);
        if (i + 1) % progress_every == 0 {
            info!(done = i + 1, samples = n, "simulation progress");
        }
    }
    Ok(tally.into_report(n, sections))
}

// ── Formatting ──────────────────────────────────────────────────────

/// `count / total` as a percentage, truncated (never rounded) once three
/// non-zero digits are shown: `28.0%`, `33.3%`, `0.089%`, `100.0%`.
pub fn format_percentage(count: u64, total: u64) -> String {
    if count == 0 || total == 0 {
        return "0%".to_string();
    }
    let ratio = Decimal::from(count)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(Decimal::from(total)));
    let Some(ratio) = ratio else {
        return "0%".to_string();
    };
    truncate_digits(&ratio.normalize().to_string())
}

fn truncate_digits(s: &str) -> String {
    let nonzero = |text: &str| text.chars().filter(|c| *c != '0').count();
    let Some((int_part, frac_part)) = s.split_once('.') else {
        return if nonzero(s) >= SIGNIFICANT_DIGITS {
            format!("{s}%")
        } else {
            format!("{s}.0%")
        };
    };
    let mut seen = nonzero(int_part);
    if seen >= SIGNIFICANT_DIGITS {
        return format!("{int_part}%");
    }
    let mut kept = String::new();
    for c in frac_part.chars() {
        kept.push(c);
        if c != '0' {
            seen += 1;
        }
        if seen >= SIGNIFICANT_DIGITS {
            break;
        }
    }
    let kept = kept.trim_end_matches('0');
    if kept.is_empty() {
        format!("{int_part}.0%")
    } else {
        format!("{int_part}.{kept}%")
    }
}
