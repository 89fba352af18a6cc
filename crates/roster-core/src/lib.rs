#![deny(warnings)]

//! Core domain models and invariants for the roster engine.
//!
//! This crate defines the serializable player record, the fixed grade table
//! that drives generation, the name pool, and validation helpers that
//! guarantee basic record invariants.

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Age assigned to every freshly generated player.
pub const DEFAULT_AGE: u8 = 18;
/// Lowest value any stat may take.
pub const STAT_MIN: u8 = 1;
/// Highest value any stat may take.
pub const STAT_MAX: u8 = 99;
/// Shortest valid player height.
pub const HEIGHT_MIN_CM: u16 = 160;
/// Tallest valid player height.
pub const HEIGHT_MAX_CM: u16 = 230;
/// Number of stats in each of the untrainable and trainable groups.
pub const STATS_PER_GROUP: usize = 10;

/// Overall grade of a player, ordered from most common to rarest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    G,
    C,
    B,
    A,
    S,
    SS,
    SSR,
}

/// Stat constraints for one grade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GradeRule {
    /// Lowest acceptable untrainable sum.
    pub sum_min: u32,
    /// Highest acceptable untrainable sum.
    pub sum_max: u32,
    /// Floor for each untrainable stat.
    pub stat_min: u8,
    /// Ceiling for each untrainable stat.
    pub stat_max: u8,
}

impl Grade {
    /// All grades in ascending order.
    pub const ALL: [Grade; 7] = [
        Grade::G,
        Grade::C,
        Grade::B,
        Grade::A,
        Grade::S,
        Grade::SS,
        Grade::SSR,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Grade::G => "G",
            Grade::C => "C",
            Grade::B => "B",
            Grade::A => "A",
            Grade::S => "S",
            Grade::SS => "SS",
            Grade::SSR => "SSR",
        }
    }

    /// Draw weight of the grade; weights over [`Grade::ALL`] sum to 1.
    pub fn weight(self) -> f64 {
        match self {
            Grade::G => 0.28,
            Grade::C => 0.26,
            Grade::B => 0.22,
            Grade::A => 0.14,
            Grade::S => 0.07,
            Grade::SS => 0.025,
            Grade::SSR => 0.005,
        }
    }

    pub fn rule(self) -> GradeRule {
        let (sum_min, sum_max, stat_min, stat_max) = match self {
            Grade::G => (10, 400, 10, 60),
            Grade::C => (399, 600, 20, 70),
            Grade::B => (599, 700, 30, 70),
            Grade::A => (699, 800, 40, 75),
            Grade::S => (799, 900, 50, 80),
            Grade::SS => (900, 950, 60, 99),
            Grade::SSR => (951, 990, 91, 99),
        };
        GradeRule {
            sum_min,
            sum_max,
            stat_min,
            stat_max,
        }
    }

    /// Salary multiplier applied to the 20-stat total (1.0 for G up to 3.0 for SSR).
    pub fn salary_factor(self) -> Decimal {
        match self {
            Grade::G => Decimal::new(10, 1),
            Grade::C => Decimal::new(11, 1),
            Grade::B => Decimal::new(13, 1),
            Grade::A => Decimal::new(16, 1),
            Grade::S => Decimal::new(20, 1),
            Grade::SS => Decimal::new(25, 1),
            Grade::SSR => Decimal::new(30, 1),
        }
    }

    /// `round(total_stats × salary_factor)` in exact decimal arithmetic,
    /// rounded half away from zero.
    pub fn start_salary(self, total_stats: u32) -> i64 {
        let raw = Decimal::from(total_stats) * self.salary_factor();
        raw.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Grade {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grade::ALL
            .into_iter()
            .find(|g| g.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownGrade(s.to_string()))
    }
}

/// Court position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    /// Point guard
    PG,
    /// Shooting guard
    SG,
    /// Small forward
    SF,
    /// Power forward
    PF,
    /// Center
    C,
}

impl Position {
    pub const ALL: [Position; 5] = [
        Position::PG,
        Position::SG,
        Position::SF,
        Position::PF,
        Position::C,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Position::PG => "PG",
            Position::SG => "SG",
            Position::SF => "SF",
            Position::PF => "PF",
            Position::C => "C",
        }
    }

    /// Whether a player of `height_cm` may hold this position: guards only
    /// below 190 cm, no forwards or centers below 200 cm.
    pub fn fits_height(self, height_cm: u16) -> bool {
        match self {
            Position::PG | Position::SG => true,
            Position::SF => height_cm >= 190,
            Position::PF | Position::C => height_cm >= 200,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Position {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::ALL
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownPosition(s.to_string()))
    }
}

macro_rules! stat_block {
    ($(#[$meta:meta])* $name:ident { $($field:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name {
            $(pub $field: u8,)+
        }

        impl $name {
            /// Column names in declaration order.
            pub const KEYS: [&'static str; STATS_PER_GROUP] = [$(stringify!($field)),+];

            pub fn from_array(values: [u8; STATS_PER_GROUP]) -> Self {
                let [$($field),+] = values;
                Self { $($field),+ }
            }

            pub fn to_array(&self) -> [u8; STATS_PER_GROUP] {
                [$(self.$field),+]
            }

            pub fn sum(&self) -> u32 {
                self.to_array().iter().map(|&v| u32::from(v)).sum()
            }

            /// `(column, value)` pairs in declaration order.
            pub fn entries(&self) -> impl Iterator<Item = (&'static str, u8)> {
                Self::KEYS.into_iter().zip(self.to_array())
            }
        }
    };
}

stat_block! {
    /// Stats fixed at creation and constrained by the grade's sum range.
    UntrainableStats {
        ath_stamina,
        ath_strength,
        ath_speed,
        ath_jump,
        shot_touch,
        shot_release,
        talent_offiq,
        talent_defiq,
        talent_health,
        talent_luck,
    }
}

stat_block! {
    /// Stats sampled independently; only their initial value is set here.
    TrainableStats {
        shot_accuracy,
        shot_range,
        def_rebound,
        def_boxout,
        def_contest,
        def_disrupt,
        off_move,
        off_dribble,
        off_pass,
        off_handle,
    }
}

/// A fully generated player, ready to be persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Owning account (opaque foreign key).
    pub owner_id: i64,
    /// Display name, "First Last".
    pub name: String,
    pub age: u8,
    /// Height in centimeters, within [160, 230].
    pub height_cm: u16,
    pub position: Position,
    #[serde(flatten)]
    pub untrainable: UntrainableStats,
    #[serde(flatten)]
    pub trainable: TrainableStats,
    /// Sum of the ten untrainable stats.
    pub untrainable_sum: u32,
    pub overall_grade: Grade,
    pub training_points: u32,
    /// Starting salary derived from the 20-stat total and grade factor.
    pub start_salary: i64,
    pub created_at: NaiveDateTime,
}

/// Generated attributes of a player before derived fields are filled in.
#[derive(Clone, Debug, PartialEq)]
pub struct NewPlayer {
    pub owner_id: i64,
    pub name: String,
    pub height_cm: u16,
    pub position: Position,
    pub overall_grade: Grade,
    pub untrainable: UntrainableStats,
    pub trainable: TrainableStats,
    pub created_at: NaiveDateTime,
}

impl PlayerRecord {
    /// Build a fresh record: default age, no training points, derived
    /// `untrainable_sum` and `start_salary`. Every invariant is checked
    /// before the record is returned.
    pub fn assemble(new: NewPlayer) -> Result<Self, ValidationError> {
        let untrainable_sum = new.untrainable.sum();
        let total = untrainable_sum + new.trainable.sum();
        let record = PlayerRecord {
            owner_id: new.owner_id,
            name: new.name,
            age: DEFAULT_AGE,
            height_cm: new.height_cm,
            position: new.position,
            untrainable: new.untrainable,
            trainable: new.trainable,
            untrainable_sum,
            overall_grade: new.overall_grade,
            training_points: 0,
            start_salary: new.overall_grade.start_salary(total),
            created_at: new.created_at,
        };
        validate_player(&record)?;
        Ok(record)
    }

    /// Salary implied by the record's stats and grade.
    pub fn expected_salary(&self) -> i64 {
        self.overall_grade.start_salary(self.sum_all_stats())
    }

    /// All twenty stats, untrainable first.
    pub fn all_stats(&self) -> impl Iterator<Item = (&'static str, u8)> + '_ {
        self.untrainable.entries().chain(self.trainable.entries())
    }

    /// Sum of all twenty stats.
    pub fn sum_all_stats(&self) -> u32 {
        self.untrainable.sum() + self.trainable.sum()
    }
}

impl fmt::Display for PlayerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "==== generated player ====")?;
        writeln!(f, "owner_id: {}", self.owner_id)?;
        writeln!(f, "name: {}", self.name)?;
        writeln!(f, "age: {}", self.age)?;
        writeln!(f, "height_cm: {}", self.height_cm)?;
        writeln!(f, "position: {}", self.position)?;
        for (key, value) in self.all_stats() {
            writeln!(f, "{key}: {value}")?;
        }
        writeln!(f, "untrainable_sum: {}", self.untrainable_sum)?;
        writeln!(f, "overall_grade: {}", self.overall_grade)?;
        writeln!(f, "training_points: {}", self.training_points)?;
        writeln!(f, "start_salary: {}", self.start_salary)?;
        writeln!(f, "created_at: {}", self.created_at.format("%Y-%m-%d %H:%M:%S"))?;
        write!(f, "total_stats_sum: {}", self.sum_all_stats())
    }
}

/// Validation errors for record invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A stat left [1, 99].
    #[error("stat {field} = {value} is outside [1, 99]")]
    StatOutOfRange { field: &'static str, value: u8 },
    /// Height left [160, 230].
    #[error("height {0}cm is outside [160, 230]")]
    HeightOutOfRange(u16),
    /// Stored untrainable sum disagrees with the stats.
    #[error("untrainable_sum {stored} does not match stats total {actual}")]
    SumMismatch { stored: u32, actual: u32 },
    #[error("player name is empty")]
    EmptyName,
    #[error("salary must be non-negative, got {0}")]
    NegativeSalary(i64),
    /// Stored salary disagrees with stats total × grade factor.
    #[error("start_salary {stored} does not match expected {expected}")]
    SalaryMismatch { stored: i64, expected: i64 },
    #[error("position {position} does not fit height {height_cm}cm")]
    PositionHeightMismatch { position: Position, height_cm: u16 },
    #[error("unknown grade: {0}")]
    UnknownGrade(String),
    #[error("unknown position: {0}")]
    UnknownPosition(String),
}

/// Errors raised while preparing the inputs of a generation call.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("first name pool is empty")]
    EmptyFirstNames,
    #[error("last name pool is empty")]
    EmptyLastNames,
    /// The name source could not be read at all.
    #[error("name pool unavailable: {0}")]
    Unavailable(String),
    #[error("batch size must be > 0")]
    InvalidBatchSize,
}

/// Validate a player record.
pub fn validate_player(p: &PlayerRecord) -> Result<(), ValidationError> {
    for (field, value) in p.all_stats() {
        if !(STAT_MIN..=STAT_MAX).contains(&value) {
            return Err(ValidationError::StatOutOfRange { field, value });
        }
    }
    if !(HEIGHT_MIN_CM..=HEIGHT_MAX_CM).contains(&p.height_cm) {
        return Err(ValidationError::HeightOutOfRange(p.height_cm));
    }
    let actual = p.untrainable.sum();
    if p.untrainable_sum != actual {
        return Err(ValidationError::SumMismatch {
            stored: p.untrainable_sum,
            actual,
        });
    }
    if p.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if !p.position.fits_height(p.height_cm) {
        return Err(ValidationError::PositionHeightMismatch {
            position: p.position,
            height_cm: p.height_cm,
        });
    }
    if p.start_salary < 0 {
        return Err(ValidationError::NegativeSalary(p.start_salary));
    }
    let expected = p.expected_salary();
    if p.start_salary != expected {
        return Err(ValidationError::SalaryMismatch {
            stored: p.start_salary,
            expected,
        });
    }
    Ok(())
}

#[derive(Deserialize)]
struct RawNamePool {
    first_names: Vec<String>,
    last_names: Vec<String>,
}

/// Read-only first/last name lists used by the name synthesizer.
///
/// Both lists are guaranteed non-empty and free of blank entries. The pool
/// is never mutated after construction, so it can be shared by reference
/// across generation calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNamePool")]
pub struct NamePool {
    first_names: Vec<String>,
    last_names: Vec<String>,
}

impl NamePool {
    /// Build a pool, dropping blank entries.
    pub fn new<I, J>(first_names: I, last_names: J) -> Result<Self, ConfigError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        J: IntoIterator,
        J::Item: Into<String>,
    {
        let first_names: Vec<String> = non_blank(first_names);
        let last_names: Vec<String> = non_blank(last_names);
        if first_names.is_empty() {
            return Err(ConfigError::EmptyFirstNames);
        }
        if last_names.is_empty() {
            return Err(ConfigError::EmptyLastNames);
        }
        Ok(Self {
            first_names,
            last_names,
        })
    }

    pub fn first_names(&self) -> &[String] {
        &self.first_names
    }

    pub fn last_names(&self) -> &[String] {
        &self.last_names
    }
}

fn non_blank<I>(names: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    names
        .into_iter()
        .map(Into::into)
        .filter(|s| !s.trim().is_empty())
        .collect()
}

impl TryFrom<RawNamePool> for NamePool {
    type Error = ConfigError;

    fn try_from(raw: RawNamePool) -> Result<Self, Self::Error> {
        NamePool::new(raw.first_names, raw.last_names)
    }
}
