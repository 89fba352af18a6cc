//! Salary derivation.

use roster_core::{Grade, PlayerRecord};

/// `round(total_stats × grade factor)`, computed in exact decimal
/// arithmetic and rounded half away from zero.
///
/// ```
/// use roster_core::Grade;
/// // 1005 × 1.1 = 1105.5
/// assert_eq!(roster_gen::start_salary(1005, Grade::C), 1106);
/// ```
pub fn start_salary(total_stats: u32, grade: Grade) -> i64 {
    grade.start_salary(total_stats)
}

/// Salary a record should carry given its stats and grade.
pub fn expected_salary(p: &PlayerRecord) -> i64 {
    p.expected_salary()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn factor_table_applied() {
        assert_eq!(start_salary(1000, Grade::G), 1000);
        assert_eq!(start_salary(1000, Grade::C), 1100);
        assert_eq!(start_salary(1000, Grade::B), 1300);
        assert_eq!(start_salary(1000, Grade::A), 1600);
        assert_eq!(start_salary(1000, Grade::S), 2000);
        assert_eq!(start_salary(1000, Grade::SS), 2500);
        assert_eq!(start_salary(1000, Grade::SSR), 3000);
    }

    #[test]
    fn rounding_is_half_up_and_exact() {
        assert_eq!(start_salary(1005, Grade::C), 1106);
        assert_eq!(start_salary(1001, Grade::C), 1101);
        assert_eq!(start_salary(1003, Grade::SS), 2508);
        assert_eq!(start_salary(1001, Grade::B), 1301);
        assert_eq!(start_salary(0, Grade::SSR), 0);
    }

    proptest! {
        #[test]
        fn salary_monotonic_in_total(total in 20u32..1980) {
            for g in Grade::ALL {
                prop_assert!(start_salary(total + 1, g) >= start_salary(total, g));
            }
        }
    }
}
