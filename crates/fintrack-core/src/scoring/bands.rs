//! Step-function band tables for the eleven score factors
//!
//! Each factor maps one input to points through an ordered list of
//! thresholds; the first matching threshold wins. Factors are evaluated
//! independently and summed on top of [`BASE_SCORE`].

use serde::Serialize;

use crate::models::ProfileFeatures;

/// Offset every score starts from before factor points are added
pub const BASE_SCORE: f64 = 450.0;
pub const MIN_SCORE: u16 = 300;
pub const MAX_SCORE: u16 = 850;

/// Points for the income factor when there is no income to compare against
pub const NO_INCOME_POINTS: f64 = -10.0;

/// Inclusive threshold on a factor input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    AtLeast(f64),
    AtMost(f64),
}

impl Threshold {
    pub fn matches(self, value: f64) -> bool {
        match self {
            Self::AtLeast(bound) => value >= bound,
            Self::AtMost(bound) => value <= bound,
        }
    }
}

/// Points awarded when no threshold matches
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Otherwise {
    Points(f64),
    /// `max(floor, value * per_unit)`
    Scaled { floor: f64, per_unit: f64 },
}

#[derive(Debug)]
pub struct BandTable {
    pub bands: &'static [(Threshold, f64)],
    pub otherwise: Otherwise,
}

impl BandTable {
    pub fn lookup(&self, value: f64) -> f64 {
        self.bands
            .iter()
            .find(|(threshold, _)| threshold.matches(value))
            .map(|(_, points)| *points)
            .unwrap_or(match self.otherwise {
                Otherwise::Points(points) => points,
                Otherwise::Scaled { floor, per_unit } => (value * per_unit).max(floor),
            })
    }

    /// Highest points the table can award
    pub fn max_points(&self) -> f64 {
        let fallthrough = match self.otherwise {
            Otherwise::Points(points) => points,
            Otherwise::Scaled { floor, .. } => floor,
        };
        self.bands
            .iter()
            .map(|(_, points)| *points)
            .fold(fallthrough, f64::max)
    }

    /// Lowest points the table can award
    pub fn min_points(&self) -> f64 {
        let fallthrough = match self.otherwise {
            Otherwise::Points(points) => points,
            Otherwise::Scaled { floor, .. } => floor,
        };
        self.bands
            .iter()
            .map(|(_, points)| *points)
            .fold(fallthrough, f64::min)
    }
}

use Threshold::{AtLeast, AtMost};

pub static PAYMENT_HISTORY: BandTable = BandTable {
    bands: &[
        (AtLeast(0.99), 297.5),
        (AtLeast(0.97), 270.0),
        (AtLeast(0.94), 230.0),
        (AtLeast(0.90), 180.0),
        (AtLeast(0.85), 130.0),
        (AtLeast(0.80), 90.0),
    ],
    otherwise: Otherwise::Scaled {
        floor: 50.0,
        per_unit: 80.0,
    },
};

pub static CREDIT_UTILIZATION: BandTable = BandTable {
    bands: &[
        (AtMost(0.10), 255.0),
        (AtMost(0.20), 225.0),
        (AtMost(0.30), 190.0),
        (AtMost(0.50), 140.0),
        (AtMost(0.70), 90.0),
        (AtMost(0.90), 50.0),
    ],
    otherwise: Otherwise::Points(20.0),
};

pub static CREDIT_HISTORY_LENGTH: BandTable = BandTable {
    bands: &[
        (AtLeast(7.0), 127.5),
        (AtLeast(5.0), 115.0),
        (AtLeast(3.0), 100.0),
        (AtLeast(2.0), 85.0),
        (AtLeast(1.0), 70.0),
    ],
    otherwise: Otherwise::Points(50.0),
};

pub static CREDIT_MIX: BandTable = BandTable {
    bands: &[
        (AtLeast(0.8), 85.0),
        (AtLeast(0.6), 70.0),
        (AtLeast(0.4), 55.0),
        (AtLeast(0.2), 40.0),
    ],
    otherwise: Otherwise::Points(25.0),
};

pub static DEBT_TO_INCOME: BandTable = BandTable {
    bands: &[
        (AtMost(0.20), 85.0),
        (AtMost(0.36), 65.0),
        (AtMost(0.43), 40.0),
        (AtMost(0.50), 20.0),
    ],
    otherwise: Otherwise::Points(0.0),
};

pub static PUBLIC_RECORDS: BandTable = BandTable {
    bands: &[(AtMost(0.0), 85.0), (AtMost(1.0), -25.0)],
    otherwise: Otherwise::Points(-50.0),
};

// 4-10 accounts score best; more than 10 is slightly worse
pub static TOTAL_ACCOUNTS: BandTable = BandTable {
    bands: &[
        (AtLeast(11.0), 15.0),
        (AtLeast(4.0), 20.0),
        (AtLeast(2.0), 10.0),
    ],
    otherwise: Otherwise::Points(0.0),
};

pub static DELINQUENT_ACCOUNTS: BandTable = BandTable {
    bands: &[
        (AtMost(0.0), 0.0),
        (AtMost(1.0), -75.0),
        (AtMost(2.0), -120.0),
    ],
    otherwise: Otherwise::Points(-150.0),
};

/// Keyed on monthly_debt_payment / income
pub static INCOME_TO_DEBT: BandTable = BandTable {
    bands: &[
        (AtMost(0.10), 40.0),
        (AtMost(0.20), 30.0),
        (AtMost(0.30), 15.0),
        (AtMost(0.40), 0.0),
        (AtMost(0.50), -15.0),
    ],
    otherwise: Otherwise::Points(-30.0),
};

pub static EMPLOYMENT_LENGTH: BandTable = BandTable {
    bands: &[
        (AtLeast(5.0), 20.0),
        (AtLeast(3.0), 15.0),
        (AtLeast(1.0), 10.0),
        (AtLeast(0.5), 5.0),
    ],
    otherwise: Otherwise::Points(0.0),
};

pub static AGE: BandTable = BandTable {
    bands: &[(AtLeast(30.0), 10.0), (AtLeast(25.0), 7.0), (AtLeast(21.0), 5.0)],
    otherwise: Otherwise::Points(2.0),
};

/// The eleven scored factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    PaymentHistory,
    CreditUtilization,
    CreditHistoryLength,
    CreditMix,
    DebtToIncome,
    PublicRecords,
    TotalAccounts,
    DelinquentAccounts,
    IncomeToDebt,
    EmploymentLength,
    Age,
}

impl Factor {
    pub const ALL: [Factor; 11] = [
        Self::PaymentHistory,
        Self::CreditUtilization,
        Self::CreditHistoryLength,
        Self::CreditMix,
        Self::DebtToIncome,
        Self::PublicRecords,
        Self::TotalAccounts,
        Self::DelinquentAccounts,
        Self::IncomeToDebt,
        Self::EmploymentLength,
        Self::Age,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::PaymentHistory => "payment_history",
            Self::CreditUtilization => "credit_utilization",
            Self::CreditHistoryLength => "credit_history_length",
            Self::CreditMix => "credit_mix",
            Self::DebtToIncome => "debt_to_income",
            Self::PublicRecords => "public_records",
            Self::TotalAccounts => "total_accounts",
            Self::DelinquentAccounts => "delinquent_accounts",
            Self::IncomeToDebt => "income_to_debt",
            Self::EmploymentLength => "employment_length",
            Self::Age => "age",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PaymentHistory => "Payment history",
            Self::CreditUtilization => "Credit utilization",
            Self::CreditHistoryLength => "Credit history length",
            Self::CreditMix => "Credit mix",
            Self::DebtToIncome => "Debt-to-income",
            Self::PublicRecords => "Public records",
            Self::TotalAccounts => "Total accounts",
            Self::DelinquentAccounts => "Delinquent accounts",
            Self::IncomeToDebt => "Debt payments vs income",
            Self::EmploymentLength => "Employment length",
            Self::Age => "Age",
        }
    }

    pub fn table(&self) -> &'static BandTable {
        match self {
            Self::PaymentHistory => &PAYMENT_HISTORY,
            Self::CreditUtilization => &CREDIT_UTILIZATION,
            Self::CreditHistoryLength => &CREDIT_HISTORY_LENGTH,
            Self::CreditMix => &CREDIT_MIX,
            Self::DebtToIncome => &DEBT_TO_INCOME,
            Self::PublicRecords => &PUBLIC_RECORDS,
            Self::TotalAccounts => &TOTAL_ACCOUNTS,
            Self::DelinquentAccounts => &DELINQUENT_ACCOUNTS,
            Self::IncomeToDebt => &INCOME_TO_DEBT,
            Self::EmploymentLength => &EMPLOYMENT_LENGTH,
            Self::Age => &AGE,
        }
    }

    /// The value this factor's table is keyed on
    pub fn input(&self, f: &ProfileFeatures) -> f64 {
        match self {
            Self::PaymentHistory => f.payment_history,
            Self::CreditUtilization => f.credit_utilization,
            Self::CreditHistoryLength => f.credit_history_length,
            Self::CreditMix => f.credit_mix,
            Self::DebtToIncome => f.debt_to_income,
            Self::PublicRecords => f.public_records as f64,
            Self::TotalAccounts => f.total_accounts as f64,
            Self::DelinquentAccounts => f.delinquent_accounts as f64,
            Self::IncomeToDebt => {
                if f.income > 0.0 {
                    f.monthly_debt_payment / f.income
                } else {
                    0.0
                }
            }
            Self::EmploymentLength => f.employment_length,
            Self::Age => f.age as f64,
        }
    }

    pub fn points(&self, f: &ProfileFeatures) -> f64 {
        if *self == Self::IncomeToDebt && f.income <= 0.0 {
            return NO_INCOME_POINTS;
        }
        self.table().lookup(self.input(f))
    }

    pub fn max_points(&self) -> f64 {
        self.table().max_points()
    }

    pub fn min_points(&self) -> f64 {
        let table_min = self.table().min_points();
        if *self == Self::IncomeToDebt {
            table_min.min(NO_INCOME_POINTS)
        } else {
            table_min
        }
    }
}

impl std::fmt::Display for Factor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Points one factor contributed to a score
#[derive(Debug, Clone, Serialize)]
pub struct FactorScore {
    pub factor: Factor,
    pub label: &'static str,
    /// The input the band lookup used
    pub value: f64,
    pub points: f64,
    pub max_points: f64,
}

/// Per-factor points for a profile, in table order
pub fn breakdown(features: &ProfileFeatures) -> Vec<FactorScore> {
    Factor::ALL
        .iter()
        .map(|factor| FactorScore {
            factor: *factor,
            label: factor.label(),
            value: factor.input(features),
            points: factor.points(features),
            max_points: factor.max_points(),
        })
        .collect()
}

/// Base plus every factor, before truncation and clamping
pub fn raw_total(features: &ProfileFeatures) -> f64 {
    BASE_SCORE
        + Factor::ALL
            .iter()
            .map(|factor| factor.points(features))
            .sum::<f64>()
}

/// Truncate toward zero and clamp into [MIN_SCORE, MAX_SCORE].
///
/// Returns None for non-finite totals.
pub fn clamp_score(raw: f64) -> Option<u16> {
    if !raw.is_finite() {
        return None;
    }
    let clamped = raw.trunc().clamp(MIN_SCORE as f64, MAX_SCORE as f64);
    Some(clamped as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_threshold_bounds_are_inclusive() {
        assert!(AtLeast(0.99).matches(0.99));
        assert!(!AtLeast(0.99).matches(0.989));
        assert!(AtMost(0.10).matches(0.10));
        assert!(!AtMost(0.10).matches(0.1001));
    }

    #[test]
    fn test_payment_history_bands() {
        assert_eq!(PAYMENT_HISTORY.lookup(1.0), 297.5);
        assert_eq!(PAYMENT_HISTORY.lookup(0.99), 297.5);
        assert_eq!(PAYMENT_HISTORY.lookup(0.97), 270.0);
        assert_eq!(PAYMENT_HISTORY.lookup(0.95), 230.0);
        assert_eq!(PAYMENT_HISTORY.lookup(0.90), 180.0);
        assert_eq!(PAYMENT_HISTORY.lookup(0.85), 130.0);
        assert_eq!(PAYMENT_HISTORY.lookup(0.80), 90.0);
        // Below the last band the floor or the scaled value wins
        assert_eq!(PAYMENT_HISTORY.lookup(0.75), 60.0);
        assert_eq!(PAYMENT_HISTORY.lookup(0.5), 50.0);
        assert_eq!(PAYMENT_HISTORY.lookup(0.0), 50.0);
    }

    #[test]
    fn test_utilization_bands() {
        assert_eq!(CREDIT_UTILIZATION.lookup(0.05), 255.0);
        assert_eq!(CREDIT_UTILIZATION.lookup(0.2), 225.0);
        assert_eq!(CREDIT_UTILIZATION.lookup(0.3), 190.0);
        assert_eq!(CREDIT_UTILIZATION.lookup(0.5), 140.0);
        assert_eq!(CREDIT_UTILIZATION.lookup(0.7), 90.0);
        assert_eq!(CREDIT_UTILIZATION.lookup(0.9), 50.0);
        assert_eq!(CREDIT_UTILIZATION.lookup(1.0), 20.0);
    }

    #[test]
    fn test_count_tables() {
        assert_eq!(PUBLIC_RECORDS.lookup(0.0), 85.0);
        assert_eq!(PUBLIC_RECORDS.lookup(1.0), -25.0);
        assert_eq!(PUBLIC_RECORDS.lookup(5.0), -50.0);

        assert_eq!(TOTAL_ACCOUNTS.lookup(0.0), 0.0);
        assert_eq!(TOTAL_ACCOUNTS.lookup(1.0), 0.0);
        assert_eq!(TOTAL_ACCOUNTS.lookup(2.0), 10.0);
        assert_eq!(TOTAL_ACCOUNTS.lookup(4.0), 20.0);
        assert_eq!(TOTAL_ACCOUNTS.lookup(10.0), 20.0);
        assert_eq!(TOTAL_ACCOUNTS.lookup(11.0), 15.0);

        assert_eq!(DELINQUENT_ACCOUNTS.lookup(0.0), 0.0);
        assert_eq!(DELINQUENT_ACCOUNTS.lookup(1.0), -75.0);
        assert_eq!(DELINQUENT_ACCOUNTS.lookup(2.0), -120.0);
        assert_eq!(DELINQUENT_ACCOUNTS.lookup(3.0), -150.0);
        assert_eq!(DELINQUENT_ACCOUNTS.lookup(12.0), -150.0);
    }

    #[test]
    fn test_income_factor_without_income() {
        let mut f = ProfileFeatures::placeholder();
        f.income = 0.0;
        f.monthly_debt_payment = 500.0;
        assert_eq!(Factor::IncomeToDebt.points(&f), NO_INCOME_POINTS);

        f.income = 100000.0;
        f.monthly_debt_payment = 5000.0;
        assert_eq!(Factor::IncomeToDebt.points(&f), 40.0);

        f.monthly_debt_payment = 60000.0;
        assert_eq!(Factor::IncomeToDebt.points(&f), -30.0);
    }

    #[test]
    fn test_max_points_match_weights() {
        assert_eq!(Factor::PaymentHistory.max_points(), 297.5);
        assert_eq!(Factor::CreditUtilization.max_points(), 255.0);
        assert_eq!(Factor::CreditHistoryLength.max_points(), 127.5);
        assert_eq!(Factor::CreditMix.max_points(), 85.0);
        assert_eq!(Factor::DebtToIncome.max_points(), 85.0);
        assert_eq!(Factor::PublicRecords.max_points(), 85.0);
        assert_eq!(Factor::TotalAccounts.max_points(), 20.0);
        assert_eq!(Factor::DelinquentAccounts.max_points(), 0.0);
        assert_eq!(Factor::IncomeToDebt.max_points(), 40.0);
        assert_eq!(Factor::EmploymentLength.max_points(), 20.0);
        assert_eq!(Factor::Age.max_points(), 10.0);
        assert_eq!(Factor::IncomeToDebt.min_points(), -30.0);
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(1475.0), Some(850));
        assert_eq!(clamp_score(120.0), Some(300));
        assert_eq!(clamp_score(712.9), Some(712));
        assert_eq!(clamp_score(f64::NAN), None);
        assert_eq!(clamp_score(f64::INFINITY), None);
    }

    fn arb_features() -> impl Strategy<Value = ProfileFeatures> {
        (
            (0.0f64..250_000.0, 18i64..90, 0.0f64..40.0, 0.0f64..20_000.0),
            (0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0),
            (0.0f64..40.0, 0i64..6, 0i64..30, 0i64..6),
        )
            .prop_map(|((income, age, emp, debt), (dti, util, ph, mix), (hist, pr, accts, delinq))| {
                ProfileFeatures {
                    income,
                    age,
                    employment_length: emp,
                    monthly_debt_payment: debt,
                    debt_to_income: dti,
                    credit_utilization: util,
                    payment_history: ph,
                    credit_mix: mix,
                    credit_history_length: hist,
                    public_records: pr,
                    total_accounts: accts,
                    delinquent_accounts: delinq,
                    ..ProfileFeatures::placeholder()
                }
            })
    }

    proptest! {
        #[test]
        fn prop_each_factor_within_its_range(f in arb_features()) {
            for factor in Factor::ALL {
                let points = factor.points(&f);
                prop_assert!(points <= factor.max_points(), "{} above max", factor);
                prop_assert!(points >= factor.min_points(), "{} below min", factor);
            }
        }

        #[test]
        fn prop_clamped_score_in_range(f in arb_features()) {
            let score = clamp_score(raw_total(&f)).unwrap();
            prop_assert!((MIN_SCORE..=MAX_SCORE).contains(&score));
        }

        #[test]
        fn prop_payment_history_is_monotonic(a in 0.0f64..1.0, b in 0.0f64..1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(PAYMENT_HISTORY.lookup(lo) <= PAYMENT_HISTORY.lookup(hi));
        }

        #[test]
        fn prop_utilization_is_antitonic(a in 0.0f64..1.0, b in 0.0f64..1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(CREDIT_UTILIZATION.lookup(lo) >= CREDIT_UTILIZATION.lookup(hi));
        }
    }
}
