//! Domain models for Fintrack

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Round to the two decimal places the store keeps
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn clamp_ratio(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// First + last name when known, otherwise the email
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => self.email.clone(),
        }
    }
}

/// Input for registering a user
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

// ========== Financial profile ==========

/// The scoring inputs of a financial profile.
///
/// Shared by the live profile and by every score snapshot, which keeps a
/// full copy of these values as they were at calculation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileFeatures {
    pub income: f64,
    pub age: i64,
    pub employment_length: f64,
    pub monthly_debt_payment: f64,
    pub total_credit_limit: f64,
    pub current_credit_balance: f64,
    pub debt_to_income: f64,
    pub credit_utilization: f64,
    pub payment_history: f64,
    pub credit_mix: f64,
    pub new_credit: f64,
    pub credit_history_length: f64,
    pub public_records: i64,
    pub total_accounts: i64,
    pub delinquent_accounts: i64,
    pub loan_amount: f64,
    pub interest_rate: f64,
    pub monthly_payment: f64,
}

impl ProfileFeatures {
    /// Values a profile starts with before the user submits any data
    pub fn placeholder() -> Self {
        Self {
            income: 30000.0,
            age: 30,
            employment_length: 5.0,
            monthly_debt_payment: 0.0,
            total_credit_limit: 0.0,
            current_credit_balance: 0.0,
            debt_to_income: 0.3,
            credit_utilization: 0.3,
            payment_history: 0.7,
            credit_mix: 0.5,
            new_credit: 0.5,
            credit_history_length: 5.0,
            public_records: 0,
            total_accounts: 1,
            delinquent_accounts: 0,
            loan_amount: 0.0,
            interest_rate: 0.0,
            monthly_payment: 0.0,
        }
    }

    /// Clamp ratio fields to [0, 1] and counts and lengths to >= 0.
    /// Values keep full precision.
    pub fn clamped(self) -> Self {
        Self {
            age: self.age.max(0),
            employment_length: self.employment_length.max(0.0),
            debt_to_income: clamp_ratio(self.debt_to_income),
            credit_utilization: clamp_ratio(self.credit_utilization),
            payment_history: clamp_ratio(self.payment_history),
            credit_mix: clamp_ratio(self.credit_mix),
            new_credit: clamp_ratio(self.new_credit),
            credit_history_length: self.credit_history_length.max(0.0),
            public_records: self.public_records.max(0),
            total_accounts: self.total_accounts.max(0),
            delinquent_accounts: self.delinquent_accounts.max(0),
            ..self
        }
    }

    /// Clamped and rounded to storage precision
    pub fn sanitized(self) -> Self {
        let f = self.clamped();
        Self {
            income: round2(f.income),
            employment_length: round2(f.employment_length),
            monthly_debt_payment: round2(f.monthly_debt_payment),
            total_credit_limit: round2(f.total_credit_limit),
            current_credit_balance: round2(f.current_credit_balance),
            debt_to_income: round2(f.debt_to_income),
            credit_utilization: round2(f.credit_utilization),
            payment_history: round2(f.payment_history),
            credit_mix: round2(f.credit_mix),
            new_credit: round2(f.new_credit),
            credit_history_length: round2(f.credit_history_length),
            loan_amount: round2(f.loan_amount),
            interest_rate: round2(f.interest_rate),
            monthly_payment: round2(f.monthly_payment),
            ..f
        }
    }
}

/// A user's stored financial profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialProfile {
    pub user_id: i64,
    #[serde(flatten)]
    pub features: ProfileFeatures,
    pub updated_at: DateTime<Utc>,
}

/// Fields the score request must carry
pub const REQUIRED_SCORE_FIELDS: [&str; 5] = [
    "income",
    "age",
    "employment_length",
    "payment_history",
    "credit_history_length",
];

/// A partial profile update; absent or null fields keep the stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub income: Option<f64>,
    pub age: Option<i64>,
    pub employment_length: Option<f64>,
    pub monthly_debt_payment: Option<f64>,
    pub total_credit_limit: Option<f64>,
    pub current_credit_balance: Option<f64>,
    pub debt_to_income: Option<f64>,
    pub credit_utilization: Option<f64>,
    pub payment_history: Option<f64>,
    pub credit_mix: Option<f64>,
    pub new_credit: Option<f64>,
    pub credit_history_length: Option<f64>,
    pub public_records: Option<i64>,
    pub total_accounts: Option<i64>,
    pub delinquent_accounts: Option<i64>,
    pub loan_amount: Option<f64>,
    pub interest_rate: Option<f64>,
    pub monthly_payment: Option<f64>,
}

impl ProfileUpdate {
    /// Names of required score fields absent from this update
    pub fn missing_required(&self) -> Vec<String> {
        let present = [
            self.income.is_some(),
            self.age.is_some(),
            self.employment_length.is_some(),
            self.payment_history.is_some(),
            self.credit_history_length.is_some(),
        ];
        REQUIRED_SCORE_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Reject values no clamp can repair: non-finite numbers and negative counts
    pub fn check_values(&self) -> Result<()> {
        let floats = [
            ("income", self.income),
            ("employment_length", self.employment_length),
            ("monthly_debt_payment", self.monthly_debt_payment),
            ("total_credit_limit", self.total_credit_limit),
            ("current_credit_balance", self.current_credit_balance),
            ("debt_to_income", self.debt_to_income),
            ("credit_utilization", self.credit_utilization),
            ("payment_history", self.payment_history),
            ("credit_mix", self.credit_mix),
            ("new_credit", self.new_credit),
            ("credit_history_length", self.credit_history_length),
            ("loan_amount", self.loan_amount),
            ("interest_rate", self.interest_rate),
            ("monthly_payment", self.monthly_payment),
        ];
        for (name, value) in floats {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(Error::Validation(format!("{} must be a finite number", name)));
                }
            }
        }

        let counts = [
            ("age", self.age),
            ("public_records", self.public_records),
            ("total_accounts", self.total_accounts),
            ("delinquent_accounts", self.delinquent_accounts),
        ];
        for (name, value) in counts {
            if matches!(value, Some(v) if v < 0) {
                return Err(Error::Validation(format!("{} must not be negative", name)));
            }
        }

        Ok(())
    }

    /// Stricter rules for direct profile edits
    pub fn validate_profile_edit(&self) -> Result<()> {
        self.check_values()?;
        if matches!(self.income, Some(v) if v < 300.0) {
            return Err(Error::Validation("income must be at least 300".to_string()));
        }
        if matches!(self.age, Some(v) if v < 18) {
            return Err(Error::Validation("age must be at least 18".to_string()));
        }
        Ok(())
    }

    /// Merge this update over `base`, field by field.
    ///
    /// debt_to_income and credit_utilization are capped at 1.0 before the
    /// merge. The result is clamped but not rounded; storage rounds it.
    pub fn apply_to(&self, base: &ProfileFeatures) -> ProfileFeatures {
        let merged = ProfileFeatures {
            income: self.income.unwrap_or(base.income),
            age: self.age.unwrap_or(base.age),
            employment_length: self.employment_length.unwrap_or(base.employment_length),
            monthly_debt_payment: self
                .monthly_debt_payment
                .unwrap_or(base.monthly_debt_payment),
            total_credit_limit: self.total_credit_limit.unwrap_or(base.total_credit_limit),
            current_credit_balance: self
                .current_credit_balance
                .unwrap_or(base.current_credit_balance),
            debt_to_income: self
                .debt_to_income
                .map(|v| v.min(1.0))
                .unwrap_or(base.debt_to_income),
            credit_utilization: self
                .credit_utilization
                .map(|v| v.min(1.0))
                .unwrap_or(base.credit_utilization),
            payment_history: self.payment_history.unwrap_or(base.payment_history),
            credit_mix: self.credit_mix.unwrap_or(base.credit_mix),
            new_credit: self.new_credit.unwrap_or(base.new_credit),
            credit_history_length: self
                .credit_history_length
                .unwrap_or(base.credit_history_length),
            public_records: self.public_records.unwrap_or(base.public_records),
            total_accounts: self.total_accounts.unwrap_or(base.total_accounts),
            delinquent_accounts: self.delinquent_accounts.unwrap_or(base.delinquent_accounts),
            loan_amount: self.loan_amount.unwrap_or(base.loan_amount),
            interest_rate: self.interest_rate.unwrap_or(base.interest_rate),
            monthly_payment: self.monthly_payment.unwrap_or(base.monthly_payment),
        };
        merged.clamped()
    }
}

// ========== Scores ==========

/// Score band, from the post-clamp score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreCategory {
    Exceptional,
    Excellent,
    Good,
    Fair,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 6] = [
        Self::Exceptional,
        Self::Excellent,
        Self::Good,
        Self::Fair,
        Self::Poor,
        Self::VeryPoor,
    ];

    pub fn from_score(score: u16) -> Self {
        match score {
            800.. => Self::Exceptional,
            740..=799 => Self::Excellent,
            670..=739 => Self::Good,
            580..=669 => Self::Fair,
            500..=579 => Self::Poor,
            _ => Self::VeryPoor,
        }
    }

    /// Inclusive lower bound of the band
    pub fn min_score(&self) -> u16 {
        match self {
            Self::Exceptional => 800,
            Self::Excellent => 740,
            Self::Good => 670,
            Self::Fair => 580,
            Self::Poor => 500,
            Self::VeryPoor => 300,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exceptional => "Exceptional",
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }

    /// What the band means for the borrower
    pub fn message(&self) -> &'static str {
        match self {
            Self::Exceptional => {
                "Your credit score is exceptional (800-850)! You're in the top tier of borrowers. \
                 You're likely to get approved for the best loans with the lowest interest rates available. \
                 Lenders see you as an extremely low-risk borrower. Continue your excellent credit habits to maintain this elite status."
            }
            Self::Excellent => {
                "Your credit score is excellent (740-799). You have demonstrated very responsible credit management. \
                 You should qualify for most loans with very competitive rates. \
                 Lenders consider you a very low-risk borrower. Minor improvements could push you into the exceptional range."
            }
            Self::Good => {
                "Your credit score is good (670-739). You've shown responsible credit management overall. \
                 You should qualify for most loans with decent interest rates, though not the very best available. \
                 Lenders see you as a relatively low-risk borrower. Focus on the factors listed below to improve your score further."
            }
            Self::Fair => {
                "Your credit score is fair (580-669). You have some issues in your credit history that need attention. \
                 You may face higher interest rates or have difficulty getting approved for some loans. \
                 Lenders consider you a medium-risk borrower. Pay special attention to the improvement factors listed below."
            }
            Self::Poor => {
                "Your credit score is poor (500-579). You have significant issues in your credit history. \
                 You'll likely face high interest rates and may be denied for many types of credit. \
                 Lenders see you as a high-risk borrower. Focus on addressing the negative factors listed below to improve your score."
            }
            Self::VeryPoor => {
                "Your credit score is very poor (300-499). You have serious issues in your credit history that require immediate attention. \
                 You'll face significant challenges obtaining new credit and will likely need secured credit products. \
                 Lenders consider you an extremely high-risk borrower. Consider credit counseling and focus on the improvement factors below."
            }
        }
    }
}

impl std::str::FromStr for ScoreCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], " ").as_str() {
            "exceptional" => Ok(Self::Exceptional),
            "excellent" => Ok(Self::Excellent),
            "good" => Ok(Self::Good),
            "fair" => Ok(Self::Fair),
            "poor" => Ok(Self::Poor),
            "very poor" | "verypoor" => Ok(Self::VeryPoor),
            _ => Err(format!("Unknown score category: {}", s)),
        }
    }
}

impl std::fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub id: i64,
    pub user_id: i64,
    pub score: u16,
    pub category: ScoreCategory,
    pub calculated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub features: ProfileFeatures,
}

// ========== Loans ==========

/// Loan lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    #[default]
    Active,
    Closed,
    Defaulted,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Defaulted => "defaulted",
        }
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            "defaulted" => Ok(Self::Defaulted),
            _ => Err(format!("Unknown loan status: {}", s)),
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    #[default]
    Personal,
    Mortgage,
    Auto,
    Student,
    Business,
    CreditCard,
    Other,
}

impl LoanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Mortgage => "mortgage",
            Self::Auto => "auto",
            Self::Student => "student",
            Self::Business => "business",
            Self::CreditCard => "credit_card",
            Self::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Personal => "Personal Loan",
            Self::Mortgage => "Mortgage",
            Self::Auto => "Auto Loan",
            Self::Student => "Student Loan",
            Self::Business => "Business Loan",
            Self::CreditCard => "Credit Card",
            Self::Other => "Other",
        }
    }
}

impl std::str::FromStr for LoanType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "personal" => Ok(Self::Personal),
            "mortgage" => Ok(Self::Mortgage),
            "auto" => Ok(Self::Auto),
            "student" => Ok(Self::Student),
            "business" => Ok(Self::Business),
            "credit_card" | "creditcard" => Ok(Self::CreditCard),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown loan type: {}", s)),
        }
    }
}

impl std::fmt::Display for LoanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A loan held by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanAccount {
    pub id: i64,
    pub user_id: i64,
    pub account_number: String,
    pub lender_name: String,
    pub loan_type: LoanType,
    pub principal_amount: f64,
    pub remaining_balance: f64,
    pub interest_rate: f64,
    pub term_months: i64,
    pub monthly_payment: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Standard amortized monthly payment; zero-rate loans split evenly
pub fn amortized_payment(principal: f64, annual_rate_percent: f64, term_months: i64) -> f64 {
    if term_months <= 0 {
        return 0.0;
    }
    let n = term_months as f64;
    let r = annual_rate_percent / 100.0 / 12.0;
    if r <= 0.0 {
        return round2(principal / n);
    }
    round2(principal * r / (1.0 - (1.0 + r).powf(-n)))
}

/// Input for creating a loan account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLoanAccount {
    pub account_number: String,
    pub lender_name: String,
    #[serde(default)]
    pub loan_type: LoanType,
    pub principal_amount: f64,
    /// Defaults to the principal
    pub remaining_balance: Option<f64>,
    pub interest_rate: f64,
    pub term_months: i64,
    /// Defaults to the amortized payment
    pub monthly_payment: Option<f64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: LoanStatus,
}

/// Shared loan invariants
#[allow(clippy::too_many_arguments)]
fn validate_loan_terms(
    account_number: &str,
    lender_name: &str,
    principal: f64,
    remaining: f64,
    interest_rate: f64,
    term_months: i64,
    monthly_payment: f64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<()> {
    if account_number.trim().is_empty() || account_number.len() > 20 {
        return Err(Error::Validation(
            "account_number must be 1-20 characters".to_string(),
        ));
    }
    if lender_name.trim().is_empty() {
        return Err(Error::Validation("lender_name is required".to_string()));
    }
    if end <= start {
        return Err(Error::Validation(
            "end_date must be after start_date".to_string(),
        ));
    }
    if !(0.0..=30.0).contains(&interest_rate) {
        return Err(Error::Validation(
            "interest_rate must be between 0 and 30".to_string(),
        ));
    }
    if !(principal.is_finite() && principal > 0.0) {
        return Err(Error::Validation(
            "principal_amount must be greater than 0".to_string(),
        ));
    }
    if !(remaining.is_finite() && remaining >= 0.0) {
        return Err(Error::Validation(
            "remaining_balance must not be negative".to_string(),
        ));
    }
    if term_months <= 0 {
        return Err(Error::Validation(
            "term_months must be greater than 0".to_string(),
        ));
    }
    if !(monthly_payment.is_finite() && monthly_payment >= 0.0) {
        return Err(Error::Validation(
            "monthly_payment must not be negative".to_string(),
        ));
    }
    Ok(())
}

impl NewLoanAccount {
    pub fn validate(&self) -> Result<()> {
        validate_loan_terms(
            &self.account_number,
            &self.lender_name,
            self.principal_amount,
            self.remaining_balance.unwrap_or(self.principal_amount),
            self.interest_rate,
            self.term_months,
            self.monthly_payment.unwrap_or(0.0),
            self.start_date,
            self.end_date,
        )
    }

    pub fn resolved_monthly_payment(&self) -> f64 {
        self.monthly_payment.map(round2).unwrap_or_else(|| {
            amortized_payment(self.principal_amount, self.interest_rate, self.term_months)
        })
    }
}

/// Partial loan edit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoanUpdate {
    pub lender_name: Option<String>,
    pub loan_type: Option<LoanType>,
    pub principal_amount: Option<f64>,
    pub remaining_balance: Option<f64>,
    pub interest_rate: Option<f64>,
    pub term_months: Option<i64>,
    pub monthly_payment: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<LoanStatus>,
}

impl LoanUpdate {
    /// Apply over an existing loan and re-check every invariant
    pub fn apply_to(&self, loan: &LoanAccount) -> Result<LoanAccount> {
        let mut updated = loan.clone();
        if let Some(ref lender) = self.lender_name {
            updated.lender_name = lender.clone();
        }
        if let Some(loan_type) = self.loan_type {
            updated.loan_type = loan_type;
        }
        if let Some(v) = self.principal_amount {
            updated.principal_amount = round2(v);
        }
        if let Some(v) = self.remaining_balance {
            updated.remaining_balance = round2(v);
        }
        if let Some(v) = self.interest_rate {
            updated.interest_rate = v;
        }
        if let Some(v) = self.term_months {
            updated.term_months = v;
        }
        if let Some(v) = self.start_date {
            updated.start_date = v;
        }
        if let Some(v) = self.end_date {
            updated.end_date = v;
        }
        if let Some(v) = self.status {
            updated.status = v;
        }
        updated.monthly_payment = match self.monthly_payment {
            Some(v) => round2(v),
            None if self.principal_amount.is_some()
                || self.interest_rate.is_some()
                || self.term_months.is_some() =>
            {
                amortized_payment(
                    updated.principal_amount,
                    updated.interest_rate,
                    updated.term_months,
                )
            }
            None => updated.monthly_payment,
        };

        validate_loan_terms(
            &updated.account_number,
            &updated.lender_name,
            updated.principal_amount,
            updated.remaining_balance,
            updated.interest_rate,
            updated.term_months,
            updated.monthly_payment,
            updated.start_date,
            updated.end_date,
        )?;
        Ok(updated)
    }
}

// ========== Reports ==========

/// Record of one generated credit report document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditReportRequest {
    pub id: i64,
    pub user_id: i64,
    /// Document file name inside the reports directory
    pub file_name: String,
    pub content_hash: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

// ========== Sentiment ==========

/// Five-step sentiment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentOrdinal {
    #[serde(rename = "Very Positive")]
    VeryPositive,
    Positive,
    Neutral,
    Negative,
    #[serde(rename = "Very Negative")]
    VeryNegative,
}

impl SentimentOrdinal {
    /// Map an intensity in [-1, 1] to its label
    pub fn from_intensity(intensity: f64) -> Self {
        if intensity >= 0.6 {
            Self::VeryPositive
        } else if intensity >= 0.2 {
            Self::Positive
        } else if intensity > -0.2 {
            Self::Neutral
        } else if intensity > -0.6 {
            Self::Negative
        } else {
            Self::VeryNegative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryPositive => "Very Positive",
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
            Self::VeryNegative => "Very Negative",
        }
    }
}

impl std::str::FromStr for SentimentOrdinal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "very positive" => Ok(Self::VeryPositive),
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            "very negative" => Ok(Self::VeryNegative),
            _ => Err(format!("Unknown sentiment: {}", s)),
        }
    }
}

impl std::fmt::Display for SentimentOrdinal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored survey answer with its classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResponse {
    pub id: i64,
    pub user_id: i64,
    pub response_text: String,
    /// Intensity in [-1, 1]
    pub sentiment_score: f64,
    pub ordinal_sentiment: SentimentOrdinal,
    pub created_at: DateTime<Utc>,
}

/// Running per-user aggregate, appended after every response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentHistoryEntry {
    pub id: i64,
    pub user_id: i64,
    pub average_intensity_score: f64,
    pub average_ordinal_sentiment: SentimentOrdinal,
    /// 0-100 scale
    pub personal_sentiment_score: f64,
    pub recorded_at: DateTime<Utc>,
}
