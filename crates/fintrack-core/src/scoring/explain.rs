//! Human-readable explanations of the factors behind a score

use crate::models::ProfileFeatures;

/// Explanations for display, most influential factor first.
///
/// Thresholds mirror the band tables; some factors only produce a line when
/// they are notable (short employment, heavy debt payments).
pub fn explain(f: &ProfileFeatures) -> Vec<String> {
    let mut factors = Vec::with_capacity(9);

    factors.push(
        if f.payment_history >= 0.99 {
            "Excellent payment history: You have a perfect or near-perfect payment record, which significantly boosts your score."
        } else if f.payment_history >= 0.94 {
            "Good payment history: You have a strong payment record with few late payments."
        } else if f.payment_history >= 0.85 {
            "Fair payment history: You have some late payments that are affecting your score. Focus on making all payments on time."
        } else {
            "Poor payment history: Your payment history shows multiple late payments or defaults. This is severely impacting your score. Make all future payments on time."
        }
        .to_string(),
    );

    factors.push(
        if f.credit_utilization <= 0.1 {
            "Excellent credit utilization: You're using less than 10% of your available credit, which is ideal."
        } else if f.credit_utilization <= 0.3 {
            "Good credit utilization: You're keeping your credit usage below 30%, which is recommended."
        } else if f.credit_utilization <= 0.5 {
            "High credit utilization: You're using more than 30% of your available credit. Try to pay down balances to improve your score."
        } else {
            "Very high credit utilization: You're using more than 50% of your available credit. This is significantly lowering your score. Focus on reducing your balances."
        }
        .to_string(),
    );

    factors.push(
        if f.credit_history_length >= 7.0 {
            "Excellent credit history length: Your credit history of 7+ years demonstrates long-term credit management."
        } else if f.credit_history_length >= 3.0 {
            "Good credit history length: Your credit history of 3+ years is solid but will improve with time."
        } else {
            "Short credit history: Your credit history is less than 3 years, which limits your score. This will naturally improve over time."
        }
        .to_string(),
    );

    factors.push(
        if f.debt_to_income <= 0.2 {
            "Excellent debt-to-income ratio: Your monthly debt payments are less than 20% of your income."
        } else if f.debt_to_income <= 0.36 {
            "Good debt-to-income ratio: Your monthly debt payments are within the recommended range (20-36% of income)."
        } else if f.debt_to_income <= 0.43 {
            "High debt-to-income ratio: Your monthly debt payments are between 36-43% of your income, which may concern lenders."
        } else {
            "Very high debt-to-income ratio: Your monthly debt payments exceed 43% of your income. This significantly impacts your creditworthiness. Consider reducing debt or increasing income."
        }
        .to_string(),
    );

    factors.push(if f.public_records == 0 {
        "No public records: You have no bankruptcies, tax liens, or judgments on your record."
            .to_string()
    } else {
        format!(
            "Public records present: You have {} public record(s) (bankruptcies, tax liens, or judgments) which severely impact your score.",
            f.public_records
        )
    });

    factors.push(if f.delinquent_accounts == 0 {
        "No delinquent accounts: You have no accounts that are currently past due.".to_string()
    } else {
        format!(
            "Delinquent accounts: You have {} account(s) that are currently past due. This is severely impacting your score. Bring these accounts current as soon as possible.",
            f.delinquent_accounts
        )
    });

    factors.push(
        if f.total_accounts >= 4 && f.credit_mix >= 0.6 {
            "Good credit mix: You have a healthy mix of different types of credit accounts."
        } else if f.total_accounts >= 4 {
            "Limited credit mix: Consider diversifying your credit types (e.g., credit cards, installment loans, mortgage) to improve your score."
        } else {
            "Few accounts: Having only a few credit accounts limits your credit mix. Consider adding different types of credit over time."
        }
        .to_string(),
    );

    if f.employment_length < 1.0 {
        factors.push(
            "Short employment history: Your employment length of less than 1 year may impact your creditworthiness. Longer employment demonstrates stability."
                .to_string(),
        );
    }

    if f.income > 0.0 && f.monthly_debt_payment > 0.0 {
        let ratio = f.monthly_debt_payment / f.income;
        if ratio > 0.3 {
            factors.push(format!(
                "High debt payment ratio: Your monthly debt payments are {:.1}% of your income. Reducing this ratio will improve your creditworthiness.",
                ratio * 100.0
            ));
        }
    }

    factors
}
