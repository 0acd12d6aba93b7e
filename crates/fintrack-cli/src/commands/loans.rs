//! Loan account command implementations

use anyhow::{bail, Context, Result};
use chrono::Local;
use fintrack_core::config::due_window_days;
use fintrack_core::db::Database;
use fintrack_core::models::{LoanAccount, NewLoanAccount};

use super::{find_user, truncate};

fn print_loans(loans: &[LoanAccount]) {
    println!(
        "{:>5} {:<16} {:<20} {:<10} {:>12} {:>12} {:<10} {:<9}",
        "ID", "Account", "Lender", "Type", "Principal", "Balance", "Ends", "Status"
    );
    println!("{}", "-".repeat(101));

    for loan in loans {
        println!(
            "{:>5} {:<16} {:<20} {:<10} {:>12.2} {:>12.2} {:<10} {:<9}",
            loan.id,
            truncate(&loan.account_number, 16),
            truncate(&loan.lender_name, 20),
            loan.loan_type.as_str(),
            loan.principal_amount,
            loan.remaining_balance,
            loan.end_date,
            loan.status.as_str()
        );
    }
}

pub fn cmd_loans_list(db: &Database, user_email: &str) -> Result<()> {
    let user = find_user(db, user_email)?;
    let loans = db.list_loans(user.id)?;

    if loans.is_empty() {
        println!("No loans for {}", user.email);
        return Ok(());
    }

    println!("💳 Loans for {} ({})", user.email, loans.len());
    println!();
    print_loans(&loans);
    Ok(())
}

pub fn cmd_loans_add(db: &Database, user_email: &str, loan_json: &str) -> Result<LoanAccount> {
    let new_loan: NewLoanAccount = serde_json::from_str(loan_json).context("Invalid loan JSON")?;
    let user = db.ensure_user(user_email)?;

    let loan = db.create_loan(user.id, &new_loan)?;
    println!(
        "✅ Added loan {} ({}, {:.2} over {} months, {:.2}/month)",
        loan.id, loan.lender_name, loan.principal_amount, loan.term_months, loan.monthly_payment
    );
    Ok(loan)
}

pub fn cmd_loans_pay(db: &Database, id: i64, amount: f64) -> Result<LoanAccount> {
    if db.get_loan(id)?.is_none() {
        bail!("Loan not found: {}", id);
    }

    let loan = db.record_payment(id, amount)?;
    println!(
        "✅ Recorded payment of {:.2} on loan {}: balance {:.2} ({})",
        amount,
        loan.id,
        loan.remaining_balance,
        loan.status.as_str()
    );
    Ok(loan)
}

pub fn cmd_loans_due(db: &Database, user_email: &str, days: Option<i64>) -> Result<()> {
    let window = days.unwrap_or_else(due_window_days);
    if window < 0 {
        bail!("Window must be zero or more days");
    }

    let user = find_user(db, user_email)?;
    let today = Local::now().date_naive();
    let loans = db.list_due_loans(user.id, today, window)?;

    if loans.is_empty() {
        println!("No loans due within {} days for {}", window, user.email);
        return Ok(());
    }

    println!("⏰ Loans due within {} days for {}", window, user.email);
    println!();
    print_loans(&loans);
    Ok(())
}
