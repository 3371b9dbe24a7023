//! Expense Repository

use super::{RepoError, RepoResult};
use shared::models::{Expense, ExpenseCreate};
use sqlx::SqlitePool;

pub async fn create(pool: &SqlitePool, data: ExpenseCreate) -> RepoResult<Expense> {
    if data.title.trim().is_empty() {
        return Err(RepoError::Validation("Expense title is required".into()));
    }
    if !data.amount.is_finite() || data.amount < 0.0 {
        return Err(RepoError::Validation(format!(
            "Expense amount must be a non-negative number, got {}",
            data.amount
        )));
    }

    let now = shared::util::now_millis();
    let expense = Expense {
        id: shared::util::snowflake_id(),
        title: data.title,
        amount: data.amount,
        category: data.category.unwrap_or_default(),
        notes: data.notes,
        expense_date: data.expense_date.unwrap_or(now),
        created_at: now,
    };
    sqlx::query(
        "INSERT INTO expense (id, title, amount, category, notes, expense_date, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(expense.id)
    .bind(&expense.title)
    .bind(expense.amount)
    .bind(&expense.category)
    .bind(&expense.notes)
    .bind(expense.expense_date)
    .bind(expense.created_at)
    .execute(pool)
    .await?;
    Ok(expense)
}

/// Expenses with `start <= expense_date < end`, newest first
pub async fn find_by_range(pool: &SqlitePool, start: i64, end: i64) -> RepoResult<Vec<Expense>> {
    let expenses = sqlx::query_as::<_, Expense>(
        "SELECT id, title, amount, category, notes, expense_date, created_at FROM expense WHERE expense_date >= ? AND expense_date < ? ORDER BY expense_date DESC",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;
    Ok(expenses)
}
