//! # Bank Repository
//!
//! Bank accounts and their transactions.
//!
//! `bank_accounts.balance_cents` is the running sum of the account's
//! transactions (plus its opening balance); it only moves through
//! [`adjust_account_balance`].

use sqlx::{Executor, Sqlite, SqlitePool};
use tally_core::{BankAccount, BankTransaction, Money};
use tracing::debug;

use super::Tx;
use crate::error::{DbError, DbResult};

const ACCOUNT_SELECT: &str = r#"
    SELECT id, bank_name, account_number, account_holder, balance_cents, created_at
    FROM bank_accounts
"#;

const TRANSACTION_SELECT: &str = r#"
    SELECT id, account_id, order_id, partner_id, transaction_type, amount_cents,
           note, occurred_at, created_at
    FROM bank_transactions
"#;

// =============================================================================
// Query Helpers
// =============================================================================

pub(crate) async fn fetch_account<'e, E>(executor: E, id: &str) -> DbResult<Option<BankAccount>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{ACCOUNT_SELECT} WHERE id = ?1");
    let account = sqlx::query_as::<_, BankAccount>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(account)
}

pub(crate) async fn fetch_transaction<'e, E>(executor: E, id: &str) -> DbResult<Option<BankTransaction>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{TRANSACTION_SELECT} WHERE id = ?1");
    let txn = sqlx::query_as::<_, BankTransaction>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(txn)
}

/// Bank transactions generated by an order.
pub(crate) async fn transactions_for_order<'e, E>(
    executor: E,
    order_id: &str,
) -> DbResult<Vec<BankTransaction>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{TRANSACTION_SELECT} WHERE order_id = ?1 ORDER BY created_at, id");
    let txns = sqlx::query_as::<_, BankTransaction>(&sql)
        .bind(order_id)
        .fetch_all(executor)
        .await?;
    Ok(txns)
}

pub(crate) async fn insert_account(tx: &mut Tx<'_>, account: &BankAccount) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bank_accounts (
            id, bank_name, account_number, account_holder, balance_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&account.id)
    .bind(&account.bank_name)
    .bind(&account.account_number)
    .bind(&account.account_holder)
    .bind(account.balance_cents)
    .bind(account.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => {
            DbError::duplicate("account_number", account.account_number.clone())
        }
        other => other,
    })?;
    Ok(())
}

pub(crate) async fn insert_transaction(tx: &mut Tx<'_>, txn: &BankTransaction) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bank_transactions (
            id, account_id, order_id, partner_id, transaction_type, amount_cents,
            note, occurred_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&txn.id)
    .bind(&txn.account_id)
    .bind(&txn.order_id)
    .bind(&txn.partner_id)
    .bind(txn.transaction_type)
    .bind(txn.amount_cents)
    .bind(&txn.note)
    .bind(txn.occurred_at)
    .bind(txn.created_at)
    .execute(&mut **tx)
    .await?;

    debug!(id = %txn.id, account_id = %txn.account_id, amount = txn.amount_cents, "Bank transaction inserted");
    Ok(())
}

pub(crate) async fn delete_transaction_row(tx: &mut Tx<'_>, id: &str) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM bank_transactions WHERE id = ?1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::consistency(format!(
            "bank transaction {} vanished while deleting",
            id
        )));
    }
    Ok(())
}

/// Adds `delta` to an account's balance and returns the new balance.
pub(crate) async fn adjust_account_balance(
    tx: &mut Tx<'_>,
    account_id: &str,
    delta: Money,
) -> DbResult<Money> {
    let balance: Option<i64> = sqlx::query_scalar(
        "UPDATE bank_accounts SET balance_cents = balance_cents + ?1 WHERE id = ?2 RETURNING balance_cents",
    )
    .bind(delta.cents())
    .bind(account_id)
    .fetch_optional(&mut **tx)
    .await?;

    let balance = balance.ok_or_else(|| {
        DbError::consistency(format!("bank account {} vanished while adjusting balance", account_id))
    })?;

    debug!(account_id = %account_id, delta = delta.cents(), balance, "Account balance adjusted");
    Ok(Money::from_cents(balance))
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to accounts and transactions.
///
/// Writes go through [`BankService`](crate::service::bank::BankService) or
/// the order service.
#[derive(Debug, Clone)]
pub struct BankRepository {
    pool: SqlitePool,
}

impl BankRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BankRepository { pool }
    }

    pub async fn get_account(&self, id: &str) -> DbResult<Option<BankAccount>> {
        fetch_account(&self.pool, id).await
    }

    pub async fn list_accounts(&self) -> DbResult<Vec<BankAccount>> {
        let sql = format!("{ACCOUNT_SELECT} ORDER BY bank_name, account_number");
        let accounts = sqlx::query_as::<_, BankAccount>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    pub async fn get_transaction(&self, id: &str) -> DbResult<Option<BankTransaction>> {
        fetch_transaction(&self.pool, id).await
    }

    /// An account's transactions, newest first.
    pub async fn transactions_for_account(&self, account_id: &str) -> DbResult<Vec<BankTransaction>> {
        let sql = format!(
            "{TRANSACTION_SELECT} WHERE account_id = ?1 ORDER BY occurred_at DESC, created_at DESC"
        );
        let txns = sqlx::query_as::<_, BankTransaction>(&sql)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(txns)
    }

    pub async fn transactions_for_order(&self, order_id: &str) -> DbResult<Vec<BankTransaction>> {
        transactions_for_order(&self.pool, order_id).await
    }
}
