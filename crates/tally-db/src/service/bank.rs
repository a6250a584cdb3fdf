//! # Bank Service
//!
//! Bank accounts and manual bank transactions.
//!
//! Transactions generated by a Transfer order belong to that order: they are
//! created, replaced and removed only through the order service.

use chrono::Utc;
use sqlx::SqlitePool;
use tally_core::mutators::bank_balance_delta;
use tally_core::validation::{validate_amount, validate_bank_name, validate_positive_amount};
use tally_core::{
    new_id, BankAccount, BankTransaction, BankTransactionRequest, CoreError, NewBankAccount,
    ValidationError,
};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::WriteGate;
use crate::repository::bank::{
    adjust_account_balance, delete_transaction_row, fetch_account, fetch_transaction,
    insert_account, insert_transaction,
};
use crate::repository::partner::require_partner;

#[derive(Debug, Clone)]
pub struct BankService {
    pool: SqlitePool,
    gate: WriteGate,
}

impl BankService {
    pub fn new(pool: SqlitePool, gate: WriteGate) -> Self {
        BankService { pool, gate }
    }

    /// Opens an account. The opening balance is stored as the starting
    /// balance, not as a transaction.
    pub async fn create_account(&self, new: NewBankAccount) -> DbResult<BankAccount> {
        validate_bank_name(&new.bank_name)?;
        validate_amount("opening_balance_cents", new.opening_balance_cents)?;
        let account_number = new.account_number.trim().to_string();
        if account_number.is_empty() {
            return Err(ValidationError::Required {
                field: "account_number".to_string(),
            }
            .into());
        }

        let account = BankAccount {
            id: new_id(),
            bank_name: new.bank_name.trim().to_string(),
            account_number,
            account_holder: new.account_holder,
            balance_cents: new.opening_balance_cents,
            created_at: Utc::now(),
        };

        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;
        insert_account(&mut tx, &account).await?;
        tx.commit().await?;

        info!(id = %account.id, bank = %account.bank_name, "Bank account created");
        Ok(account)
    }

    /// Records a manual deposit or withdrawal.
    pub async fn create_transaction(&self, req: BankTransactionRequest) -> DbResult<BankTransaction> {
        validate_positive_amount("amount_cents", req.amount_cents)?;

        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        fetch_account(&mut *tx, &req.account_id)
            .await?
            .ok_or_else(|| DbError::not_found("BankAccount", req.account_id.clone()))?;
        if let Some(partner_id) = &req.partner_id {
            require_partner(&mut tx, partner_id).await?;
        }

        let now = Utc::now();
        let txn = BankTransaction {
            id: new_id(),
            account_id: req.account_id,
            order_id: None,
            partner_id: req.partner_id,
            transaction_type: req.transaction_type,
            amount_cents: req.amount_cents,
            note: req.note,
            occurred_at: req.occurred_at.unwrap_or(now),
            created_at: now,
        };
        insert_transaction(&mut tx, &txn).await?;
        let balance = adjust_account_balance(
            &mut tx,
            &txn.account_id,
            bank_balance_delta(txn.transaction_type, txn.amount()),
        )
        .await?;

        tx.commit().await?;

        info!(
            id = %txn.id,
            account_id = %txn.account_id,
            kind = ?txn.transaction_type,
            amount = %txn.amount(),
            balance = %balance,
            "Bank transaction created"
        );
        Ok(txn)
    }

    /// Deletes a manual transaction and reverses it on the account.
    pub async fn delete_transaction(&self, id: &str) -> DbResult<()> {
        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let txn = fetch_transaction(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("BankTransaction", id))?;
        if let Some(order_id) = txn.order_id {
            return Err(CoreError::LinkedToOrder {
                entity: "Bank transaction".to_string(),
                id: id.to_string(),
                order_id,
            }
            .into());
        }

        adjust_account_balance(
            &mut tx,
            &txn.account_id,
            -bank_balance_delta(txn.transaction_type, txn.amount()),
        )
        .await?;
        delete_transaction_row(&mut tx, id).await?;

        tx.commit().await?;

        info!(id = %id, account_id = %txn.account_id, "Bank transaction deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::{
        BankTransactionType, ErrorKind, NewProduct, OrderLineRequest, OrderRequest, OrderType,
        PaymentMethod,
    };

    async fn setup() -> (Database, BankAccount) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let account = db
            .bank()
            .create_account(NewBankAccount {
                bank_name: "City Bank".to_string(),
                account_number: "123-456".to_string(),
                account_holder: Some("Shop".to_string()),
                opening_balance_cents: 50_000,
            })
            .await
            .unwrap();
        (db, account)
    }

    fn manual(account_id: &str, kind: BankTransactionType, amount: i64) -> BankTransactionRequest {
        BankTransactionRequest {
            account_id: account_id.to_string(),
            partner_id: None,
            transaction_type: kind,
            amount_cents: amount,
            note: Some("Rent".to_string()),
            occurred_at: None,
        }
    }

    async fn account_balance(db: &Database, id: &str) -> i64 {
        db.bank_records().get_account(id).await.unwrap().unwrap().balance_cents
    }

    #[tokio::test]
    async fn test_manual_transaction_round_trip() {
        let (db, account) = setup().await;

        let txn = db
            .bank()
            .create_transaction(manual(&account.id, BankTransactionType::Withdrawal, 20_000))
            .await
            .unwrap();
        assert_eq!(account_balance(&db, &account.id).await, 30_000);

        let listed = db.bank_records().transactions_for_account(&account.id).await.unwrap();
        assert_eq!(listed.len(), 1);

        db.bank().delete_transaction(&txn.id).await.unwrap();
        assert_eq!(account_balance(&db, &account.id).await, 50_000);
    }

    #[tokio::test]
    async fn test_duplicate_account_number() {
        let (db, _account) = setup().await;
        let err = db
            .bank()
            .create_account(NewBankAccount {
                bank_name: "Other Bank".to_string(),
                account_number: "123-456".to_string(),
                account_holder: None,
                opening_balance_cents: 0,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_invalid_transactions_rejected() {
        let (db, account) = setup().await;

        let err = db
            .bank()
            .create_transaction(manual(&account.id, BankTransactionType::Deposit, 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = db
            .bank()
            .create_transaction(manual("ghost", BankTransactionType::Deposit, 100))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[tokio::test]
    async fn test_order_owned_transaction_cannot_be_deleted_directly() {
        let (db, account) = setup().await;
        let tea = db
            .products()
            .insert(NewProduct {
                sku: None,
                name: "Tea".to_string(),
                unit: "pcs".to_string(),
                secondary_unit: None,
                multiplier: 1,
                cost_cents: 500,
                price_cents: 1_000,
                stock: 10,
                expiry_date: None,
                is_bundle: false,
            })
            .await
            .unwrap();

        let order = db
            .orders()
            .create(OrderRequest {
                partner_id: None,
                order_type: OrderType::Purchase,
                payment_method: PaymentMethod::Transfer,
                lines: vec![OrderLineRequest {
                    product_id: tea.id.clone(),
                    quantity: 2,
                    unit_price_cents: 700,
                    name_override: None,
                }],
                upfront_cents: 0,
                bank_account_id: Some(account.id.clone()),
                note: None,
                occurred_at: None,
            })
            .await
            .unwrap()
            .order;
        assert_eq!(account_balance(&db, &account.id).await, 48_600);

        let txns = db.bank_records().transactions_for_order(&order.id).await.unwrap();
        assert_eq!(txns[0].transaction_type, BankTransactionType::Withdrawal);

        let err = db.bank().delete_transaction(&txns[0].id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(account_balance(&db, &account.id).await, 48_600);
    }
}
