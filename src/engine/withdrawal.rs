//! Withdrawal lifecycle.
//!
//! Requesting a withdrawal debits the balance and reserves the oldest
//! earnings covering the amount before any gateway call, so the funds can
//! never be spent twice while a transfer is in flight. The gateway settles the
//! transfer asynchronously via webhook; every settlement path is idempotent
//! against replays through the withdrawal's own state.

use rusqlite::Connection;

use crate::db::{queries, DbPool};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::gateway::GatewayClient;
use crate::models::{EarningStatus, User, Withdrawal, WithdrawalStatus};

/// Payout transfers are denominated in the platform settlement currency.
const PAYOUT_CURRENCY: &str = "USD";

/// Outcome of applying a gateway transfer event.
#[derive(Debug)]
pub enum TransferResult {
    Applied(Withdrawal),
    /// The withdrawal was already settled (duplicate delivery).
    AlreadyProcessed(Withdrawal),
}

/// Request a withdrawal of a user's full or partial available balance.
///
/// Two transactions bracket the gateway call. The first reserves the funds
/// (debit, covering earnings to WITHDRAWAL_PENDING, PENDING row) and commits
/// before we talk to the network; the second records the gateway's answer. When
/// initiation fails the reservation is compensated in full and the gateway
/// error is returned to the caller.
pub async fn request(
    db: &DbPool,
    gateway: &GatewayClient,
    user: &User,
    amount_cents: i64,
) -> Result<Withdrawal> {
    if amount_cents <= 0 {
        return Err(AppError::BadRequest(
            "Withdrawal amount must be positive".into(),
        ));
    }

    let withdrawal = {
        let mut conn = db.get()?;
        let tx = conn.transaction()?;
        queries::debit_balance(&tx, &user.id, amount_cents)?;
        let withdrawal = queries::create_withdrawal(&tx, &user.id, amount_cents)?;
        queries::reserve_seller_earnings(&tx, &user.id, &withdrawal.id, amount_cents)?;
        tx.commit()?;
        withdrawal
    };

    match gateway
        .initiate_transfer(&withdrawal.id, &user.id, amount_cents, PAYOUT_CURRENCY)
        .await
    {
        Ok(outcome) => {
            let mut conn = db.get()?;
            let tx = conn.transaction()?;
            queries::mark_withdrawal_processing(&tx, &withdrawal.id, &outcome.transfer_id)?;
            let updated = queries::get_withdrawal_by_id(&tx, &withdrawal.id)?
                .or_not_found(msg::WITHDRAWAL_NOT_FOUND)?;
            tx.commit()?;

            tracing::info!(
                "Withdrawal {} processing: transfer {} for {} cents",
                updated.id,
                outcome.transfer_id,
                amount_cents
            );
            Ok(updated)
        }
        Err(e) => {
            let mut conn = db.get()?;
            let tx = conn.transaction()?;
            queries::mark_withdrawal_failed(&tx, &withdrawal.id, &e.to_string())?;
            queries::credit_balance(&tx, &user.id, amount_cents)?;
            queries::transition_withdrawal_earnings(
                &tx,
                &withdrawal.id,
                EarningStatus::WithdrawalPending,
                EarningStatus::Available,
            )?;
            tx.commit()?;

            tracing::warn!("Withdrawal {} failed at initiation: {}", withdrawal.id, e);
            Err(e)
        }
    }
}

/// Gateway confirmed the transfer settled.
pub fn complete_transfer(conn: &mut Connection, transfer_id: &str) -> Result<TransferResult> {
    let tx = conn.transaction()?;

    let withdrawal = queries::get_withdrawal_by_transfer_id(&tx, transfer_id)?
        .or_not_found(msg::WITHDRAWAL_NOT_FOUND)?;
    if withdrawal.status.is_terminal() {
        return Ok(TransferResult::AlreadyProcessed(withdrawal));
    }

    queries::mark_withdrawal_completed(&tx, &withdrawal.id)?;
    // Only the earnings reserved by this withdrawal settle; anything else
    // the seller has earned stays AVAILABLE.
    queries::transition_withdrawal_earnings(
        &tx,
        &withdrawal.id,
        EarningStatus::WithdrawalPending,
        EarningStatus::Withdrawn,
    )?;

    let updated = queries::get_withdrawal_by_id(&tx, &withdrawal.id)?
        .or_not_found(msg::WITHDRAWAL_NOT_FOUND)?;
    tx.commit()?;

    tracing::info!("Withdrawal {} completed (transfer {})", updated.id, transfer_id);
    Ok(TransferResult::Applied(updated))
}

/// Gateway reported the transfer failed before settling. The reserved funds
/// go back to the user in the same transaction that records the failure.
pub fn fail_transfer(
    conn: &mut Connection,
    transfer_id: &str,
    reason: Option<&str>,
) -> Result<TransferResult> {
    let tx = conn.transaction()?;

    let withdrawal = queries::get_withdrawal_by_transfer_id(&tx, transfer_id)?
        .or_not_found(msg::WITHDRAWAL_NOT_FOUND)?;
    if withdrawal.status.is_terminal() {
        return Ok(TransferResult::AlreadyProcessed(withdrawal));
    }

    let reason = reason.unwrap_or("Transfer failed");
    queries::mark_withdrawal_failed(&tx, &withdrawal.id, reason)?;
    queries::credit_balance(&tx, &withdrawal.user_id, withdrawal.amount_cents)?;
    queries::transition_withdrawal_earnings(
        &tx,
        &withdrawal.id,
        EarningStatus::WithdrawalPending,
        EarningStatus::Available,
    )?;

    let updated = queries::get_withdrawal_by_id(&tx, &withdrawal.id)?
        .or_not_found(msg::WITHDRAWAL_NOT_FOUND)?;
    tx.commit()?;

    tracing::warn!(
        "Withdrawal {} failed (transfer {}): {}",
        updated.id,
        transfer_id,
        reason
    );
    Ok(TransferResult::Applied(updated))
}

/// Gateway clawed back a transfer that had already completed. The
/// compensating credit is guarded by the reversal stamp, so a replayed
/// reversal event credits the user exactly once.
pub fn reverse_transfer(conn: &mut Connection, transfer_id: &str) -> Result<TransferResult> {
    let tx = conn.transaction()?;

    let withdrawal = queries::get_withdrawal_by_transfer_id(&tx, transfer_id)?
        .or_not_found(msg::WITHDRAWAL_NOT_FOUND)?;

    // Reversals only apply to completed transfers. A PROCESSING withdrawal
    // getting reversed is handled as a plain failure.
    if withdrawal.status == WithdrawalStatus::Processing {
        drop(tx);
        return fail_transfer(conn, transfer_id, Some("Transfer reversed by gateway"));
    }

    if !queries::try_mark_withdrawal_reversed(&tx, &withdrawal.id)? {
        return Ok(TransferResult::AlreadyProcessed(withdrawal));
    }

    queries::credit_balance(&tx, &withdrawal.user_id, withdrawal.amount_cents)?;
    queries::transition_withdrawal_earnings(
        &tx,
        &withdrawal.id,
        EarningStatus::Withdrawn,
        EarningStatus::Available,
    )?;

    let updated = queries::get_withdrawal_by_id(&tx, &withdrawal.id)?
        .or_not_found(msg::WITHDRAWAL_NOT_FOUND)?;
    tx.commit()?;

    tracing::warn!(
        "Withdrawal {} reversed by gateway (transfer {}), user {} re-credited {}",
        updated.id,
        transfer_id,
        updated.user_id,
        updated.amount_cents
    );
    Ok(TransferResult::Applied(updated))
}
