//! The payment state machine.
//!
//! States: INITIATED -> SUCCESSFUL_ESCROW -> {RELEASED_TO_SELLER |
//! REFUNDED_TO_BUYER}, with DISPUTED reachable from escrow and FAILED /
//! CANCELLED terminal from INITIATED. Terminal states admit no further
//! transition; attempts are rejected with `Conflict` and mutate nothing.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{msg, AppError, OptionExt, Result};
use crate::fees;
use crate::models::{
    Actor, ChargeOutcome, DisputeStatus, ItemStatus, Payment, PaymentStatus,
};

use super::ledger;

/// Requested payment transition, for authorization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    ConfirmReceipt,
    Release,
    Refund,
}

/// Outcome of applying a gateway charge event.
#[derive(Debug)]
pub enum ChargeResult {
    Applied(Payment),
    /// The payment was already past INITIATED (duplicate delivery, or a
    /// racing admin action committed first).
    AlreadyProcessed(Payment),
}

/// Pure authorization check: is `actor` allowed to request `transition`
/// on a payment in this state? `Forbidden` when the actor may never
/// perform it on this payment; `Conflict` when the actor could, but the
/// current state does not allow it.
pub fn authorize(actor: &Actor, payment: &Payment, transition: Transition) -> Result<()> {
    match transition {
        Transition::ConfirmReceipt => {
            match actor {
                Actor::Buyer(id) if id == &payment.buyer_id => {}
                _ => return Err(AppError::Forbidden(msg::NOT_PARTY_TO_PAYMENT.into())),
            }
            if !payment.status.in_escrow() {
                return Err(AppError::Conflict(msg::PAYMENT_NOT_IN_ESCROW.into()));
            }
            Ok(())
        }
        Transition::Release => {
            let legal = match actor {
                Actor::Admin(_) => {
                    payment.status.in_escrow() || payment.status == PaymentStatus::Disputed
                }
                Actor::Buyer(id) if id == &payment.buyer_id => payment.status.in_escrow(),
                _ => return Err(AppError::Forbidden(msg::NOT_PARTY_TO_PAYMENT.into())),
            };
            if !legal {
                return Err(conflict_for(payment.status));
            }
            Ok(())
        }
        Transition::Refund => {
            if !actor.is_admin() {
                return Err(AppError::Forbidden(msg::ADMIN_REQUIRED.into()));
            }
            if !(payment.status.in_escrow() || payment.status == PaymentStatus::Disputed) {
                return Err(conflict_for(payment.status));
            }
            Ok(())
        }
    }
}

fn conflict_for(status: PaymentStatus) -> AppError {
    if status.is_terminal() {
        AppError::Conflict(msg::PAYMENT_ALREADY_TERMINAL.into())
    } else {
        AppError::Conflict(msg::PAYMENT_NOT_IN_ESCROW.into())
    }
}

/// Apply a gateway charge outcome to an INITIATED payment.
///
/// Gateways deliver at least once, so this is idempotent two ways: the
/// provider event id is claimed in `webhook_events` inside the same
/// transaction, and a payment already past INITIATED short-circuits to
/// `AlreadyProcessed` without mutating anything.
pub fn apply_gateway_charge_event(
    conn: &mut Connection,
    payment_id: &str,
    outcome: ChargeOutcome,
    failure_reason: Option<&str>,
    gateway_transaction_id: Option<&str>,
    event_id: Option<&str>,
) -> Result<ChargeResult> {
    let tx = conn.transaction()?;

    let payment =
        queries::get_payment_by_id(&tx, payment_id)?.or_not_found(msg::PAYMENT_NOT_FOUND)?;

    if let Some(eid) = event_id {
        if !queries::try_record_webhook_event(&tx, &payment.gateway, eid)? {
            return Ok(ChargeResult::AlreadyProcessed(payment));
        }
    }

    if payment.status != PaymentStatus::Initiated {
        // No commit: the event-id claim rolls back with the transaction,
        // which is fine - the state check will short-circuit again.
        return Ok(ChargeResult::AlreadyProcessed(payment));
    }

    match outcome {
        ChargeOutcome::Success => {
            queries::mark_payment_escrowed(&tx, payment_id, gateway_transaction_id)?;
            // The unit leaves the shelf when the money enters escrow; a
            // refund puts it back.
            queries::sell_item_unit(&tx, &payment.item_id)?;
            queries::set_item_status(&tx, &payment.item_id, ItemStatus::PaidEscrow)?;
        }
        ChargeOutcome::Failure => {
            let reason = failure_reason.unwrap_or("Charge failed");
            queries::mark_payment_failed(&tx, payment_id, reason, gateway_transaction_id)?;
        }
    }

    let updated =
        queries::get_payment_by_id(&tx, payment_id)?.or_not_found(msg::PAYMENT_NOT_FOUND)?;
    tx.commit()?;

    tracing::info!(
        "Charge {} for payment {}: {} -> {}",
        match outcome {
            ChargeOutcome::Success => "succeeded",
            ChargeOutcome::Failure => "failed",
        },
        payment_id,
        payment.status,
        updated.status
    );

    Ok(ChargeResult::Applied(updated))
}

/// Buyer confirms receipt of the item, which releases the escrowed funds.
pub fn confirm_receipt(conn: &mut Connection, payment_id: &str, actor: &Actor) -> Result<Payment> {
    let tx = conn.transaction()?;

    let payment =
        queries::get_payment_by_id(&tx, payment_id)?.or_not_found(msg::PAYMENT_NOT_FOUND)?;
    authorize(actor, &payment, Transition::ConfirmReceipt)?;

    let updated = release_in_tx(&tx, &payment, actor)?;
    tx.commit()?;
    Ok(updated)
}

/// Release escrowed funds to the seller.
pub fn release(conn: &mut Connection, payment_id: &str, actor: &Actor) -> Result<Payment> {
    let tx = conn.transaction()?;

    let payment =
        queries::get_payment_by_id(&tx, payment_id)?.or_not_found(msg::PAYMENT_NOT_FOUND)?;
    authorize(actor, &payment, Transition::Release)?;

    let updated = release_in_tx(&tx, &payment, actor)?;
    tx.commit()?;
    Ok(updated)
}

/// Refund the escrowed amount to the buyer.
pub fn refund(conn: &mut Connection, payment_id: &str, actor: &Actor) -> Result<Payment> {
    let tx = conn.transaction()?;

    let payment =
        queries::get_payment_by_id(&tx, payment_id)?.or_not_found(msg::PAYMENT_NOT_FOUND)?;
    authorize(actor, &payment, Transition::Refund)?;

    let updated = refund_in_tx(&tx, &payment)?;
    tx.commit()?;
    Ok(updated)
}

/// Release body, run inside the caller's transaction. The caller has
/// already authorized the transition.
///
/// Fee evaluation, stock decrement, seller credit, ledger entries, fee
/// total increment, dispute close and the status flip commit or roll back
/// together.
pub(crate) fn release_in_tx(tx: &Connection, payment: &Payment, actor: &Actor) -> Result<Payment> {
    let rules = queries::list_active_fee_rules(tx)?;
    let settings = queries::get_platform_settings(tx)?
        .ok_or_else(|| AppError::Internal("Platform settings row missing".into()))?;
    let quote = fees::evaluate(payment.amount_cents, &rules, settings.default_fee_bps);

    ledger::apply_release(tx, payment, &quote)?;

    // A release forced out of a dispute resolves that dispute in the
    // seller's favor.
    if let Some(dispute) = queries::get_open_dispute_for_payment(tx, &payment.id)? {
        queries::close_dispute(tx, &dispute.id, DisputeStatus::ResolvedReleasePayment, None)?;
    }

    queries::mark_payment_released(tx, &payment.id, quote.fee_cents)?;

    tracing::info!(
        "Payment {} released by {:?}: amount={} fee={} net={} rule={:?}",
        payment.id,
        actor,
        payment.amount_cents,
        quote.fee_cents,
        quote.net_cents,
        quote.applied_rule_id
    );

    queries::get_payment_by_id(tx, &payment.id)?.or_not_found(msg::PAYMENT_NOT_FOUND)
}

/// Refund body, run inside the caller's transaction. The caller has
/// already authorized the transition.
pub(crate) fn refund_in_tx(tx: &Connection, payment: &Payment) -> Result<Payment> {
    ledger::apply_refund(tx, payment)?;

    if let Some(dispute) = queries::get_open_dispute_for_payment(tx, &payment.id)? {
        queries::close_dispute(tx, &dispute.id, DisputeStatus::ResolvedRefund, None)?;
    }

    queries::mark_payment_refunded(tx, &payment.id)?;

    tracing::info!(
        "Payment {} refunded: buyer {} credited {}",
        payment.id,
        payment.buyer_id,
        payment.amount_cents
    );

    queries::get_payment_by_id(tx, &payment.id)?.or_not_found(msg::PAYMENT_NOT_FOUND)
}
