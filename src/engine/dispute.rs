//! Dispute workflow.
//!
//! Either party to an escrowed payment may open a dispute; at most one may
//! be open per payment at a time (backed by a partial unique index, so the
//! application check and the schema agree). Resolution is admin-only and
//! settles the money through the same release/refund paths as direct admin
//! action.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{msg, AppError, OptionExt, Result};
use crate::models::{
    Actor, CreateDispute, Dispute, DisputeStatus, ItemStatus, Payment,
};

use super::payment;

/// Admin decision on an open dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeOutcome {
    /// Buyer wins: full refund.
    Refund,
    /// Seller wins: funds released, fee applied.
    ReleasePayment,
}

/// Input for filing a dispute.
#[derive(Debug)]
pub struct FileDispute {
    pub payment_id: String,
    pub reason: String,
    pub description: Option<String>,
}

/// File a dispute against an escrowed payment.
///
/// The filer must be the buyer or the seller of the payment. Fails with
/// `Conflict` when the payment is not disputable or a dispute is already
/// open; a lost race on the open-dispute index surfaces the same way.
pub fn file(conn: &mut Connection, actor: &Actor, input: &FileDispute) -> Result<Dispute> {
    let tx = conn.transaction()?;

    let payment = queries::get_payment_by_id(&tx, &input.payment_id)?
        .or_not_found(msg::PAYMENT_NOT_FOUND)?;

    let (filed_by, other_party) = match actor {
        Actor::Buyer(id) if id == &payment.buyer_id => {
            (payment.buyer_id.clone(), payment.seller_id.clone())
        }
        Actor::Seller(id) if id == &payment.seller_id => {
            (payment.seller_id.clone(), payment.buyer_id.clone())
        }
        _ => return Err(AppError::Forbidden(msg::NOT_PARTY_TO_PAYMENT.into())),
    };

    if !payment.status.is_disputable() {
        if queries::get_open_dispute_for_payment(&tx, &payment.id)?.is_some() {
            return Err(AppError::Conflict(msg::DISPUTE_ALREADY_OPEN.into()));
        }
        return Err(AppError::Conflict(msg::PAYMENT_NOT_DISPUTABLE.into()));
    }
    if queries::get_open_dispute_for_payment(&tx, &payment.id)?.is_some() {
        return Err(AppError::Conflict(msg::DISPUTE_ALREADY_OPEN.into()));
    }

    let dispute = queries::create_dispute(
        &tx,
        &CreateDispute {
            payment_id: payment.id.clone(),
            item_id: payment.item_id.clone(),
            filed_by_user_id: filed_by,
            other_party_user_id: other_party,
            reason: input.reason.clone(),
            description: input.description.clone(),
        },
    )
    .map_err(|e| match e {
        // Unique-index violation from a racing filer.
        AppError::Database(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::Conflict(msg::DISPUTE_ALREADY_OPEN.into())
        }
        other => other,
    })?;

    queries::mark_payment_disputed(&tx, &payment.id, &dispute.id)?;

    // Flag the listing, but never un-sell or un-delist it.
    let item = queries::get_item_by_id(&tx, &payment.item_id)?.or_not_found(msg::ITEM_NOT_FOUND)?;
    if !matches!(item.status, ItemStatus::Sold | ItemStatus::Delisted) {
        queries::set_item_status(&tx, &payment.item_id, ItemStatus::Disputed)?;
    }

    tx.commit()?;

    tracing::info!(
        "Dispute {} filed on payment {} by {}: {}",
        dispute.id,
        dispute.payment_id,
        dispute.filed_by_user_id,
        dispute.reason
    );

    Ok(dispute)
}

/// Resolve an open dispute with an admin decision.
///
/// The dispute record is closed first with the decision and notes, then the
/// payment settles through the same transactional release/refund bodies as
/// direct admin action. One transaction covers both, so a crash can never
/// leave a resolved dispute with unmoved money.
pub fn resolve(
    conn: &mut Connection,
    dispute_id: &str,
    outcome: DisputeOutcome,
    notes: Option<&str>,
    actor: &Actor,
) -> Result<(Dispute, Payment)> {
    if !actor.is_admin() {
        return Err(AppError::Forbidden(msg::ADMIN_REQUIRED.into()));
    }

    let tx = conn.transaction()?;

    let dispute =
        queries::get_dispute_by_id(&tx, dispute_id)?.or_not_found(msg::DISPUTE_NOT_FOUND)?;
    if !dispute.status.is_open() {
        return Err(AppError::Conflict(msg::DISPUTE_ALREADY_RESOLVED.into()));
    }

    let payment = queries::get_payment_by_id(&tx, &dispute.payment_id)?
        .or_not_found(msg::PAYMENT_NOT_FOUND)?;

    let final_status = match outcome {
        DisputeOutcome::Refund => DisputeStatus::ResolvedRefund,
        DisputeOutcome::ReleasePayment => DisputeStatus::ResolvedReleasePayment,
    };
    queries::close_dispute(&tx, &dispute.id, final_status, notes)?;

    let updated_payment = match outcome {
        DisputeOutcome::Refund => payment::refund_in_tx(&tx, &payment)?,
        DisputeOutcome::ReleasePayment => payment::release_in_tx(&tx, &payment, actor)?,
    };

    let updated_dispute =
        queries::get_dispute_by_id(&tx, dispute_id)?.or_not_found(msg::DISPUTE_NOT_FOUND)?;
    tx.commit()?;

    tracing::info!(
        "Dispute {} resolved as {:?}: payment {} -> {}",
        dispute_id,
        outcome,
        updated_payment.id,
        updated_payment.status
    );

    Ok((updated_dispute, updated_payment))
}

/// Administratively close a dispute without settling the payment. The
/// payment and item return to their escrow statuses; a fresh dispute can be
/// filed afterwards.
pub fn close(
    conn: &mut Connection,
    dispute_id: &str,
    notes: Option<&str>,
    actor: &Actor,
) -> Result<Dispute> {
    if !actor.is_admin() {
        return Err(AppError::Forbidden(msg::ADMIN_REQUIRED.into()));
    }

    let tx = conn.transaction()?;

    let dispute =
        queries::get_dispute_by_id(&tx, dispute_id)?.or_not_found(msg::DISPUTE_NOT_FOUND)?;
    if !dispute.status.is_open() {
        return Err(AppError::Conflict(msg::DISPUTE_ALREADY_RESOLVED.into()));
    }

    queries::close_dispute(&tx, &dispute.id, DisputeStatus::Closed, notes)?;
    queries::clear_payment_dispute(&tx, &dispute.payment_id)?;

    let item =
        queries::get_item_by_id(&tx, &dispute.item_id)?.or_not_found(msg::ITEM_NOT_FOUND)?;
    if item.status == ItemStatus::Disputed {
        queries::set_item_status(&tx, &dispute.item_id, ItemStatus::PaidEscrow)?;
    }

    let updated =
        queries::get_dispute_by_id(&tx, dispute_id)?.or_not_found(msg::DISPUTE_NOT_FOUND)?;
    tx.commit()?;

    tracing::info!("Dispute {} closed without settlement", dispute_id);

    Ok(updated)
}
