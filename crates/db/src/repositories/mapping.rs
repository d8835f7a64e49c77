//! Conversions between entity models and core domain types.
//!
//! Enum-like columns are stored as their storage names (`CREDIT`,
//! `PLATFORM_TIP_DEBT`, `OWED`) and parsed back with `FromStr`; a value that
//! does not parse is reported as `RepositoryError::InvalidColumn` instead of
//! being silently defaulted.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use fiscalhost_core::billing::{Subscription, SubscriptionClaim};
use fiscalhost_core::ledger::{Linkage, Transaction};
use fiscalhost_core::orders::{Host, Order};
use fiscalhost_core::settlement::Settlement;
use fiscalhost_shared::types::{
    AccountId, ExpenseId, Money, OrderId, SettlementId, SubscriptionId, TransactionGroupId,
    TransactionId,
};
use sea_orm::Set;

use super::error::RepositoryError;
use crate::entities::{orders, subscriptions, transaction_settlements, transactions};

pub(crate) fn parse<T>(table: &'static str, column: &'static str, value: &str) -> Result<T, RepositoryError>
where
    T: FromStr<Err = String>,
{
    T::from_str(value.trim()).map_err(|message| RepositoryError::invalid(table, column, message))
}

pub(crate) fn utc(value: DateTime<FixedOffset>) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

pub(crate) fn stored(value: DateTime<Utc>) -> DateTime<FixedOffset> {
    value.fixed_offset()
}

fn count_from_row(table: &'static str, column: &'static str, value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| RepositoryError::invalid(table, column, format!("negative count {value}")))
}

pub(crate) fn count_to_row(column: &'static str, value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::invalid("subscriptions", column, format!("count {value} out of range")))
}

// ============================================================================
// Transactions
// ============================================================================

pub(crate) fn transaction_from_model(model: transactions::Model) -> Result<Transaction, RepositoryError> {
    const TABLE: &str = "transactions";

    let linkage = match (model.order_id, model.expense_id) {
        (Some(order), None) => Linkage::Order(OrderId::from_uuid(order)),
        (None, Some(expense)) => Linkage::Expense(ExpenseId::from_uuid(expense)),
        _ => {
            return Err(RepositoryError::invalid(
                TABLE,
                "order_id",
                format!("leg {} must link exactly one order or expense", model.id),
            ));
        }
    };

    Ok(Transaction {
        id: TransactionId::from_uuid(model.id),
        transaction_group: TransactionGroupId::from_uuid(model.transaction_group),
        entry_type: parse(TABLE, "entry_type", &model.entry_type)?,
        kind: parse(TABLE, "kind", &model.kind)?,
        amount: model.amount,
        currency: parse(TABLE, "currency", &model.currency)?,
        amount_in_host_currency: model.amount_in_host_currency,
        host_currency: parse(TABLE, "host_currency", &model.host_currency)?,
        host_currency_fx_rate: model.host_currency_fx_rate,
        net_amount_in_collective_currency: model.net_amount_in_collective_currency,
        tax_amount: model.tax_amount,
        from_account_id: AccountId::from_uuid(model.from_account_id),
        to_account_id: AccountId::from_uuid(model.to_account_id),
        host_account_id: AccountId::from_uuid(model.host_account_id),
        linkage,
        is_refund: model.is_refund,
        is_debt: model.is_debt,
        refund_transaction_id: model.refund_transaction_id.map(TransactionId::from_uuid),
        created_at: utc(model.created_at),
        cleared_at: model.cleared_at.map(utc),
        data: model.data,
    })
}

pub(crate) fn transaction_active_model(leg: &Transaction) -> transactions::ActiveModel {
    transactions::ActiveModel {
        id: Set(leg.id.into_inner()),
        transaction_group: Set(leg.transaction_group.into_inner()),
        entry_type: Set(leg.entry_type.as_str().to_string()),
        kind: Set(leg.kind.as_str().to_string()),
        amount: Set(leg.amount),
        currency: Set(leg.currency.code().to_string()),
        amount_in_host_currency: Set(leg.amount_in_host_currency),
        host_currency: Set(leg.host_currency.code().to_string()),
        host_currency_fx_rate: Set(leg.host_currency_fx_rate),
        net_amount_in_collective_currency: Set(leg.net_amount_in_collective_currency),
        tax_amount: Set(leg.tax_amount),
        from_account_id: Set(leg.from_account_id.into_inner()),
        to_account_id: Set(leg.to_account_id.into_inner()),
        host_account_id: Set(leg.host_account_id.into_inner()),
        order_id: Set(leg.linkage.order_id().map(OrderId::into_inner)),
        expense_id: Set(leg.linkage.expense_id().map(ExpenseId::into_inner)),
        is_refund: Set(leg.is_refund),
        is_debt: Set(leg.is_debt),
        refund_transaction_id: Set(leg.refund_transaction_id.map(TransactionId::into_inner)),
        created_at: Set(stored(leg.created_at)),
        cleared_at: Set(leg.cleared_at.map(stored)),
        data: Set(leg.data.clone()),
    }
}

// ============================================================================
// Settlements
// ============================================================================

pub(crate) fn settlement_from_model(
    model: transaction_settlements::Model,
) -> Result<Settlement, RepositoryError> {
    const TABLE: &str = "transaction_settlements";

    Ok(Settlement {
        id: SettlementId::from_uuid(model.id),
        transaction_group: TransactionGroupId::from_uuid(model.transaction_group),
        kind: parse(TABLE, "kind", &model.kind)?,
        host_account_id: AccountId::from_uuid(model.host_account_id),
        status: parse(TABLE, "status", &model.status)?,
        expense_id: model.expense_id.map(ExpenseId::from_uuid),
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
    })
}

pub(crate) fn settlement_active_model(settlement: &Settlement) -> transaction_settlements::ActiveModel {
    transaction_settlements::ActiveModel {
        id: Set(settlement.id.into_inner()),
        transaction_group: Set(settlement.transaction_group.into_inner()),
        kind: Set(settlement.kind.as_str().to_string()),
        host_account_id: Set(settlement.host_account_id.into_inner()),
        status: Set(settlement.status.as_str().to_string()),
        expense_id: Set(settlement.expense_id.map(ExpenseId::into_inner)),
        created_at: Set(stored(settlement.created_at)),
        updated_at: Set(stored(settlement.updated_at)),
    }
}

// ============================================================================
// Orders
// ============================================================================

pub(crate) fn order_from_model(model: orders::Model) -> Result<Order, RepositoryError> {
    const TABLE: &str = "orders";

    let host = Host {
        account_id: AccountId::from_uuid(model.host_account_id),
        currency: parse(TABLE, "host_currency", &model.host_currency)?,
        country: model.host_country,
        host_fee_percent: model.host_fee_percent,
    };
    let tax = model.tax.map(serde_json::from_value).transpose()?;
    let payment_method = model.payment_method.map(serde_json::from_value).transpose()?;

    Ok(Order {
        id: OrderId::from_uuid(model.id),
        contributor_account_id: AccountId::from_uuid(model.contributor_account_id),
        collective_account_id: AccountId::from_uuid(model.collective_account_id),
        host,
        total_amount: Money::new(model.total_amount, parse(TABLE, "currency", &model.currency)?),
        platform_tip: model.platform_tip,
        expected_amount: model.expected_amount,
        tax,
        tier_host_fee_percent: model.tier_host_fee_percent,
        payment_method,
        status: parse(TABLE, "status", &model.status)?,
        subscription_id: model.subscription_id.map(SubscriptionId::from_uuid),
        created_at: utc(model.created_at),
    })
}

pub(crate) fn order_active_model(order: &Order, now: DateTime<Utc>) -> Result<orders::ActiveModel, RepositoryError> {
    Ok(orders::ActiveModel {
        id: Set(order.id.into_inner()),
        contributor_account_id: Set(order.contributor_account_id.into_inner()),
        collective_account_id: Set(order.collective_account_id.into_inner()),
        host_account_id: Set(order.host.account_id.into_inner()),
        host_currency: Set(order.host.currency.code().to_string()),
        host_country: Set(order.host.country.clone()),
        host_fee_percent: Set(order.host.host_fee_percent),
        total_amount: Set(order.total_amount.amount),
        currency: Set(order.total_amount.currency.code().to_string()),
        platform_tip: Set(order.platform_tip),
        expected_amount: Set(order.expected_amount),
        tax: Set(order.tax.as_ref().map(serde_json::to_value).transpose()?),
        tier_host_fee_percent: Set(order.tier_host_fee_percent),
        payment_method: Set(order.payment_method.as_ref().map(serde_json::to_value).transpose()?),
        status: Set(order.status.as_str().to_string()),
        subscription_id: Set(order.subscription_id.map(SubscriptionId::into_inner)),
        created_at: Set(stored(order.created_at)),
        updated_at: Set(stored(now)),
    })
}

// ============================================================================
// Subscriptions
// ============================================================================

pub(crate) fn subscription_from_model(model: subscriptions::Model) -> Result<Subscription, RepositoryError> {
    const TABLE: &str = "subscriptions";

    let claim = match (model.claim_token, model.claim_expires_at) {
        (Some(token), Some(expires_at)) => Some(SubscriptionClaim {
            token,
            expires_at: utc(expires_at),
            charging: model.claim_charging,
        }),
        (None, None) => None,
        _ => {
            return Err(RepositoryError::invalid(
                TABLE,
                "claim_token",
                "claim token and expiry must be set together",
            ));
        }
    };
    let quantity = model
        .quantity
        .map(|value| count_from_row(TABLE, "quantity", value))
        .transpose()?;

    Ok(Subscription {
        id: SubscriptionId::from_uuid(model.id),
        order_id: OrderId::from_uuid(model.order_id),
        amount: Money::new(model.amount, parse(TABLE, "currency", &model.currency)?),
        interval: parse(TABLE, "billing_interval", &model.billing_interval)?,
        is_active: model.is_active,
        activated_at: model.activated_at.map(utc),
        next_charge_date: model.next_charge_date.map(utc),
        next_period_start: model.next_period_start.map(utc),
        charge_number: count_from_row(TABLE, "charge_number", model.charge_number)?,
        charge_retry_count: count_from_row(TABLE, "charge_retry_count", model.charge_retry_count)?,
        quantity,
        deactivated_at: model.deactivated_at.map(utc),
        claim,
        created_at: utc(model.created_at),
    })
}

pub(crate) fn subscription_active_model(
    subscription: &Subscription,
    now: DateTime<Utc>,
) -> Result<subscriptions::ActiveModel, RepositoryError> {
    let quantity = subscription
        .quantity
        .map(|value| count_to_row("quantity", value))
        .transpose()?;

    Ok(subscriptions::ActiveModel {
        id: Set(subscription.id.into_inner()),
        order_id: Set(subscription.order_id.into_inner()),
        amount: Set(subscription.amount.amount),
        currency: Set(subscription.amount.currency.code().to_string()),
        billing_interval: Set(subscription.interval.as_str().to_string()),
        is_active: Set(subscription.is_active),
        activated_at: Set(subscription.activated_at.map(stored)),
        next_charge_date: Set(subscription.next_charge_date.map(stored)),
        next_period_start: Set(subscription.next_period_start.map(stored)),
        charge_number: Set(count_to_row("charge_number", subscription.charge_number)?),
        charge_retry_count: Set(count_to_row("charge_retry_count", subscription.charge_retry_count)?),
        quantity: Set(quantity),
        deactivated_at: Set(subscription.deactivated_at.map(stored)),
        claim_token: Set(subscription.claim.map(|claim| claim.token)),
        claim_expires_at: Set(subscription.claim.map(|claim| stored(claim.expires_at))),
        claim_charging: Set(subscription.claim.is_some_and(|claim| claim.charging)),
        created_at: Set(stored(subscription.created_at)),
        updated_at: Set(stored(now)),
    })
}
