//! Double-entry pair construction.
//!
//! A pair is built from a fully resolved `PairSpec`: the payer, the
//! recipient and the amounts in both currencies. The CREDIT leg goes to the
//! recipient with positive amounts, the DEBIT leg to the payer with the same
//! amounts negated.

use chrono::{DateTime, Utc};
use fiscalhost_shared::types::{AccountId, Currency, TransactionGroupId, TransactionId};
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{
    DoubleEntryInput, EntryType, Linkage, Transaction, TransactionKind, TransactionPair,
};
use crate::currency::{ExchangeRate, convert_minor};

/// A pair with every amount and party resolved.
#[derive(Debug, Clone)]
pub struct PairSpec {
    /// Pair kind.
    pub kind: TransactionKind,
    /// Positive amount in the payment currency.
    pub amount: i64,
    /// Positive amount in the host currency.
    pub amount_in_host_currency: i64,
    /// What the recipient keeps (CREDIT leg net).
    pub net_amount: i64,
    /// Tax included in the amount.
    pub tax_amount: i64,
    /// Payment currency.
    pub currency: Currency,
    /// Host currency.
    pub host_currency: Currency,
    /// Rate stamped on both legs.
    pub fx_rate: Decimal,
    /// Account paying (owner of the DEBIT leg).
    pub payer: AccountId,
    /// Account receiving (owner of the CREDIT leg).
    pub recipient: AccountId,
    /// Fiscal host.
    pub host_account_id: AccountId,
    /// Linked order or expense.
    pub linkage: Linkage,
    /// Group the pair belongs to.
    pub transaction_group: TransactionGroupId,
    /// Refund flag.
    pub is_refund: bool,
    /// Debt flag.
    pub is_debt: bool,
    /// Clearing timestamp.
    pub cleared_at: Option<DateTime<Utc>>,
    /// Metadata for both legs.
    pub data: serde_json::Value,
}

/// Builder for double-entry pairs.
pub struct DoubleEntry;

impl DoubleEntry {
    /// Builds a pair from a caller-facing input and the rate to stamp on it.
    ///
    /// `from`/`to` describe the leg named by `entry_type`; the counterpart
    /// mirrors them.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` for a non-positive amount, or a
    /// currency error if the host amount cannot be computed.
    pub fn build(
        input: &DoubleEntryInput,
        rate: &ExchangeRate,
        group: TransactionGroupId,
        now: DateTime<Utc>,
    ) -> Result<TransactionPair, LedgerError> {
        if input.amount <= 0 {
            return Err(LedgerError::InvalidAmount(input.amount));
        }
        if rate.from != input.currency || rate.to != input.host_currency {
            return Err(LedgerError::Validation(format!(
                "Rate {}/{} does not convert {} to {}",
                rate.from, rate.to, input.currency, input.host_currency
            )));
        }

        let (payer, recipient) = match input.entry_type {
            EntryType::Credit => (input.from_account_id, input.to_account_id),
            EntryType::Debit => (input.to_account_id, input.from_account_id),
        };

        let spec = PairSpec {
            kind: input.kind,
            amount: input.amount,
            amount_in_host_currency: convert_minor(
                input.amount,
                rate.rate,
                input.currency,
                input.host_currency,
            )?,
            net_amount: input.net_amount.unwrap_or(input.amount),
            tax_amount: input.tax_amount,
            currency: input.currency,
            host_currency: input.host_currency,
            fx_rate: rate.rate,
            payer,
            recipient,
            host_account_id: input.host_account_id,
            linkage: input.linkage,
            transaction_group: input.transaction_group.unwrap_or(group),
            is_refund: input.is_refund,
            is_debt: input.is_debt,
            cleared_at: input.cleared_at,
            data: input.data.clone(),
        };

        Self::from_spec(spec, now)
    }

    /// Builds a pair from a resolved spec.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` for a non-positive amount.
    pub fn from_spec(spec: PairSpec, now: DateTime<Utc>) -> Result<TransactionPair, LedgerError> {
        if spec.amount <= 0 {
            return Err(LedgerError::InvalidAmount(spec.amount));
        }
        if spec.amount_in_host_currency < 0 {
            return Err(LedgerError::InvalidAmount(spec.amount_in_host_currency));
        }

        let credit = Transaction {
            id: TransactionId::new(),
            transaction_group: spec.transaction_group,
            entry_type: EntryType::Credit,
            kind: spec.kind,
            amount: spec.amount,
            currency: spec.currency,
            amount_in_host_currency: spec.amount_in_host_currency,
            host_currency: spec.host_currency,
            host_currency_fx_rate: spec.fx_rate,
            net_amount_in_collective_currency: spec.net_amount,
            tax_amount: spec.tax_amount,
            from_account_id: spec.payer,
            to_account_id: spec.recipient,
            host_account_id: spec.host_account_id,
            linkage: spec.linkage,
            is_refund: spec.is_refund,
            is_debt: spec.is_debt,
            refund_transaction_id: None,
            created_at: now,
            cleared_at: spec.cleared_at,
            data: spec.data.clone(),
        };

        let debit = Transaction {
            id: TransactionId::new(),
            entry_type: EntryType::Debit,
            amount: -spec.amount,
            amount_in_host_currency: -spec.amount_in_host_currency,
            net_amount_in_collective_currency: -spec.amount,
            tax_amount: -spec.tax_amount,
            from_account_id: spec.recipient,
            to_account_id: spec.payer,
            data: spec.data,
            ..credit.clone()
        };

        Ok(TransactionPair { credit, debit })
    }

    /// Builds the mirror of an original leg for a refund.
    ///
    /// The copy keeps the owner, kind, linkage and stamped rate of the
    /// original, flips the side, negates every amount (or scales it to
    /// `amount` for a partial refund) and points back at the original.
    ///
    /// # Errors
    ///
    /// Returns a currency error if a partial host amount cannot be computed.
    pub fn reversal_leg(
        original: &Transaction,
        amount: i64,
        group: TransactionGroupId,
        data: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let full = amount == original.amount.abs();
        let sign = if original.amount < 0 { 1 } else { -1 };
        let host_amount = if full {
            original.amount_in_host_currency.abs()
        } else {
            convert_minor(
                amount,
                original.host_currency_fx_rate,
                original.currency,
                original.host_currency,
            )?
        };
        let net = if full {
            original.net_amount_in_collective_currency.abs()
        } else {
            amount
        };
        let tax = if full { original.tax_amount.abs() } else { 0 };

        Ok(Transaction {
            id: TransactionId::new(),
            transaction_group: group,
            entry_type: original.entry_type.opposite(),
            amount: sign * amount,
            amount_in_host_currency: sign * host_amount,
            net_amount_in_collective_currency: sign * net,
            tax_amount: sign * tax,
            is_refund: true,
            refund_transaction_id: Some(original.id),
            created_at: now,
            cleared_at: Some(now),
            data,
            ..original.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fiscalhost_shared::types::{Money, OrderId};
    use rust_decimal_macros::dec;

    fn rate(from: Currency, to: Currency, r: Decimal) -> ExchangeRate {
        ExchangeRate::new(from, to, r, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
    }

    fn input(entry_type: EntryType, amount: i64) -> (DoubleEntryInput, AccountId, AccountId) {
        let contributor = AccountId::new();
        let collective = AccountId::new();
        let mut input = DoubleEntryInput::new(
            TransactionKind::Contribution,
            Money::new(amount, Currency::Usd),
            contributor,
            collective,
            AccountId::new(),
            Currency::Eur,
            Linkage::Order(OrderId::new()),
        );
        input.entry_type = entry_type;
        (input, contributor, collective)
    }

    #[test]
    fn test_credit_input_orients_legs() {
        let (input, contributor, collective) = input(EntryType::Credit, 5000);
        let pair = DoubleEntry::build(
            &input,
            &rate(Currency::Usd, Currency::Eur, dec!(0.92)),
            TransactionGroupId::new(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(pair.credit.to_account_id, collective);
        assert_eq!(pair.credit.from_account_id, contributor);
        assert_eq!(pair.debit.to_account_id, contributor);
        assert_eq!(pair.debit.from_account_id, collective);
        assert_eq!(pair.credit.amount, 5000);
        assert_eq!(pair.debit.amount, -5000);
        assert_eq!(pair.credit.amount_in_host_currency, 4600);
        assert_eq!(pair.debit.amount_in_host_currency, -4600);
        assert_eq!(pair.credit.host_currency_fx_rate, dec!(0.92));
        assert_eq!(pair.debit.host_currency_fx_rate, dec!(0.92));
        assert!(pair.credit.is_counterpart_of(&pair.debit));
    }

    #[test]
    fn test_debit_input_mirrors_accounts() {
        let (input, contributor, collective) = input(EntryType::Debit, 5000);
        let pair = DoubleEntry::build(
            &input,
            &rate(Currency::Usd, Currency::Eur, dec!(0.92)),
            TransactionGroupId::new(),
            Utc::now(),
        )
        .unwrap();

        // `to` names the DEBIT leg owner, so the contributor receives.
        assert_eq!(pair.debit.to_account_id, collective);
        assert_eq!(pair.credit.to_account_id, contributor);
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let (input, _, _) = input(EntryType::Credit, 0);
        let err = DoubleEntry::build(
            &input,
            &rate(Currency::Usd, Currency::Eur, dec!(0.92)),
            TransactionGroupId::new(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(0)));
    }

    #[test]
    fn test_rejects_rate_for_other_pair() {
        let (input, _, _) = input(EntryType::Credit, 100);
        let err = DoubleEntry::build(
            &input,
            &rate(Currency::Usd, Currency::Gbp, dec!(0.8)),
            TransactionGroupId::new(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_reversal_leg_negates_and_links() {
        let (input, _, collective) = input(EntryType::Credit, 5000);
        let pair = DoubleEntry::build(
            &input,
            &rate(Currency::Usd, Currency::Eur, dec!(0.92)),
            TransactionGroupId::new(),
            Utc::now(),
        )
        .unwrap();

        let group = TransactionGroupId::new();
        let reversal = DoubleEntry::reversal_leg(
            &pair.credit,
            5000,
            group,
            serde_json::Value::Null,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(reversal.entry_type, EntryType::Debit);
        assert_eq!(reversal.to_account_id, collective);
        assert_eq!(reversal.amount, -5000);
        assert_eq!(reversal.amount_in_host_currency, -4600);
        assert_eq!(reversal.refund_transaction_id, Some(pair.credit.id));
        assert!(reversal.is_refund);
        assert_eq!(reversal.transaction_group, group);
    }

    #[test]
    fn test_partial_reversal_uses_stamped_rate() {
        let (input, _, _) = input(EntryType::Credit, 5000);
        let pair = DoubleEntry::build(
            &input,
            &rate(Currency::Usd, Currency::Eur, dec!(0.92)),
            TransactionGroupId::new(),
            Utc::now(),
        )
        .unwrap();

        let reversal = DoubleEntry::reversal_leg(
            &pair.debit,
            1000,
            TransactionGroupId::new(),
            serde_json::Value::Null,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(reversal.entry_type, EntryType::Credit);
        assert_eq!(reversal.amount, 1000);
        assert_eq!(reversal.amount_in_host_currency, 920);
    }
}
