//! Refund engine.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fiscalhost_shared::types::{AccountId, Money, TransactionGroupId, TransactionId, UserId};
use serde_json::{Map, Value, json};
use tracing::{error, info, instrument};

use crate::currency::convert_minor;
use crate::events::{EventBus, LedgerEvent};
use crate::ledger::{
    DoubleEntry, LedgerCommit, LedgerError, LedgerStore, PairSpec, Transaction, TransactionKind,
    TransactionPair, pair_legs, validate_pairs,
};
use crate::payment::PaymentProcessor;
use crate::settlement::{Settlement, SettlementStatus, SettlementTransition};

/// A written refund group.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundOutcome {
    /// Refund group.
    pub group: TransactionGroupId,
    /// Group that was refunded.
    pub refunded_group: TransactionGroupId,
    /// Mirror of the requested leg.
    pub refund: Transaction,
    /// Pairs written: mirrors first, then a processor fee cover if any.
    pub pairs: Vec<TransactionPair>,
    /// Settlements closed by the refund.
    pub settled: Vec<Settlement>,
    /// Settlement opened for a debt that was already invoiced or settled.
    pub opened: Option<Settlement>,
}

impl RefundOutcome {
    /// Returns the refund pair of a kind.
    #[must_use]
    pub fn pair(&self, kind: TransactionKind) -> Option<&TransactionPair> {
        self.pairs.iter().find(|pair| pair.kind() == kind)
    }

    /// Returns the kinds written, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<TransactionKind> {
        self.pairs.iter().map(TransactionPair::kind).collect()
    }
}

/// Writes refunds.
#[derive(Clone)]
pub struct RefundEngine {
    store: Arc<dyn LedgerStore>,
    events: EventBus,
    processor: Option<Arc<dyn PaymentProcessor>>,
}

struct Target {
    pairs: Vec<TransactionPair>,
    index: usize,
    refunded: HashSet<TransactionId>,
}

impl Target {
    fn pair(&self) -> &TransactionPair {
        &self.pairs[self.index]
    }

    fn is_refunded(&self, pair: &TransactionPair) -> bool {
        // A refunded primary pair has already handled every other pair of its group.
        self.mirrored(pair)
            || (!pair.kind().is_primary() && self.primaries().any(|primary| self.mirrored(primary)))
    }

    fn mirrored(&self, pair: &TransactionPair) -> bool {
        self.refunded.contains(&pair.credit.id) || self.refunded.contains(&pair.debit.id)
    }

    fn primaries(&self) -> impl Iterator<Item = &TransactionPair> {
        self.pairs.iter().filter(|pair| pair.kind().is_primary())
    }
}

impl RefundEngine {
    /// Creates an engine that only writes ledger refunds.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, events: EventBus) -> Self {
        Self {
            store,
            events,
            processor: None,
        }
    }

    /// Adds the processor used by `refund_with_processor`.
    #[must_use]
    pub fn with_processor(mut self, processor: Arc<dyn PaymentProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Refunds the pair `transaction` belongs to.
    ///
    /// Refunding a primary pair cascades to every pair of the group that was
    /// not refunded yet. The processor fee pair is only refunded up to
    /// `processor_fee_to_refund`; when a contribution is refunded and the
    /// processor keeps part of its fee, the host covers the kept part.
    /// Refunded debts have their settlement closed, or a new OWED settlement
    /// opened when the debt was already invoiced or settled.
    ///
    /// Either the whole refund group is written or nothing is.
    ///
    /// # Errors
    ///
    /// - `LedgerError::RefundOfRefund` if `transaction` is itself a refund
    /// - `LedgerError::AlreadyRefunded` if its pair was refunded before
    /// - `LedgerError::InvalidRefund` for a processor fee refund out of range
    /// - `LedgerError::TransactionNotFound` if the leg is not stored
    /// - `LedgerError::SettlementConflict` if a settlement moved concurrently
    #[instrument(skip(self, transaction, extra_data), fields(transaction_id = %transaction.id, kind = %transaction.kind))]
    pub async fn create_refund_transaction(
        &self,
        transaction: &Transaction,
        processor_fee_to_refund: i64,
        extra_data: Value,
        initiating_user: Option<UserId>,
    ) -> Result<RefundOutcome, LedgerError> {
        let target = self.resolve(transaction).await?;
        let primary = target.pair().clone();
        let cascade = primary.kind().is_primary();

        if processor_fee_to_refund < 0 {
            return Err(LedgerError::InvalidRefund(format!(
                "Processor fee to refund cannot be negative, got {processor_fee_to_refund}"
            )));
        }

        let selected: Vec<&TransactionPair> = if cascade {
            target
                .pairs
                .iter()
                .filter(|pair| !target.is_refunded(pair))
                .collect()
        } else {
            vec![target.pair()]
        };

        let fee_pair = selected
            .iter()
            .find(|pair| pair.kind() == TransactionKind::PaymentProcessorFee)
            .copied();
        let kept_fee = match fee_pair {
            Some(fee) if cascade => {
                if processor_fee_to_refund > fee.credit.amount {
                    return Err(LedgerError::InvalidRefund(format!(
                        "Cannot refund {processor_fee_to_refund} of a {} processor fee",
                        fee.credit.amount
                    )));
                }
                fee.credit.amount - processor_fee_to_refund
            }
            None if cascade && processor_fee_to_refund > 0 => {
                return Err(LedgerError::InvalidRefund(
                    "No processor fee left to refund in this group".into(),
                ));
            }
            _ => 0,
        };

        let now = Utc::now();
        let group = TransactionGroupId::new();
        let data = refund_data(extra_data, primary.credit.transaction_group, initiating_user);

        let mut pairs = Vec::with_capacity(selected.len() + 1);
        let mut refund_guard = Vec::new();
        for pair in &selected {
            let amount = if cascade && pair.kind() == TransactionKind::PaymentProcessorFee {
                processor_fee_to_refund
            } else {
                pair.credit.amount
            };
            refund_guard.extend([pair.credit.id, pair.debit.id]);
            if amount == 0 {
                continue;
            }
            pairs.push(TransactionPair {
                credit: DoubleEntry::reversal_leg(&pair.debit, amount, group, data.clone(), now)?,
                debit: DoubleEntry::reversal_leg(&pair.credit, amount, group, data.clone(), now)?,
            });
        }
        if !cascade {
            refund_guard.extend(
                target
                    .primaries()
                    .flat_map(|pair| [pair.credit.id, pair.debit.id]),
            );
        }

        let collective = primary.credit.to_account_id;
        let host = primary.credit.host_account_id;
        if let Some(fee) = fee_pair.filter(|_| {
            primary.kind() == TransactionKind::Contribution && kept_fee > 0 && collective != host
        }) {
            pairs.push(cover_pair(fee, kept_fee, collective, group, data.clone(), now)?);
        }

        let legs: Vec<Transaction> = pairs
            .iter()
            .flat_map(|pair| [pair.credit.clone(), pair.debit.clone()])
            .collect();
        validate_pairs(&legs)?;

        let mut transitions = Vec::new();
        let mut settled = Vec::new();
        let mut new_settlements = Vec::new();
        let mut opened = None;
        for pair in selected.iter().filter(|pair| pair.credit.is_debt) {
            let kind = pair.kind();
            match self.store.find_settlement(pair.credit.transaction_group, kind).await? {
                Some(settlement) if settlement.status == SettlementStatus::Owed => {
                    transitions.push(SettlementTransition {
                        settlement_id: settlement.id,
                        from: SettlementStatus::Owed,
                        to: SettlementStatus::Settled,
                        expense_id: None,
                    });
                    settled.push(Settlement {
                        status: SettlementStatus::Settled,
                        updated_at: now,
                        ..settlement
                    });
                }
                Some(_) => {
                    let owed = Settlement::owed(group, kind, host, now);
                    new_settlements.push(owed.clone());
                    opened = Some(owed);
                }
                None => {
                    let closed = Settlement {
                        status: SettlementStatus::Settled,
                        ..Settlement::owed(pair.credit.transaction_group, kind, host, now)
                    };
                    new_settlements.push(closed.clone());
                    settled.push(closed);
                }
            }
        }

        let refund = pairs
            .iter()
            .flat_map(|pair| [&pair.credit, &pair.debit])
            .find(|leg| leg.refund_transaction_id == Some(primary.credit.id))
            .cloned()
            .ok_or_else(|| {
                LedgerError::InvalidRefund(format!(
                    "Nothing to refund for transaction {}",
                    primary.credit.id
                ))
            })?;

        self.store
            .commit(LedgerCommit {
                transactions: legs,
                new_settlements,
                settlement_transitions: transitions,
                refund_guard,
            })
            .await?;

        let outcome = RefundOutcome {
            group,
            refunded_group: primary.credit.transaction_group,
            refund,
            pairs,
            settled,
            opened,
        };
        info!(
            group = %outcome.group,
            refunded_group = %outcome.refunded_group,
            kinds = ?outcome.kinds(),
            kept_fee,
            "Refund recorded"
        );
        self.publish(&outcome, &primary).await;
        Ok(outcome)
    }

    /// Refunds a contribution at the processor, then in the ledger.
    ///
    /// The processor fee given back by the processor is what gets refunded
    /// of the processor fee pair.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidRefund` if the leg is not a contribution with a processor reference
    /// - `LedgerError::Processor` if the processor rejects the refund; nothing is written
    /// - any error of `create_refund_transaction`
    #[instrument(skip(self, transaction, extra_data), fields(transaction_id = %transaction.id))]
    pub async fn refund_with_processor(
        &self,
        transaction: &Transaction,
        extra_data: Value,
        initiating_user: Option<UserId>,
    ) -> Result<RefundOutcome, LedgerError> {
        let processor = self
            .processor
            .as_ref()
            .ok_or_else(|| LedgerError::Internal("No payment processor configured".into()))?;

        let target = self.resolve(transaction).await?;
        let contribution = target.pair();
        if contribution.kind() != TransactionKind::Contribution {
            return Err(LedgerError::InvalidRefund(format!(
                "Only contributions are refunded through the processor, got {}",
                contribution.kind()
            )));
        }
        let processor_ref = contribution.credit.data["processor_ref"]
            .as_str()
            .ok_or_else(|| {
                LedgerError::InvalidRefund(format!(
                    "Transaction {} has no processor reference",
                    contribution.credit.id
                ))
            })?
            .to_string();

        let refunded = processor
            .refund(&processor_ref, contribution.credit.money())
            .await?;

        let mut data = match extra_data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        data.insert("refund_ref".into(), json!(refunded.refund_ref));

        let credit = contribution.credit.clone();
        self.create_refund_transaction(
            &credit,
            refunded.fee_returned.amount,
            Value::Object(data),
            initiating_user,
        )
        .await
        .inspect_err(|err| {
            error!(
                %processor_ref,
                refund_ref = %refunded.refund_ref,
                error = %err,
                "Processor refunded but the ledger refund failed"
            );
        })
    }

    async fn resolve(&self, transaction: &Transaction) -> Result<Target, LedgerError> {
        if transaction.is_refund {
            return Err(LedgerError::RefundOfRefund(transaction.id));
        }

        let legs: Vec<Transaction> = self
            .store
            .find_by_group(transaction.transaction_group)
            .await?
            .into_iter()
            .filter(|leg| !leg.is_refund)
            .collect();
        let pairs = pair_legs(legs)?;
        let index = pairs
            .iter()
            .position(|pair| pair.credit.id == transaction.id || pair.debit.id == transaction.id)
            .ok_or(LedgerError::TransactionNotFound(transaction.id))?;

        let ids: Vec<TransactionId> = pairs
            .iter()
            .flat_map(|pair| [pair.credit.id, pair.debit.id])
            .collect();
        let refunded: HashSet<TransactionId> = self
            .store
            .find_refunds_of(&ids)
            .await?
            .into_iter()
            .filter_map(|leg| leg.refund_transaction_id)
            .collect();

        let target = Target {
            pairs,
            index,
            refunded,
        };
        if target.is_refunded(target.pair()) {
            return Err(LedgerError::AlreadyRefunded(target.pair().credit.id));
        }
        Ok(target)
    }

    async fn publish(&self, outcome: &RefundOutcome, primary: &TransactionPair) {
        self.events
            .publish(LedgerEvent::RefundCreated {
                group: outcome.group,
                refunded_group: outcome.refunded_group,
                linkage: primary.credit.linkage,
                recipient: primary.payer(),
                amount: Money::new(outcome.refund.amount.abs(), outcome.refund.currency),
            })
            .await;

        for settlement in &outcome.settled {
            self.events
                .publish(LedgerEvent::SettlementChanged {
                    settlement_id: settlement.id,
                    transaction_group: settlement.transaction_group,
                    from: Some(SettlementStatus::Owed),
                    to: SettlementStatus::Settled,
                })
                .await;
        }
        if let Some(settlement) = &outcome.opened {
            self.events
                .publish(LedgerEvent::SettlementChanged {
                    settlement_id: settlement.id,
                    transaction_group: settlement.transaction_group,
                    from: None,
                    to: settlement.status,
                })
                .await;
        }
    }
}

/// Host-to-collective pair covering the processor fee the processor kept.
fn cover_pair(
    fee: &TransactionPair,
    kept: i64,
    collective: AccountId,
    group: TransactionGroupId,
    data: Value,
    now: DateTime<Utc>,
) -> Result<TransactionPair, LedgerError> {
    let original = &fee.credit;
    let in_host_currency = if kept == original.amount {
        original.amount_in_host_currency
    } else {
        convert_minor(
            kept,
            original.host_currency_fx_rate,
            original.currency,
            original.host_currency,
        )?
    };

    DoubleEntry::from_spec(
        PairSpec {
            kind: TransactionKind::PaymentProcessorCover,
            amount: kept,
            amount_in_host_currency: in_host_currency,
            net_amount: kept,
            tax_amount: 0,
            currency: original.currency,
            host_currency: original.host_currency,
            fx_rate: original.host_currency_fx_rate,
            payer: original.host_account_id,
            recipient: collective,
            host_account_id: original.host_account_id,
            linkage: original.linkage,
            transaction_group: group,
            is_refund: true,
            is_debt: false,
            cleared_at: Some(now),
            data,
        },
        now,
    )
}

fn refund_data(extra: Value, refunded_group: TransactionGroupId, user: Option<UserId>) -> Value {
    let mut data = match extra {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    data.insert("refunded_transaction_group".into(), json!(refunded_group));
    if let Some(user) = user {
        data.insert("refunded_by_user_id".into(), json!(user));
    }
    Value::Object(data)
}
