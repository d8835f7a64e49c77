//! Ledger service: writes transaction groups and answers ledger queries.
//!
//! Every write goes through one `LedgerStore::commit`, so a group is either
//! fully persisted or not at all. Events are published only after the
//! commit returns.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fiscalhost_shared::config::PlatformConfig;
use fiscalhost_shared::types::{
    AccountId, ExpenseId, OrderId, PageRequest, PageResponse, TransactionGroupId,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument};

use super::entry::{DoubleEntry, PairSpec};
use super::error::LedgerError;
use super::payload::{AddedFunds, ContributionPayload, ExpensePayment};
use super::store::{LedgerCommit, LedgerStore};
use super::strategy::{EventKind, Parties, PlannedPair, plan};
use super::types::{
    DoubleEntryInput, Linkage, Transaction, TransactionKind, TransactionPair,
};
use super::validation::{pair_legs, validate_pairs};
use crate::currency::{CurrencyService, ExchangeRate};
use crate::events::{EventBus, LedgerEvent};
use crate::fees::{FeeBreakdown, FeeConfig, FeeContext, FeeEngine, HostFeeRates};
use crate::settlement::Settlement;

/// Ledger accounts owned by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformAccounts {
    /// Receives platform tips and fees.
    pub platform: AccountId,
    /// Stands in for the payment processor on fee pairs.
    pub processor: AccountId,
}

impl From<&PlatformConfig> for PlatformAccounts {
    fn from(config: &PlatformConfig) -> Self {
        Self {
            platform: AccountId::from_uuid(config.platform_account_id),
            processor: AccountId::from_uuid(config.processor_account_id),
        }
    }
}

/// A group written for one monetary event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedGroup {
    /// Group id.
    pub group: TransactionGroupId,
    /// Linked order or expense.
    pub linkage: Linkage,
    /// Pairs written, main movement first.
    pub pairs: Vec<TransactionPair>,
    /// Decomposition the pairs were derived from.
    pub breakdown: FeeBreakdown,
    /// Settlement opened for a debt pair.
    pub settlement: Option<Settlement>,
}

impl RecordedGroup {
    /// Returns the pair of a kind.
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

/// Writes and reads the ledger.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    currency: CurrencyService,
    fees: FeeConfig,
    accounts: PlatformAccounts,
    events: EventBus,
}

impl LedgerService {
    /// Creates a ledger service.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        currency: CurrencyService,
        fees: FeeConfig,
        accounts: PlatformAccounts,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            currency,
            fees,
            accounts,
            events,
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Returns the event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Returns the platform accounts.
    #[must_use]
    pub const fn accounts(&self) -> PlatformAccounts {
        self.accounts
    }

    /// Returns the currency service.
    #[must_use]
    pub const fn currency(&self) -> &CurrencyService {
        &self.currency
    }

    /// Writes a single pair.
    ///
    /// The host-currency amount is converted once, with `fx` when given or
    /// a fresh quote otherwise, and the rate is stamped on both legs.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidAmount` for a non-positive amount
    /// - `LedgerError::Currency` when no rate is available
    /// - `LedgerError::Store` when the commit fails; nothing is written
    #[instrument(skip(self, input, fx), fields(kind = %input.kind))]
    pub async fn create_double_entry(
        &self,
        input: DoubleEntryInput,
        fx: Option<ExchangeRate>,
    ) -> Result<TransactionPair, LedgerError> {
        if input.amount <= 0 {
            return Err(LedgerError::InvalidAmount(input.amount));
        }

        let rate = match fx {
            Some(rate) => rate,
            None => {
                self.currency
                    .quote(input.currency, input.host_currency, None)
                    .await?
            }
        };
        let group = input.transaction_group.unwrap_or_default();
        let pair = DoubleEntry::build(&input, &rate, group, Utc::now())?;

        let legs = vec![pair.credit.clone(), pair.debit.clone()];
        validate_pairs(&legs)?;
        self.store.commit(LedgerCommit::transactions(legs)).await?;

        info!(
            %group,
            amount = input.amount,
            currency = %input.currency,
            rate = %rate.rate,
            "Recorded transaction pair"
        );
        self.events
            .publish(LedgerEvent::TransactionGroupCreated {
                group: pair.credit.transaction_group,
                linkage: input.linkage,
                kinds: vec![input.kind],
            })
            .await;

        Ok(pair)
    }

    /// Records a successful contribution payment.
    ///
    /// Writes the CONTRIBUTION pair plus every fee, tax and tip pair that
    /// applies, and a PLATFORM_TIP_DEBT pair with an OWED settlement when the
    /// platform did not receive the funds directly.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Fee` for inconsistent amounts or tax input
    /// - `LedgerError::Currency` when no rate is available
    /// - `LedgerError::Store` when the commit fails; nothing is written
    #[instrument(skip(self, payload), fields(order_id = %payload.order_id))]
    pub async fn create_from_contribution_payload(
        &self,
        payload: ContributionPayload,
    ) -> Result<RecordedGroup, LedgerError> {
        let ContributionPayload {
            order_id,
            contributor,
            collective,
            host,
            gross,
            expected_amount,
            platform_tip,
            processor_fee,
            host_fee_percent,
            tier_host_fee_percent,
            tax,
            platform_is_direct_recipient,
            processor_ref,
            cleared_at,
            data,
        } = payload;

        let rate = self
            .currency
            .quote(gross.currency, host.currency, cleared_at.map(|at| at.date_naive()))
            .await?;

        let tax = tax.map(|mut input| {
            if input.context.host_country.is_none() {
                input.context.host_country.clone_from(&host.country);
            }
            input
        });

        let ctx = FeeContext {
            gross,
            expected_amount,
            platform_tip,
            processor_fee,
            host_fee: HostFeeRates {
                call_override: host_fee_percent,
                tier: tier_host_fee_percent,
                host_default: host.host_fee_percent,
            },
            tax,
            collective_is_host: collective == host.account_id,
        };
        let breakdown = FeeEngine::decompose(&ctx, &self.fees, rate.rate, host.currency)?;

        let parties = self.parties(contributor, collective, host.account_id, collective);
        let planned = plan(
            EventKind::Contribution,
            &breakdown,
            &parties,
            platform_is_direct_recipient,
        );
        let data = leg_data(
            &breakdown,
            processor_ref.as_deref().map(|r| ("processor_ref", r)),
            data,
        );

        self.write_group(
            Linkage::Order(order_id),
            host.account_id,
            breakdown,
            planned,
            cleared_at,
            data,
        )
        .await
    }

    /// Records a paid expense.
    ///
    /// Writes the EXPENSE pair, the PAYMENT_PROCESSOR_FEE pair borne by the
    /// payee and, when the collective covers the fee, a
    /// PAYMENT_PROCESSOR_COVER pair making the payee whole.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Fee` for a non-positive amount or a fee in an unrelated currency
    /// - `LedgerError::Store` when the commit fails; nothing is written
    #[instrument(skip(self, payment), fields(expense_id = %payment.expense_id))]
    pub async fn record_expense_payment(
        &self,
        payment: ExpensePayment,
    ) -> Result<RecordedGroup, LedgerError> {
        let rate = self
            .currency
            .quote(payment.amount.currency, payment.host.currency, None)
            .await?;
        let breakdown = FeeEngine::decompose_expense(
            payment.amount,
            payment.processor_fee,
            payment.fees_payer,
            rate.rate,
            payment.host.currency,
        )?;

        let parties = self.parties(
            payment.collective,
            payment.collective,
            payment.host.account_id,
            payment.payee,
        );
        let planned = plan(EventKind::Expense, &breakdown, &parties, true);
        let data = leg_data(
            &breakdown,
            payment.payout_ref.as_deref().map(|r| ("payout_ref", r)),
            Value::Null,
        );

        self.write_group(
            Linkage::Expense(payment.expense_id),
            payment.host.account_id,
            breakdown,
            planned,
            Some(Utc::now()),
            data,
        )
        .await
    }

    /// Records funds added to a collective, taking the host fee.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Fee` for a non-positive amount or invalid percent
    /// - `LedgerError::Store` when the commit fails; nothing is written
    #[instrument(skip(self, funds), fields(order_id = %funds.order_id))]
    pub async fn create_added_funds(&self, funds: AddedFunds) -> Result<RecordedGroup, LedgerError> {
        let rate = self
            .currency
            .quote(funds.amount.currency, funds.host.currency, None)
            .await?;
        let breakdown = FeeEngine::decompose_added_funds(
            funds.amount,
            HostFeeRates {
                call_override: funds.host_fee_percent,
                tier: None,
                host_default: funds.host.host_fee_percent,
            },
            funds.collective == funds.host.account_id,
            &self.fees,
            rate.rate,
            funds.host.currency,
        )?;

        let parties = self.parties(funds.source, funds.collective, funds.host.account_id, funds.collective);
        let planned = plan(EventKind::AddedFunds, &breakdown, &parties, true);
        let extra = funds
            .description
            .map_or(Value::Null, |description| json!({ "description": description }));
        let data = leg_data(&breakdown, None, extra);

        self.write_group(
            Linkage::Order(funds.order_id),
            funds.host.account_id,
            breakdown,
            planned,
            Some(Utc::now()),
            data,
        )
        .await
    }

    /// Returns an order's legs grouped into pairs.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    pub async fn transactions_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<TransactionPair>, LedgerError> {
        pair_legs(self.store.find_by_linkage(Linkage::Order(order_id)).await?)
    }

    /// Returns an expense's legs grouped into pairs.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    pub async fn transactions_for_expense(
        &self,
        expense_id: ExpenseId,
    ) -> Result<Vec<TransactionPair>, LedgerError> {
        pair_legs(self.store.find_by_linkage(Linkage::Expense(expense_id)).await?)
    }

    /// Returns a group's legs grouped into pairs.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::GroupNotFound` when the group has no legs.
    pub async fn transactions_for_group(
        &self,
        group: TransactionGroupId,
    ) -> Result<Vec<TransactionPair>, LedgerError> {
        let legs = self.store.find_by_group(group).await?;
        if legs.is_empty() {
            return Err(LedgerError::GroupNotFound(group));
        }
        pair_legs(legs)
    }

    /// Returns the legs owned by an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    pub async fn transactions_for_account(
        &self,
        account: AccountId,
        page: PageRequest,
    ) -> Result<PageResponse<Transaction>, LedgerError> {
        self.store.find_by_account(account, page).await
    }

    /// Derives an account balance from the legs it owns.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    pub async fn balance_in_host_currency(&self, account: AccountId) -> Result<i64, LedgerError> {
        self.store.sum_for_account(account).await
    }

    const fn parties(
        &self,
        source: AccountId,
        collective: AccountId,
        host: AccountId,
        payee: AccountId,
    ) -> Parties {
        Parties {
            source,
            collective,
            host,
            platform: self.accounts.platform,
            processor: self.accounts.processor,
            payee,
        }
    }

    async fn write_group(
        &self,
        linkage: Linkage,
        host_account_id: AccountId,
        breakdown: FeeBreakdown,
        planned: Vec<PlannedPair>,
        cleared_at: Option<DateTime<Utc>>,
        data: Value,
    ) -> Result<RecordedGroup, LedgerError> {
        let now = Utc::now();
        let group = TransactionGroupId::new();

        let pairs = planned
            .into_iter()
            .map(|planned| {
                DoubleEntry::from_spec(
                    PairSpec {
                        kind: planned.kind,
                        amount: planned.amount.amount,
                        amount_in_host_currency: planned.amount.in_host_currency,
                        net_amount: planned.net_amount,
                        tax_amount: planned.tax_amount,
                        currency: breakdown.currency,
                        host_currency: breakdown.host_currency,
                        fx_rate: breakdown.fx_rate,
                        payer: planned.payer,
                        recipient: planned.recipient,
                        host_account_id,
                        linkage,
                        transaction_group: group,
                        is_refund: false,
                        is_debt: planned.is_debt,
                        cleared_at,
                        data: data.clone(),
                    },
                    now,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let legs: Vec<Transaction> = pairs
            .iter()
            .flat_map(|pair| [pair.credit.clone(), pair.debit.clone()])
            .collect();
        validate_pairs(&legs)?;

        let settlement = pairs
            .iter()
            .find(|pair| pair.credit.is_debt)
            .map(|pair| Settlement::owed(group, pair.kind(), host_account_id, now));

        let commit = LedgerCommit {
            transactions: legs,
            new_settlements: settlement.iter().cloned().collect(),
            ..LedgerCommit::default()
        };
        self.store.commit(commit).await?;

        let recorded = RecordedGroup {
            group,
            linkage,
            pairs,
            breakdown,
            settlement,
        };

        info!(
            %group,
            pairs = recorded.pairs.len(),
            gross = recorded.breakdown.gross.amount,
            net = recorded.breakdown.net.amount,
            currency = %recorded.breakdown.currency,
            "Recorded transaction group"
        );

        self.events
            .publish(LedgerEvent::TransactionGroupCreated {
                group,
                linkage,
                kinds: recorded.kinds(),
            })
            .await;
        if let Some(settlement) = &recorded.settlement {
            self.events
                .publish(LedgerEvent::SettlementChanged {
                    settlement_id: settlement.id,
                    transaction_group: group,
                    from: None,
                    to: settlement.status,
                })
                .await;
        }

        Ok(recorded)
    }
}

/// Metadata stamped on every leg of a group.
fn leg_data(breakdown: &FeeBreakdown, reference: Option<(&str, &str)>, extra: Value) -> Value {
    let mut data = match extra {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Some((key, value)) = reference {
        data.insert(key.to_string(), json!(value));
    }
    data.insert("host_fee_percent".into(), json!(breakdown.host_fee_percent));
    data.insert("host_fee_source".into(), json!(breakdown.host_fee_source));
    data.insert("fees_payer".into(), json!(breakdown.fees_payer));
    if let Some(tax) = &breakdown.applied_tax {
        data.insert("tax".into(), json!(tax));
    }
    Value::Object(data)
}
