//! Kind strategy table.
//!
//! For each kind of monetary event, a closed table decides which pairs a
//! decomposed payment produces, who pays and who receives. Adding a kind
//! means adding a row, not a branch.

use fiscalhost_shared::types::AccountId;
use serde::{Deserialize, Serialize};

use super::types::TransactionKind;
use crate::fees::{FeeBreakdown, FeesPayer, Split};

/// Monetary event a group is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Contributor pays a collective.
    Contribution,
    /// Collective pays an expense payee.
    Expense,
    /// Host or outside source adds funds to a collective.
    AddedFunds,
}

/// Role of an account in an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    /// Originator of the main movement (contributor or funds source).
    Source,
    /// The hosted collective.
    Collective,
    /// The fiscal host.
    Host,
    /// The platform.
    Platform,
    /// The payment processor.
    Processor,
    /// Expense payee.
    Payee,
}

/// Accounts filling each role for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parties {
    /// Contributor or funds source; the collective itself for expenses.
    pub source: AccountId,
    /// Hosted collective.
    pub collective: AccountId,
    /// Fiscal host.
    pub host: AccountId,
    /// Platform account.
    pub platform: AccountId,
    /// Processor account.
    pub processor: AccountId,
    /// Expense payee; the collective for other events.
    pub payee: AccountId,
}

impl Parties {
    /// Returns the account playing `party`.
    #[must_use]
    pub const fn account(&self, party: Party) -> AccountId {
        match party {
            Party::Source => self.source,
            Party::Collective => self.collective,
            Party::Host => self.host,
            Party::Platform => self.platform,
            Party::Processor => self.processor,
            Party::Payee => self.payee,
        }
    }
}

/// Facts the table rows are conditioned on.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    /// The decomposed payment.
    pub breakdown: &'a FeeBreakdown,
    /// Funds land in a platform-owned processor account.
    pub platform_is_direct_recipient: bool,
}

/// One row of the strategy table.
pub struct KindStrategy {
    /// Pair kind.
    pub kind: TransactionKind,
    /// Payer role.
    pub from: Party,
    /// Recipient role.
    pub to: Party,
    /// Pair records a debt rather than moved money.
    pub is_debt: bool,
    /// Whether the row produces a pair for this payment.
    pub applies: fn(&PlanInput<'_>) -> bool,
    /// Amount of the pair.
    pub amount: fn(&FeeBreakdown) -> Split,
}

fn always(_: &PlanInput<'_>) -> bool {
    true
}

fn has_host_fee(input: &PlanInput<'_>) -> bool {
    input.breakdown.host_fee.amount > 0
}

fn has_platform_fee(input: &PlanInput<'_>) -> bool {
    input.breakdown.platform_fee.amount > 0
}

fn has_tax(input: &PlanInput<'_>) -> bool {
    input.breakdown.tax.amount > 0
}

fn has_tip(input: &PlanInput<'_>) -> bool {
    input.breakdown.platform_tip.amount > 0
}

fn has_tip_debt(input: &PlanInput<'_>) -> bool {
    has_tip(input) && !input.platform_is_direct_recipient
}

fn has_processor_fee(input: &PlanInput<'_>) -> bool {
    input.breakdown.processor_fee.amount > 0
}

fn collective_covers_fee(input: &PlanInput<'_>) -> bool {
    has_processor_fee(input) && input.breakdown.fees_payer == FeesPayer::Collective
}

const fn gross(b: &FeeBreakdown) -> Split {
    b.gross
}

const fn host_fee(b: &FeeBreakdown) -> Split {
    b.host_fee
}

const fn platform_fee(b: &FeeBreakdown) -> Split {
    b.platform_fee
}

const fn tax(b: &FeeBreakdown) -> Split {
    b.tax
}

const fn platform_tip(b: &FeeBreakdown) -> Split {
    b.platform_tip
}

const fn processor_fee(b: &FeeBreakdown) -> Split {
    b.processor_fee
}

const CONTRIBUTION: [KindStrategy; 7] = [
    KindStrategy { kind: TransactionKind::Contribution, from: Party::Source, to: Party::Collective, is_debt: false, applies: always, amount: gross },
    KindStrategy { kind: TransactionKind::HostFee, from: Party::Collective, to: Party::Host, is_debt: false, applies: has_host_fee, amount: host_fee },
    KindStrategy { kind: TransactionKind::PlatformFee, from: Party::Collective, to: Party::Platform, is_debt: false, applies: has_platform_fee, amount: platform_fee },
    KindStrategy { kind: TransactionKind::Tax, from: Party::Collective, to: Party::Host, is_debt: false, applies: has_tax, amount: tax },
    KindStrategy { kind: TransactionKind::PlatformTip, from: Party::Collective, to: Party::Platform, is_debt: false, applies: has_tip, amount: platform_tip },
    KindStrategy { kind: TransactionKind::PlatformTipDebt, from: Party::Platform, to: Party::Host, is_debt: true, applies: has_tip_debt, amount: platform_tip },
    KindStrategy { kind: TransactionKind::PaymentProcessorFee, from: Party::Collective, to: Party::Processor, is_debt: false, applies: has_processor_fee, amount: processor_fee },
];

const EXPENSE: [KindStrategy; 3] = [
    KindStrategy { kind: TransactionKind::Expense, from: Party::Collective, to: Party::Payee, is_debt: false, applies: always, amount: gross },
    KindStrategy { kind: TransactionKind::PaymentProcessorFee, from: Party::Payee, to: Party::Processor, is_debt: false, applies: has_processor_fee, amount: processor_fee },
    KindStrategy { kind: TransactionKind::PaymentProcessorCover, from: Party::Collective, to: Party::Payee, is_debt: false, applies: collective_covers_fee, amount: processor_fee },
];

const ADDED_FUNDS: [KindStrategy; 2] = [
    KindStrategy { kind: TransactionKind::AddedFunds, from: Party::Source, to: Party::Collective, is_debt: false, applies: always, amount: gross },
    KindStrategy { kind: TransactionKind::HostFee, from: Party::Collective, to: Party::Host, is_debt: false, applies: has_host_fee, amount: host_fee },
];

/// Returns the table rows for an event kind.
#[must_use]
pub fn strategies(event: EventKind) -> &'static [KindStrategy] {
    match event {
        EventKind::Contribution => &CONTRIBUTION,
        EventKind::Expense => &EXPENSE,
        EventKind::AddedFunds => &ADDED_FUNDS,
    }
}

/// A pair the table decided to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPair {
    /// Pair kind.
    pub kind: TransactionKind,
    /// Paying account.
    pub payer: AccountId,
    /// Receiving account.
    pub recipient: AccountId,
    /// Amount in both currencies.
    pub amount: Split,
    /// What the recipient keeps.
    pub net_amount: i64,
    /// Tax included in the amount.
    pub tax_amount: i64,
    /// Debt flag.
    pub is_debt: bool,
}

/// Plans the pairs for a decomposed payment, main movement first.
#[must_use]
pub fn plan(
    event: EventKind,
    breakdown: &FeeBreakdown,
    parties: &Parties,
    platform_is_direct_recipient: bool,
) -> Vec<PlannedPair> {
    let input = PlanInput {
        breakdown,
        platform_is_direct_recipient,
    };

    strategies(event)
        .iter()
        .filter(|row| (row.applies)(&input))
        .map(|row| {
            let amount = (row.amount)(breakdown);
            let (net_amount, tax_amount) = if row.kind.is_primary() {
                (breakdown.net.amount, breakdown.tax.amount)
            } else if row.kind == TransactionKind::Tax {
                (amount.amount, amount.amount)
            } else {
                (amount.amount, 0)
            };
            PlannedPair {
                kind: row.kind,
                payer: parties.account(row.from),
                recipient: parties.account(row.to),
                amount,
                net_amount,
                tax_amount,
                is_debt: row.is_debt,
            }
        })
        .collect()
}
