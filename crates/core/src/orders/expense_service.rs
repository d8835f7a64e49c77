//! Expense payouts.

use std::sync::Arc;

use fiscalhost_shared::types::Money;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::types::{Expense, ExpenseStatus, Host};
use crate::events::LedgerEvent;
use crate::fees::FeesPayer;
use crate::ledger::{ExpensePayment, LedgerError, LedgerService, RecordedGroup};
use crate::payment::PaymentProcessor;

/// How the money reaches the payee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMethod {
    /// Paid outside the platform by the host; recorded immediately.
    #[default]
    Manual,
    /// Sent through the processor; recorded once the payout settles.
    Processor,
}

/// Fee settings of a payout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseFees {
    /// Known payout fee. Quoted from the processor when absent for processor payouts.
    pub processor_fee: Option<Money>,
    /// Who absorbs the fee.
    pub fees_payer: FeesPayer,
    /// Payout channel.
    pub payout: PayoutMethod,
}

/// Result of paying an expense.
#[derive(Debug, Clone)]
pub enum PayExpenseOutcome {
    /// Paid and recorded.
    Paid {
        /// The expense, now PAID.
        expense: Expense,
        /// Ledger entries of the payout.
        recorded: RecordedGroup,
    },
    /// Payout sent; record it with `complete_expense_payment` once it settles.
    Processing {
        /// The expense, now PROCESSING.
        expense: Expense,
        /// Processor payout reference.
        processor_ref: String,
        /// Fee the payout will cost.
        processor_fee: Option<Money>,
    },
}

/// Pays collectives' expenses out.
#[derive(Clone)]
pub struct ExpenseService {
    ledger: LedgerService,
    processor: Arc<dyn PaymentProcessor>,
}

impl ExpenseService {
    /// Creates an expense service.
    #[must_use]
    pub fn new(ledger: LedgerService, processor: Arc<dyn PaymentProcessor>) -> Self {
        Self { ledger, processor }
    }

    /// Pays an approved expense.
    ///
    /// The collective's balance must cover the amount, plus the fee when the
    /// collective bears it. Manual payouts are recorded at once; processor
    /// payouts return `Processing` and are recorded on settlement.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidState` if the expense is not APPROVED
    /// - `LedgerError::InsufficientFunds` if the balance is short; nothing is written
    /// - `LedgerError::Processor` if the fee quote or the payout fails
    /// - `LedgerError::Currency` if no rate converts the amount to the host currency
    #[instrument(skip(self, host, expense, fees), fields(expense_id = %expense.id))]
    pub async fn pay_expense(
        &self,
        host: &Host,
        mut expense: Expense,
        fees: ExpenseFees,
    ) -> Result<PayExpenseOutcome, LedgerError> {
        if expense.status != ExpenseStatus::Approved {
            return Err(LedgerError::InvalidState {
                entity: "expense",
                status: expense.status.to_string(),
                operation: "pay",
            });
        }

        let processor_fee = match (fees.processor_fee, fees.payout) {
            (Some(fee), _) => Some(fee),
            (None, PayoutMethod::Processor) => Some(self.processor.quote_fee(expense.amount).await?),
            (None, PayoutMethod::Manual) => None,
        };

        self.ensure_balance(host, &expense, processor_fee, fees.fees_payer)
            .await?;

        match fees.payout {
            PayoutMethod::Manual => {
                let recorded = self
                    .record(host, &expense, processor_fee, fees.fees_payer, None)
                    .await?;
                expense.status = ExpenseStatus::Paid;
                Ok(PayExpenseOutcome::Paid { expense, recorded })
            }
            PayoutMethod::Processor => {
                let processor_ref = self
                    .processor
                    .payout(expense.payee_account_id, expense.amount)
                    .await?;
                expense.status = ExpenseStatus::Processing;
                info!(%processor_ref, "Payout sent, waiting for settlement");
                Ok(PayExpenseOutcome::Processing {
                    expense,
                    processor_ref,
                    processor_fee,
                })
            }
        }
    }

    /// Records a processor payout once it settled.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidState` if the expense is not PROCESSING
    /// - any error of `record_expense_payment`
    #[instrument(skip(self, host, expense), fields(expense_id = %expense.id))]
    pub async fn complete_expense_payment(
        &self,
        host: &Host,
        mut expense: Expense,
        processor_fee: Option<Money>,
        payout_ref: &str,
    ) -> Result<(Expense, RecordedGroup), LedgerError> {
        if expense.status != ExpenseStatus::Processing {
            return Err(LedgerError::InvalidState {
                entity: "expense",
                status: expense.status.to_string(),
                operation: "complete",
            });
        }

        let recorded = self
            .record(host, &expense, processor_fee, expense.fees_payer, Some(payout_ref))
            .await?;
        expense.status = ExpenseStatus::Paid;
        Ok((expense, recorded))
    }

    async fn ensure_balance(
        &self,
        host: &Host,
        expense: &Expense,
        processor_fee: Option<Money>,
        fees_payer: FeesPayer,
    ) -> Result<(), LedgerError> {
        let outlay = match (fees_payer, processor_fee) {
            (FeesPayer::Collective, Some(fee)) => {
                expense.amount.checked_add(fee).ok_or_else(|| {
                    LedgerError::Validation(format!(
                        "Payout fee in {} does not match expense currency {}",
                        fee.currency, expense.amount.currency
                    ))
                })?
            }
            _ => expense.amount,
        };

        let required = self
            .ledger
            .currency()
            .convert(outlay.amount, outlay.currency, host.currency)
            .await?;
        let available = self
            .ledger
            .balance_in_host_currency(expense.collective_account_id)
            .await?;

        if available < required {
            warn!(available, required, "Collective cannot cover expense");
            return Err(LedgerError::InsufficientFunds {
                account: expense.collective_account_id,
                available,
                required,
                currency: host.currency,
            });
        }
        Ok(())
    }

    async fn record(
        &self,
        host: &Host,
        expense: &Expense,
        processor_fee: Option<Money>,
        fees_payer: FeesPayer,
        payout_ref: Option<&str>,
    ) -> Result<RecordedGroup, LedgerError> {
        let recorded = self
            .ledger
            .record_expense_payment(ExpensePayment {
                expense_id: expense.id,
                collective: expense.collective_account_id,
                payee: expense.payee_account_id,
                host: host.clone(),
                amount: expense.amount,
                processor_fee,
                fees_payer,
                payout_ref: payout_ref.map(str::to_string),
            })
            .await?;

        self.ledger
            .events()
            .publish(LedgerEvent::ExpensePaid {
                expense_id: expense.id,
                payee: expense.payee_account_id,
                group: recorded.group,
                amount: expense.amount,
            })
            .await;
        Ok(recorded)
    }
}
