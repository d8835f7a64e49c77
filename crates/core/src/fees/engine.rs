//! Fee decomposition engine.
//!
//! Pure calculation: given a gross payment and its context, produce the
//! amount owed to each party in the payment currency and in the host
//! currency. Host-currency figures are converted individually, and the
//! recipient's net in host currency is derived by subtraction so that every
//! group of pairs nets exactly to the gross.

use fiscalhost_shared::types::{Currency, Money};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::error::FeeError;
use super::tax::resolve_tax;
use super::types::{FeeBreakdown, FeeConfig, FeeContext, FeesPayer, HostFeeRates, HostFeeSource, Split};
use crate::currency::{CurrencyError, convert_minor, percent_of, round_half_up};

/// Fee decomposition engine.
pub struct FeeEngine;

impl FeeEngine {
    /// Decomposes a contribution.
    ///
    /// `net = gross - tax - tip - host fee - platform fee - processor fee`.
    /// The host fee is taken on `gross - tip - tax`.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Gross amount, tip, tax and fee inputs
    /// * `config` - Default percents and rounding tolerance
    /// * `fx_rate` - Payment currency to host currency rate
    /// * `host_currency` - Host accounting currency
    ///
    /// # Errors
    ///
    /// Returns a `FeeError` when an input is inconsistent; nothing should be
    /// persisted in that case.
    pub fn decompose(
        ctx: &FeeContext,
        config: &FeeConfig,
        fx_rate: Decimal,
        host_currency: Currency,
    ) -> Result<FeeBreakdown, FeeError> {
        let gross = ctx.gross.amount;
        let currency = ctx.gross.currency;
        if gross <= 0 {
            return Err(FeeError::NonPositiveAmount(gross));
        }
        if ctx.platform_tip < 0 || ctx.platform_tip > gross {
            return Err(FeeError::InvalidPlatformTip {
                tip: ctx.platform_tip,
                gross,
            });
        }

        // Tax
        let applied_tax = match &ctx.tax {
            Some(input) => resolve_tax(&input.context)?,
            None => None,
        };
        let tax = match (&applied_tax, &ctx.tax) {
            (Some(applied), Some(input)) => {
                let computed = match ctx.expected_amount {
                    Some(base) => percent_of(base, applied.rate_percent)?,
                    None => tax_included_in(gross - ctx.platform_tip, applied.rate_percent)?,
                };
                match input.declared_amount {
                    Some(declared) if distance(declared, computed, "tax")? > config.rounding_tolerance => {
                        return Err(FeeError::TaxMismatch {
                            expected: computed,
                            actual: declared,
                        });
                    }
                    Some(declared) => declared,
                    None => computed,
                }
            }
            _ => 0,
        };

        // Expected amount
        if let Some(base) = ctx.expected_amount {
            let expected = checked_sum(&[base, tax, ctx.platform_tip], "expected amount")?;
            if distance(gross, expected, "expected amount")? > config.rounding_tolerance {
                return Err(FeeError::AmountMismatch {
                    expected,
                    actual: gross,
                    currency,
                });
            }
        }

        // Fees
        let fee_base = checked_less(gross, &[ctx.platform_tip, tax], "fee base")?;
        let (host_fee_percent, host_fee_source) = if ctx.collective_is_host {
            (Decimal::ZERO, HostFeeSource::SelfHosted)
        } else {
            ctx.host_fee.resolve(config)
        };
        check_percent(host_fee_percent)?;
        check_percent(config.platform_fee_percent)?;

        let host_fee = percent_of(fee_base, host_fee_percent)?;
        let platform_fee = percent_of(fee_base, config.platform_fee_percent)?;
        let processor_fee = processor_fee_split(ctx.processor_fee, currency, host_currency, fx_rate)?;

        let deductions = checked_sum(
            &[tax, ctx.platform_tip, host_fee, platform_fee, processor_fee.amount],
            "deductions",
        )?;
        if deductions > gross {
            return Err(FeeError::FeesExceedGross {
                fees: deductions,
                gross,
            });
        }

        let to_host = |amount: i64| -> Result<Split, FeeError> {
            Ok(Split {
                amount,
                in_host_currency: convert_minor(amount, fx_rate, currency, host_currency)?,
            })
        };

        let gross = to_host(gross)?;
        let tax = to_host(tax)?;
        let platform_tip = to_host(ctx.platform_tip)?;
        let host_fee = to_host(host_fee)?;
        let platform_fee = to_host(platform_fee)?;
        let net = Split {
            amount: checked_less(gross.amount, &[deductions], "net amount")?,
            in_host_currency: checked_less(
                gross.in_host_currency,
                &[
                    tax.in_host_currency,
                    platform_tip.in_host_currency,
                    host_fee.in_host_currency,
                    platform_fee.in_host_currency,
                    processor_fee.in_host_currency,
                ],
                "net amount",
            )?,
        };

        Ok(FeeBreakdown {
            currency,
            host_currency,
            fx_rate,
            gross,
            tax,
            platform_tip,
            host_fee,
            platform_fee,
            processor_fee,
            net,
            host_fee_percent,
            host_fee_source,
            applied_tax,
            fees_payer: FeesPayer::Collective,
            processor_fee_deducted: true,
        })
    }

    /// Decomposes an expense payout.
    ///
    /// With `FeesPayer::Payee` the payee nets `amount - fee`; with
    /// `FeesPayer::Collective` the payee nets the full amount and the
    /// collective covers the fee on top.
    ///
    /// # Errors
    ///
    /// Returns a `FeeError` for a non-positive amount, a fee larger than the
    /// amount on a payee-borne payout, or a fee in an unrelated currency.
    pub fn decompose_expense(
        amount: Money,
        processor_fee: Option<Money>,
        fees_payer: FeesPayer,
        fx_rate: Decimal,
        host_currency: Currency,
    ) -> Result<FeeBreakdown, FeeError> {
        if amount.amount <= 0 {
            return Err(FeeError::NonPositiveAmount(amount.amount));
        }

        let processor_fee = processor_fee_split(processor_fee, amount.currency, host_currency, fx_rate)?;
        let gross = Split {
            amount: amount.amount,
            in_host_currency: convert_minor(amount.amount, fx_rate, amount.currency, host_currency)?,
        };
        let deducted = fees_payer == FeesPayer::Payee;
        let net = if deducted {
            if processor_fee.amount > gross.amount {
                return Err(FeeError::FeesExceedGross {
                    fees: processor_fee.amount,
                    gross: gross.amount,
                });
            }
            Split {
                amount: gross.amount - processor_fee.amount,
                in_host_currency: gross.in_host_currency - processor_fee.in_host_currency,
            }
        } else {
            gross
        };

        Ok(FeeBreakdown {
            currency: amount.currency,
            host_currency,
            fx_rate,
            gross,
            tax: Split::ZERO,
            platform_tip: Split::ZERO,
            host_fee: Split::ZERO,
            platform_fee: Split::ZERO,
            processor_fee,
            net,
            host_fee_percent: Decimal::ZERO,
            host_fee_source: HostFeeSource::SelfHosted,
            applied_tax: None,
            fees_payer,
            processor_fee_deducted: deducted,
        })
    }

    /// Decomposes funds added to a collective by its host or an outside source.
    ///
    /// Only the host fee applies.
    ///
    /// # Errors
    ///
    /// Returns a `FeeError` for a non-positive amount or an invalid percent.
    pub fn decompose_added_funds(
        amount: Money,
        host_fee: HostFeeRates,
        collective_is_host: bool,
        config: &FeeConfig,
        fx_rate: Decimal,
        host_currency: Currency,
    ) -> Result<FeeBreakdown, FeeError> {
        let ctx = FeeContext {
            host_fee,
            collective_is_host,
            ..FeeContext::new(amount)
        };
        let config = FeeConfig {
            platform_fee_percent: Decimal::ZERO,
            ..config.clone()
        };
        Self::decompose(&ctx, &config, fx_rate, host_currency)
    }
}

/// Tax contained in a tax-inclusive total.
fn tax_included_in(total: i64, rate_percent: Decimal) -> Result<i64, FeeError> {
    if rate_percent.is_zero() {
        return Ok(0);
    }
    let divisor = Decimal::ONE + rate_percent / Decimal::ONE_HUNDRED;
    let base = round_half_up(Decimal::from(total) / divisor)
        .to_i64()
        .ok_or(CurrencyError::Overflow {
            amount: total,
            rate: divisor,
        })?;
    Ok(total - base)
}

fn checked_sum(parts: &[i64], what: &'static str) -> Result<i64, FeeError> {
    parts
        .iter()
        .try_fold(0_i64, |acc, &part| acc.checked_add(part))
        .ok_or(FeeError::Overflow(what))
}

fn checked_less(start: i64, parts: &[i64], what: &'static str) -> Result<i64, FeeError> {
    parts
        .iter()
        .try_fold(start, |acc, &part| acc.checked_sub(part))
        .ok_or(FeeError::Overflow(what))
}

fn distance(a: i64, b: i64, what: &'static str) -> Result<i64, FeeError> {
    a.checked_sub(b)
        .and_then(i64::checked_abs)
        .ok_or(FeeError::Overflow(what))
}

fn check_percent(percent: Decimal) -> Result<(), FeeError> {
    if percent.is_sign_negative() || percent > Decimal::ONE_HUNDRED {
        return Err(FeeError::InvalidPercent(percent));
    }
    Ok(())
}

/// Expresses the processor fee in both currencies.
///
/// Processors often report the fee in the host's settlement currency; that
/// figure is kept exact and the payment-currency amount derived from it.
fn processor_fee_split(
    fee: Option<Money>,
    currency: Currency,
    host_currency: Currency,
    fx_rate: Decimal,
) -> Result<Split, FeeError> {
    let Some(fee) = fee.filter(|f| !f.is_zero()) else {
        return Ok(Split::ZERO);
    };
    if fee.is_negative() {
        return Err(FeeError::NonPositiveAmount(fee.amount));
    }

    if fee.currency == currency {
        Ok(Split {
            amount: fee.amount,
            in_host_currency: convert_minor(fee.amount, fx_rate, currency, host_currency)?,
        })
    } else if fee.currency == host_currency {
        let inverse = Decimal::ONE
            .checked_div(fx_rate)
            .ok_or(CurrencyError::InvalidRate {
                from: currency,
                to: host_currency,
                rate: fx_rate,
            })?;
        Ok(Split {
            amount: convert_minor(fee.amount, inverse, host_currency, currency)?,
            in_host_currency: fee.amount,
        })
    } else {
        Err(FeeError::CurrencyMismatch {
            actual: fee.currency,
            payment: currency,
            host: host_currency,
        })
    }
}
