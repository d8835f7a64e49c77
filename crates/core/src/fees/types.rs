//! Fee decomposition types.

use fiscalhost_shared::config::FeeSettings;
use fiscalhost_shared::types::{Currency, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::tax::{AppliedTax, TaxContext};

/// Default fee settings handed to the fee engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Host fee percent used when nothing more specific is set.
    pub default_host_fee_percent: Decimal,
    /// Platform fee percent on contributions.
    pub platform_fee_percent: Decimal,
    /// Accepted rounding difference in minor units.
    pub rounding_tolerance: i64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            default_host_fee_percent: Decimal::ZERO,
            platform_fee_percent: Decimal::ZERO,
            rounding_tolerance: 1,
        }
    }
}

impl From<&FeeSettings> for FeeConfig {
    fn from(settings: &FeeSettings) -> Self {
        Self {
            default_host_fee_percent: settings.default_host_fee_percent,
            platform_fee_percent: settings.platform_fee_percent,
            rounding_tolerance: settings.rounding_tolerance,
        }
    }
}

/// Who absorbs the payment processor fee on an expense payout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeesPayer {
    /// The paying collective covers the fee; the payee receives the full amount.
    #[default]
    Collective,
    /// The fee is deducted from what the payee receives.
    Payee,
}

/// Where the applied host fee percent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostFeeSource {
    /// Override passed with the call.
    Call,
    /// The contribution tier.
    Tier,
    /// The host's own default.
    Host,
    /// `FeeConfig` default.
    Config,
    /// The collective is the host; no fee is taken.
    SelfHosted,
}

/// Candidate host fee percents, most specific first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFeeRates {
    /// Per-call override.
    pub call_override: Option<Decimal>,
    /// Tier setting.
    pub tier: Option<Decimal>,
    /// Host default.
    pub host_default: Option<Decimal>,
}

impl HostFeeRates {
    /// Picks the applicable percent: call, then tier, then host, then config.
    #[must_use]
    pub fn resolve(&self, config: &FeeConfig) -> (Decimal, HostFeeSource) {
        if let Some(pct) = self.call_override {
            (pct, HostFeeSource::Call)
        } else if let Some(pct) = self.tier {
            (pct, HostFeeSource::Tier)
        } else if let Some(pct) = self.host_default {
            (pct, HostFeeSource::Host)
        } else {
            (config.default_host_fee_percent, HostFeeSource::Config)
        }
    }
}

/// Tax settings for a contribution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxInput {
    /// Countries and tax id.
    pub context: TaxContext,
    /// Tax amount the caller already charged, checked against the computed one.
    pub declared_amount: Option<i64>,
}

/// Everything needed to decompose a contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeContext {
    /// Total charged to the contributor.
    pub gross: Money,
    /// Tier or fixed amount before tax and tip, when known.
    pub expected_amount: Option<i64>,
    /// Voluntary tip to the platform, in the payment currency.
    pub platform_tip: i64,
    /// Fee withheld by the processor, in the payment or host currency.
    pub processor_fee: Option<Money>,
    /// Host fee candidates.
    pub host_fee: HostFeeRates,
    /// Tax settings.
    pub tax: Option<TaxInput>,
    /// The receiving collective is the host itself.
    pub collective_is_host: bool,
}

impl FeeContext {
    /// A context with no tip, tax, processor fee or overrides.
    #[must_use]
    pub fn new(gross: Money) -> Self {
        Self {
            gross,
            expected_amount: None,
            platform_tip: 0,
            processor_fee: None,
            host_fee: HostFeeRates::default(),
            tax: None,
            collective_is_host: false,
        }
    }
}

/// One component of a payment, in both currencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    /// Minor units of the payment currency.
    pub amount: i64,
    /// Minor units of the host currency.
    pub in_host_currency: i64,
}

impl Split {
    /// A zero component.
    pub const ZERO: Self = Self {
        amount: 0,
        in_host_currency: 0,
    };

    /// True when nothing is owed for this component.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

/// A gross payment broken down into what each party receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    /// Payment currency.
    pub currency: Currency,
    /// Host accounting currency.
    pub host_currency: Currency,
    /// Rate used for every host-currency figure.
    pub fx_rate: Decimal,
    /// Total charged.
    pub gross: Split,
    /// Tax collected for the host.
    pub tax: Split,
    /// Tip for the platform.
    pub platform_tip: Split,
    /// Fee kept by the host.
    pub host_fee: Split,
    /// Fee kept by the platform.
    pub platform_fee: Split,
    /// Fee withheld by the processor.
    pub processor_fee: Split,
    /// What the recipient keeps.
    pub net: Split,
    /// Host fee percent applied.
    pub host_fee_percent: Decimal,
    /// Where the host fee percent came from.
    pub host_fee_source: HostFeeSource,
    /// Tax rate details, when a regime applied.
    pub applied_tax: Option<AppliedTax>,
    /// Who bears the processor fee.
    pub fees_payer: FeesPayer,
    /// True when the processor fee reduces the recipient's net.
    ///
    /// Contributions always deduct it; expense payouts deduct it only when
    /// the payee bears the fee.
    pub processor_fee_deducted: bool,
}

impl FeeBreakdown {
    /// Sum of every deduction taken from the gross amount before the recipient's net.
    #[must_use]
    pub const fn deductions(&self) -> i64 {
        self.tax.amount
            + self.platform_tip.amount
            + self.host_fee.amount
            + self.platform_fee.amount
            + self.recipient_processor_fee()
    }

    /// Processor fee deducted from the recipient's net.
    #[must_use]
    pub const fn recipient_processor_fee(&self) -> i64 {
        if self.processor_fee_deducted {
            self.processor_fee.amount
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_host_fee_precedence() {
        let config = FeeConfig {
            default_host_fee_percent: dec!(5),
            ..FeeConfig::default()
        };
        let mut rates = HostFeeRates {
            call_override: Some(dec!(2)),
            tier: Some(dec!(8)),
            host_default: Some(dec!(10)),
        };
        assert_eq!(rates.resolve(&config), (dec!(2), HostFeeSource::Call));
        rates.call_override = None;
        assert_eq!(rates.resolve(&config), (dec!(8), HostFeeSource::Tier));
        rates.tier = None;
        assert_eq!(rates.resolve(&config), (dec!(10), HostFeeSource::Host));
        rates.host_default = None;
        assert_eq!(rates.resolve(&config), (dec!(5), HostFeeSource::Config));
    }

    #[test]
    fn test_fee_config_from_settings() {
        let settings = FeeSettings {
            default_host_fee_percent: dec!(10),
            platform_fee_percent: dec!(5),
            rounding_tolerance: 2,
        };
        let config = FeeConfig::from(&settings);
        assert_eq!(config.default_host_fee_percent, dec!(10));
        assert_eq!(config.platform_fee_percent, dec!(5));
        assert_eq!(config.rounding_tolerance, 2);
    }

    #[test]
    fn test_fees_payer_serde() {
        assert_eq!(serde_json::to_string(&FeesPayer::Payee).unwrap(), "\"PAYEE\"");
        assert_eq!(FeesPayer::default(), FeesPayer::Collective);
    }
}
