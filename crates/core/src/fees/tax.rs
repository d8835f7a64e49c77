//! VAT and GST rate selection and tax-id validation.
//!
//! The rate depends on where the money is received (the origin: the
//! collective's country, falling back to the host's), where the payer is,
//! and whether the payer presented a valid tax id.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::FeeError;

/// New Zealand GST rate, in percent.
pub const GST_RATE_PERCENT: Decimal = Decimal::from_parts(15, 0, 0, false, 0);

/// Tax regime applied to a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaxType {
    /// European Union value added tax.
    Vat,
    /// New Zealand goods and services tax.
    Gst,
}

impl std::fmt::Display for TaxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vat => f.write_str("VAT"),
            Self::Gst => f.write_str("GST"),
        }
    }
}

/// Countries and tax id needed to select a rate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxContext {
    /// Tax regime; `None` means no tax applies.
    pub tax_type: Option<TaxType>,
    /// Country of the receiving collective.
    pub collective_country: Option<String>,
    /// Country of the fiscal host.
    pub host_country: Option<String>,
    /// Country of the payer.
    pub payer_country: Option<String>,
    /// VAT or GST number presented by the payer.
    pub payer_tax_id: Option<String>,
}

/// The rate selected for a payment and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTax {
    /// Tax regime.
    pub tax_type: TaxType,
    /// Rate in percent.
    pub rate_percent: Decimal,
    /// Country the supply is taxed from.
    pub origin_country: String,
    /// Payer's country.
    pub payer_country: String,
    /// Normalized tax id, when one was given.
    pub tax_id: Option<String>,
    /// True when the payer self-assesses (EU business with a VAT id).
    pub reverse_charge: bool,
}

/// EU member states with their standard VAT rate.
///
/// Greece is keyed by its ISO code; its VAT ids use the `EL` prefix.
const EU_VAT_RATES: [(&str, Decimal); 27] = [
    ("AT", Decimal::from_parts(20, 0, 0, false, 0)),
    ("BE", Decimal::from_parts(21, 0, 0, false, 0)),
    ("BG", Decimal::from_parts(20, 0, 0, false, 0)),
    ("CY", Decimal::from_parts(19, 0, 0, false, 0)),
    ("CZ", Decimal::from_parts(21, 0, 0, false, 0)),
    ("DE", Decimal::from_parts(19, 0, 0, false, 0)),
    ("DK", Decimal::from_parts(25, 0, 0, false, 0)),
    ("EE", Decimal::from_parts(22, 0, 0, false, 0)),
    ("ES", Decimal::from_parts(21, 0, 0, false, 0)),
    ("FI", Decimal::from_parts(255, 0, 0, false, 1)),
    ("FR", Decimal::from_parts(20, 0, 0, false, 0)),
    ("GR", Decimal::from_parts(24, 0, 0, false, 0)),
    ("HR", Decimal::from_parts(25, 0, 0, false, 0)),
    ("HU", Decimal::from_parts(27, 0, 0, false, 0)),
    ("IE", Decimal::from_parts(23, 0, 0, false, 0)),
    ("IT", Decimal::from_parts(22, 0, 0, false, 0)),
    ("LT", Decimal::from_parts(21, 0, 0, false, 0)),
    ("LU", Decimal::from_parts(17, 0, 0, false, 0)),
    ("LV", Decimal::from_parts(21, 0, 0, false, 0)),
    ("MT", Decimal::from_parts(18, 0, 0, false, 0)),
    ("NL", Decimal::from_parts(21, 0, 0, false, 0)),
    ("PL", Decimal::from_parts(23, 0, 0, false, 0)),
    ("PT", Decimal::from_parts(23, 0, 0, false, 0)),
    ("RO", Decimal::from_parts(19, 0, 0, false, 0)),
    ("SE", Decimal::from_parts(25, 0, 0, false, 0)),
    ("SI", Decimal::from_parts(22, 0, 0, false, 0)),
    ("SK", Decimal::from_parts(23, 0, 0, false, 0)),
];

/// Returns the standard VAT rate of an EU member state.
#[must_use]
pub fn vat_rate(country: &str) -> Option<Decimal> {
    EU_VAT_RATES
        .iter()
        .find(|(code, _)| *code == country)
        .map(|(_, rate)| *rate)
}

/// True for EU member states.
#[must_use]
pub fn is_eu_member(country: &str) -> bool {
    vat_rate(country).is_some()
}

/// Normalizes a country code to two upper-case ASCII letters.
///
/// # Errors
///
/// Returns `FeeError::InvalidCountry` for anything else.
pub fn normalize_country(raw: &str) -> Result<String, FeeError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(FeeError::InvalidCountry(raw.to_string()))
    }
}

fn vat_prefix(country: &str) -> &str {
    if country == "GR" { "EL" } else { country }
}

fn country_from_vat_prefix(prefix: &str) -> &str {
    if prefix == "EL" { "GR" } else { prefix }
}

/// Validates a VAT number and returns it normalized (upper case, no separators).
///
/// A VAT number is the country prefix (`EL` for Greece) followed by 2 to 13
/// letters or digits. When `country` is known the prefix must match it.
///
/// # Errors
///
/// Returns `FeeError::InvalidTaxId` when the format is wrong.
pub fn normalize_vat_id(raw: &str, country: Option<&str>) -> Result<String, FeeError> {
    let invalid = |reason: &str| FeeError::InvalidTaxId {
        tax_type: TaxType::Vat,
        tax_id: raw.to_string(),
        reason: reason.to_string(),
    };

    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '.' | '-'))
        .collect::<String>()
        .to_ascii_uppercase();

    if normalized.len() < 4 || !normalized.is_ascii() {
        return Err(invalid("too short"));
    }

    let (prefix, body) = normalized.split_at(2);
    if let Some(country) = country {
        if prefix != vat_prefix(country) {
            return Err(invalid(&format!("must start with {}", vat_prefix(country))));
        }
    } else if !is_eu_member(country_from_vat_prefix(prefix)) {
        return Err(invalid("unknown country prefix"));
    }

    if !(2..=13).contains(&body.len()) || !body.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("expected 2 to 13 letters or digits after the prefix"));
    }

    Ok(normalized)
}

/// Validates a New Zealand GST number (8 or 9 digits, dashes allowed).
///
/// # Errors
///
/// Returns `FeeError::InvalidTaxId` when the format is wrong.
pub fn normalize_gst_number(raw: &str) -> Result<String, FeeError> {
    let digits: String = raw.trim().chars().filter(|c| *c != '-').collect();
    if matches!(digits.len(), 8 | 9) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(digits)
    } else {
        Err(FeeError::InvalidTaxId {
            tax_type: TaxType::Gst,
            tax_id: raw.to_string(),
            reason: "expected 8 or 9 digits".to_string(),
        })
    }
}

/// Selects the tax rate for a payment.
///
/// Returns `Ok(None)` when the context carries no tax regime.
///
/// # Errors
///
/// Returns a `FeeError` for malformed countries or tax ids, a missing
/// country, or an origin the regime does not cover.
pub fn resolve_tax(ctx: &TaxContext) -> Result<Option<AppliedTax>, FeeError> {
    let Some(tax_type) = ctx.tax_type else {
        return Ok(None);
    };

    let origin = ctx
        .collective_country
        .as_deref()
        .or(ctx.host_country.as_deref())
        .ok_or(FeeError::MissingCountry {
            party: "origin",
            tax_type,
        })
        .and_then(normalize_country)?;

    let payer = ctx.payer_country.as_deref().map(normalize_country).transpose()?;

    match tax_type {
        TaxType::Vat => resolve_vat(origin, payer, ctx.payer_tax_id.as_deref()).map(Some),
        TaxType::Gst => resolve_gst(origin, payer, ctx.payer_tax_id.as_deref()).map(Some),
    }
}

fn resolve_vat(
    origin: String,
    payer: Option<String>,
    tax_id: Option<&str>,
) -> Result<AppliedTax, FeeError> {
    let Some(origin_rate) = vat_rate(&origin) else {
        return Err(FeeError::UnsupportedTaxOrigin {
            tax_type: TaxType::Vat,
            country: origin,
        });
    };

    let tax_id = tax_id
        .map(|raw| normalize_vat_id(raw, payer.as_deref()))
        .transpose()?;

    let payer = match (payer, &tax_id) {
        (Some(payer), _) => payer,
        (None, Some(id)) => country_from_vat_prefix(&id[..2]).to_string(),
        (None, None) => {
            return Err(FeeError::MissingCountry {
                party: "payer",
                tax_type: TaxType::Vat,
            });
        }
    };

    let (rate_percent, reverse_charge) = if payer == origin {
        (origin_rate, false)
    } else if let Some(payer_rate) = vat_rate(&payer) {
        if tax_id.is_some() {
            (Decimal::ZERO, true)
        } else {
            (payer_rate, false)
        }
    } else {
        (Decimal::ZERO, false)
    };

    Ok(AppliedTax {
        tax_type: TaxType::Vat,
        rate_percent,
        origin_country: origin,
        payer_country: payer,
        tax_id,
        reverse_charge,
    })
}

fn resolve_gst(
    origin: String,
    payer: Option<String>,
    tax_id: Option<&str>,
) -> Result<AppliedTax, FeeError> {
    if origin != "NZ" {
        return Err(FeeError::UnsupportedTaxOrigin {
            tax_type: TaxType::Gst,
            country: origin,
        });
    }

    let tax_id = tax_id.map(normalize_gst_number).transpose()?;
    let payer = payer.ok_or(FeeError::MissingCountry {
        party: "payer",
        tax_type: TaxType::Gst,
    })?;

    let rate_percent = if payer == "NZ" {
        GST_RATE_PERCENT
    } else {
        Decimal::ZERO
    };

    Ok(AppliedTax {
        tax_type: TaxType::Gst,
        rate_percent,
        origin_country: origin,
        payer_country: payer,
        tax_id,
        reverse_charge: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn vat(collective: Option<&str>, host: Option<&str>, payer: Option<&str>, id: Option<&str>) -> TaxContext {
        TaxContext {
            tax_type: Some(TaxType::Vat),
            collective_country: collective.map(str::to_string),
            host_country: host.map(str::to_string),
            payer_country: payer.map(str::to_string),
            payer_tax_id: id.map(str::to_string),
        }
    }

    fn gst(payer: Option<&str>, id: Option<&str>) -> TaxContext {
        TaxContext {
            tax_type: Some(TaxType::Gst),
            collective_country: None,
            host_country: Some("NZ".to_string()),
            payer_country: payer.map(str::to_string),
            payer_tax_id: id.map(str::to_string),
        }
    }

    // ========== VAT ==========

    #[test]
    fn test_no_tax_type_means_no_tax() {
        assert_eq!(resolve_tax(&TaxContext::default()).unwrap(), None);
    }

    #[rstest]
    #[case(Some("BE"), None, "BE", None, dec!(21), false)]
    #[case(Some("BE"), None, "FR", None, dec!(20), false)]
    #[case(Some("BE"), None, "FR", Some("FR 12 345678901"), dec!(0), true)]
    #[case(Some("BE"), None, "US", None, dec!(0), false)]
    #[case(None, Some("DE"), "DE", None, dec!(19), false)]
    #[case(Some("FR"), Some("DE"), "DE", None, dec!(19), false)]
    #[case(Some("FR"), Some("DE"), "FR", None, dec!(20), false)]
    fn test_vat_rate_selection(
        #[case] collective: Option<&str>,
        #[case] host: Option<&str>,
        #[case] payer: &str,
        #[case] id: Option<&str>,
        #[case] rate: Decimal,
        #[case] reverse_charge: bool,
    ) {
        let applied = resolve_tax(&vat(collective, host, Some(payer), id))
            .unwrap()
            .unwrap();
        assert_eq!(applied.rate_percent, rate);
        assert_eq!(applied.reverse_charge, reverse_charge);
    }

    #[test]
    fn test_collective_country_takes_precedence_over_host() {
        let applied = resolve_tax(&vat(Some("FR"), Some("DE"), Some("FR"), None))
            .unwrap()
            .unwrap();
        assert_eq!(applied.origin_country, "FR");
    }

    #[test]
    fn test_vat_requires_eu_origin() {
        let err = resolve_tax(&vat(Some("US"), None, Some("FR"), None)).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_TAX_ORIGIN");
    }

    #[test]
    fn test_vat_requires_origin_country() {
        let err = resolve_tax(&vat(None, None, Some("FR"), None)).unwrap_err();
        assert!(matches!(err, FeeError::MissingCountry { party: "origin", .. }));
    }

    #[test]
    fn test_vat_requires_payer_country() {
        let err = resolve_tax(&vat(Some("BE"), None, None, None)).unwrap_err();
        assert!(matches!(err, FeeError::MissingCountry { party: "payer", .. }));
    }

    #[test]
    fn test_vat_payer_country_derived_from_vat_id() {
        let applied = resolve_tax(&vat(Some("BE"), None, None, Some("EL123456789")))
            .unwrap()
            .unwrap();
        assert_eq!(applied.payer_country, "GR");
        assert_eq!(applied.rate_percent, Decimal::ZERO);
        assert!(applied.reverse_charge);
    }

    #[rstest]
    #[case("FR12345678901", Some("FR"), "FR12345678901")]
    #[case("fr 12.345-678 901", Some("FR"), "FR12345678901")]
    #[case("EL123456789", Some("GR"), "EL123456789")]
    #[case("DE12", Some("DE"), "DE12")]
    fn test_valid_vat_ids(#[case] raw: &str, #[case] country: Option<&str>, #[case] expected: &str) {
        assert_eq!(normalize_vat_id(raw, country).unwrap(), expected);
    }

    #[rstest]
    #[case("GR123456789", Some("GR"))]
    #[case("DE123456789", Some("FR"))]
    #[case("FR1", Some("FR"))]
    #[case("FR12345678901234", Some("FR"))]
    #[case("FR12_45", Some("FR"))]
    #[case("XX123456", None)]
    fn test_invalid_vat_ids(#[case] raw: &str, #[case] country: Option<&str>) {
        let err = normalize_vat_id(raw, country).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TAX_ID");
    }

    #[test]
    fn test_invalid_vat_id_is_rejected_before_rate_selection() {
        let err = resolve_tax(&vat(Some("BE"), None, Some("FR"), Some("BE0123"))).unwrap_err();
        assert!(matches!(err, FeeError::InvalidTaxId { .. }));
    }

    #[test]
    fn test_invalid_country_code() {
        let err = resolve_tax(&vat(Some("Belgium"), None, Some("FR"), None)).unwrap_err();
        assert_eq!(err, FeeError::InvalidCountry("Belgium".to_string()));
    }

    // ========== GST ==========

    #[test]
    fn test_gst_domestic_payer() {
        let applied = resolve_tax(&gst(Some("nz"), None)).unwrap().unwrap();
        assert_eq!(applied.rate_percent, dec!(15));
    }

    #[test]
    fn test_gst_foreign_payer() {
        let applied = resolve_tax(&gst(Some("AU"), None)).unwrap().unwrap();
        assert_eq!(applied.rate_percent, Decimal::ZERO);
    }

    #[test]
    fn test_gst_requires_nz_origin() {
        let mut ctx = gst(Some("NZ"), None);
        ctx.host_country = Some("AU".to_string());
        assert!(matches!(
            resolve_tax(&ctx).unwrap_err(),
            FeeError::UnsupportedTaxOrigin { .. }
        ));
    }

    #[test]
    fn test_gst_requires_payer_country() {
        assert!(matches!(
            resolve_tax(&gst(None, None)).unwrap_err(),
            FeeError::MissingCountry { party: "payer", .. }
        ));
    }

    #[rstest]
    #[case("12345678", true)]
    #[case("123-456-789", true)]
    #[case("1234567", false)]
    #[case("1234567890", false)]
    #[case("12a45678", false)]
    fn test_gst_number_format(#[case] raw: &str, #[case] valid: bool) {
        assert_eq!(normalize_gst_number(raw).is_ok(), valid);
    }
}
