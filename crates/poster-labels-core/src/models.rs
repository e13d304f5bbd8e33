//! Core data models used throughout Poster Labels.
//!
//! These types represent the raw CSV lines, the processed poster entries,
//! and the learned corrections that flow through the processing pipeline.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::label::format_label;

/// User id used when the caller is not authenticated.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Company id used when the caller is not bound to a company.
pub const DEFAULT_COMPANY: &str = "default";

/// One `description;price` row, before any processing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    pub description: String,
    pub price: Decimal,
}

impl RawLine {
    pub fn new(description: impl Into<String>, price: Decimal) -> Self {
        Self {
            description: description.into(),
            price,
        }
    }
}

/// Which extracted field a correction applies to.
///
/// The wire names (`NOME`, `GRAMAGEM`, `VARIEDADE`) are what the store
/// persists; the English names are accepted when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldKind {
    #[serde(rename = "NOME")]
    Name,
    #[serde(rename = "GRAMAGEM")]
    Weight,
    #[serde(rename = "VARIEDADE")]
    Variety,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [FieldKind::Name, FieldKind::Weight, FieldKind::Variety];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Name => "NOME",
            FieldKind::Weight => "GRAMAGEM",
            FieldKind::Variety => "VARIEDADE",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NOME" | "NAME" => Ok(FieldKind::Name),
            "GRAMAGEM" | "WEIGHT" => Ok(FieldKind::Weight),
            "VARIEDADE" | "VARIETY" => Ok(FieldKind::Variety),
            "" => anyhow::bail!("field kind must not be empty"),
            other => anyhow::bail!(
                "Unknown field kind: '{}'. Must be NOME, GRAMAGEM, or VARIEDADE.",
                other
            ),
        }
    }
}

/// The (user, company) scope that isolates one customer's corrections.
///
/// Computed once at the boundary. Missing or blank ids collapse to
/// [`ANONYMOUS_USER`] / [`DEFAULT_COMPANY`], so anonymous sessions share
/// one coherent namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TenantKey {
    user_id: String,
    company_id: String,
}

impl TenantKey {
    pub fn new(user_id: Option<&str>, company_id: Option<&str>) -> Self {
        fn or_default(value: Option<&str>, fallback: &str) -> String {
            match value.map(str::trim) {
                Some(v) if !v.is_empty() => v.to_string(),
                _ => fallback.to_string(),
            }
        }
        Self {
            user_id: or_default(user_id, ANONYMOUS_USER),
            company_id: or_default(company_id, DEFAULT_COMPANY),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(None, None)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn company_id(&self) -> &str {
        &self.company_id
    }
}

impl Default for TenantKey {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user_id, self.company_id)
    }
}

/// A single poster entry: one CSV line, or a family of merged lines.
///
/// The three text fields are private so that `formatted_label` can never
/// drift from them; every mutation goes through [`ProcessedItem::set_fields`]
/// or one of the single-field setters, which re-derive the label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedItem {
    pub id: i64,
    base_name: String,
    weight: String,
    variety: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub original_text: String,
    formatted_label: String,
    pub is_family: bool,
    pub member_count: usize,
    pub members: Vec<ProcessedItem>,
}

impl ProcessedItem {
    /// Build a single-line item. The price is rounded to 2 decimal places.
    pub fn new(
        id: i64,
        base_name: impl Into<String>,
        weight: impl Into<String>,
        variety: impl Into<String>,
        price: Decimal,
        original_text: impl Into<String>,
    ) -> Self {
        let mut item = Self {
            id,
            base_name: base_name.into(),
            weight: weight.into(),
            variety: variety.into(),
            price: round_price(price),
            original_text: original_text.into(),
            formatted_label: String::new(),
            is_family: false,
            member_count: 1,
            members: Vec::new(),
        };
        item.refresh_label();
        item
    }

    /// Build a family item from its already-reconciled fields and members.
    pub fn family(
        id: i64,
        base_name: impl Into<String>,
        weight: impl Into<String>,
        variety: impl Into<String>,
        price: Decimal,
        members: Vec<ProcessedItem>,
    ) -> Self {
        let original_text = members
            .iter()
            .map(|m| m.original_text.as_str())
            .collect::<Vec<_>>()
            .join(" | ");
        let mut item = Self::new(id, base_name, weight, variety, price, original_text);
        item.is_family = true;
        item.member_count = members.len();
        item.members = members;
        item
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn weight(&self) -> &str {
        &self.weight
    }

    pub fn variety(&self) -> &str {
        &self.variety
    }

    pub fn formatted_label(&self) -> &str {
        &self.formatted_label
    }

    pub fn field(&self, kind: FieldKind) -> &str {
        match kind {
            FieldKind::Name => &self.base_name,
            FieldKind::Weight => &self.weight,
            FieldKind::Variety => &self.variety,
        }
    }

    /// Reassign all three text fields and re-derive the label.
    pub fn set_fields(
        &mut self,
        base_name: impl Into<String>,
        weight: impl Into<String>,
        variety: impl Into<String>,
    ) {
        self.base_name = base_name.into();
        self.weight = weight.into();
        self.variety = variety.into();
        self.refresh_label();
    }

    pub fn set_field(&mut self, kind: FieldKind, value: impl Into<String>) {
        let value = value.into();
        match kind {
            FieldKind::Name => self.base_name = value,
            FieldKind::Weight => self.weight = value,
            FieldKind::Variety => self.variety = value,
        }
        self.refresh_label();
    }

    pub fn set_price(&mut self, price: Decimal) {
        self.price = round_price(price);
    }

    fn refresh_label(&mut self) {
        self.formatted_label = format_label(&self.base_name, &self.variety, &self.weight);
    }
}

/// Round to currency scale (exactly 2 fractional digits, half away from zero).
pub fn round_price(price: Decimal) -> Decimal {
    let mut rounded =
        price.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// A learned (original → corrected) mapping for one field kind and tenant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correction {
    pub id: i64,
    pub tenant: TenantKey,
    pub field_kind: FieldKind,
    pub original_text: String,
    pub corrected_text: String,
    pub usage_count: i64,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_used_at: i64,
}

/// One accepted learn event. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionHistoryEntry {
    pub id: i64,
    pub tenant: TenantKey,
    pub session_id: String,
    pub field_kind: FieldKind,
    pub original_text: String,
    pub corrected_text: String,
    pub created_at: i64,
}

/// A validated learn request, as handed to [`CorrectionStore::record_correction`](crate::store::CorrectionStore::record_correction).
#[derive(Debug, Clone)]
pub struct LearnedCorrection {
    pub tenant: TenantKey,
    pub session_id: String,
    pub field_kind: FieldKind,
    pub original_text: String,
    pub corrected_text: String,
    pub at: i64,
}

/// Selects corrections by activation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrectionState {
    #[default]
    Active,
    Inactive,
    All,
}

impl CorrectionState {
    pub fn matches(&self, active: bool) -> bool {
        match self {
            CorrectionState::Active => active,
            CorrectionState::Inactive => !active,
            CorrectionState::All => true,
        }
    }
}

impl FromStr for CorrectionState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(CorrectionState::Active),
            "inactive" => Ok(CorrectionState::Inactive),
            "all" => Ok(CorrectionState::All),
            other => anyhow::bail!(
                "Unknown correction state: '{}'. Must be active, inactive, or all.",
                other
            ),
        }
    }
}

/// Per-tenant correction counts for the administration view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorrectionStats {
    pub total: i64,
    pub active: i64,
    pub history: i64,
    pub names: i64,
    pub weights: i64,
    pub varieties: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_defaults() {
        let t = TenantKey::new(None, Some("  "));
        assert_eq!(t.user_id(), ANONYMOUS_USER);
        assert_eq!(t.company_id(), DEFAULT_COMPANY);
        assert_eq!(t, TenantKey::anonymous());
    }

    #[test]
    fn test_tenant_trims_ids() {
        let t = TenantKey::new(Some(" maria "), Some("loja-1"));
        assert_eq!(t.user_id(), "maria");
        assert_eq!(t.to_string(), "maria@loja-1");
    }

    #[test]
    fn test_field_kind_parse() {
        assert_eq!("nome".parse::<FieldKind>().unwrap(), FieldKind::Name);
        assert_eq!("WEIGHT".parse::<FieldKind>().unwrap(), FieldKind::Weight);
        assert_eq!("Variedade".parse::<FieldKind>().unwrap(), FieldKind::Variety);
        assert!("".parse::<FieldKind>().is_err());
        assert!("MARCA".parse::<FieldKind>().is_err());
    }

    #[test]
    fn test_label_follows_fields() {
        let mut item = ProcessedItem::new(1, "ARROZ", "5KG", "", Decimal::new(2490, 2), "ARROZ 5KG");
        assert_eq!(item.formatted_label(), "ARROZ 5KG");
        item.set_field(FieldKind::Name, "ARROZ TIO JOAO");
        assert_eq!(item.formatted_label(), "ARROZ TIO JOAO\n5KG");
        item.set_fields("FEIJAO", "1KG", "");
        assert_eq!(item.formatted_label(), "FEIJAO 1KG");
    }

    #[test]
    fn test_price_rounded_to_cents() {
        let item = ProcessedItem::new(1, "A", "", "", Decimal::new(45049, 4), "A");
        assert_eq!(item.price, Decimal::new(450, 2));
        let whole = ProcessedItem::new(2, "B", "", "", Decimal::new(7, 0), "B");
        assert_eq!(whole.price.to_string(), "7.00");
    }

    #[test]
    fn test_family_joins_original_text() {
        let a = ProcessedItem::new(1, "SUCO", "1L", "UVA", Decimal::new(500, 2), "SUCO UVA 1L");
        let b = ProcessedItem::new(2, "SUCO", "1L", "", Decimal::new(600, 2), "SUCO 1L");
        let fam = ProcessedItem::family(3, "SUCO", "1L", "", Decimal::new(550, 2), vec![a, b]);
        assert!(fam.is_family);
        assert_eq!(fam.member_count, 2);
        assert_eq!(fam.original_text, "SUCO UVA 1L | SUCO 1L");
    }

    #[test]
    fn test_item_serializes_label_and_price() {
        let item = ProcessedItem::new(7, "ARROZ", "5KG", "", Decimal::new(2490, 2), "ARROZ 5KG");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["formatted_label"], "ARROZ 5KG");
        assert_eq!(json["price"], "24.90");
        assert_eq!(json["base_name"], "ARROZ");
    }
}
