//! The description-processing pipeline and the review stage.
//!
//! ```text
//! RawLine ─► normalize/extract ─► resolve NOME/GRAMAGEM/VARIEDADE ─► ProcessedItem
//!                                                                   │
//!                      Vec<ProcessedItem> ─► group_families ─► poster entries
//! ```
//!
//! [`DescriptionProcessor::apply_edit`] is the write path: fields the user
//! changes during review are fed back to the resolver as new corrections.

use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::extract::extract;
use crate::group::group_families;
use crate::models::{round_price, FieldKind, ProcessedItem, RawLine, TenantKey};
use crate::resolve::{CorrectionResolver, LearnOutcome};

/// Turns raw lines into poster entries for one resolver.
///
/// Item ids are process-local and increase monotonically across calls.
pub struct DescriptionProcessor {
    resolver: CorrectionResolver,
    next_id: AtomicI64,
}

impl DescriptionProcessor {
    pub fn new(resolver: CorrectionResolver) -> Self {
        Self {
            resolver,
            next_id: AtomicI64::new(1),
        }
    }

    pub fn resolver(&self) -> &CorrectionResolver {
        &self.resolver
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Extract and resolve one line into a single (non-family) item.
    pub async fn process_line(&self, line: &RawLine, tenant: &TenantKey) -> ProcessedItem {
        let fields = extract(&line.description);

        let base_name = self
            .resolver
            .resolve(&fields.base_name, FieldKind::Name, tenant)
            .await;
        let weight = self
            .resolver
            .resolve(&fields.weight, FieldKind::Weight, tenant)
            .await;
        let variety = self
            .resolver
            .resolve(&fields.variety, FieldKind::Variety, tenant)
            .await;

        ProcessedItem::new(
            self.allocate_id(),
            base_name,
            weight,
            variety,
            line.price,
            line.description.trim(),
        )
    }

    /// Process every line, then merge same-name lines into families.
    pub async fn process_lines(&self, lines: &[RawLine], tenant: &TenantKey) -> Vec<ProcessedItem> {
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            items.push(self.process_line(line, tenant).await);
        }
        group_families(items, || self.allocate_id())
    }

    /// Apply a review edit to `item` and learn from every changed field.
    ///
    /// Fields are reassigned and the label re-derived before learning, so
    /// the item reflects the edit even if saving a correction fails. With
    /// no store configured, the edit is applied and nothing is learned.
    pub async fn apply_edit(
        &self,
        item: &mut ProcessedItem,
        edit: &ItemEdit,
        tenant: &TenantKey,
        session_id: &str,
    ) -> Result<EditReport> {
        let mut changes = Vec::new();
        for kind in FieldKind::ALL {
            if let Some(value) = edit.field(kind) {
                let value = value.trim();
                if value != item.field(kind) {
                    changes.push((kind, item.field(kind).to_string(), value.to_string()));
                }
            }
        }

        let mut report = EditReport::default();
        if let Some(text) = &edit.price {
            let price = parse_price(text)?;
            if price != item.price {
                item.set_price(price);
                report.price_changed = true;
            }
        }
        for (kind, _, new) in &changes {
            item.set_field(*kind, new.clone());
        }

        if !self.resolver.is_enabled() {
            return Ok(report);
        }
        for (kind, old, new) in changes {
            let outcome = self.resolver.learn(&old, &new, kind, tenant, session_id).await?;
            report.learned.push(FieldChange {
                kind,
                from: old,
                to: new,
                outcome,
            });
        }
        Ok(report)
    }
}

/// User-supplied replacements for an item under review. `None` keeps the
/// current value.
#[derive(Debug, Clone, Default)]
pub struct ItemEdit {
    pub name: Option<String>,
    pub weight: Option<String>,
    pub variety: Option<String>,
    /// Lenient price text, see [`parse_price`].
    pub price: Option<String>,
}

impl ItemEdit {
    pub fn field(&self, kind: FieldKind) -> Option<&str> {
        match kind {
            FieldKind::Name => self.name.as_deref(),
            FieldKind::Weight => self.weight.as_deref(),
            FieldKind::Variety => self.variety.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub kind: FieldKind,
    pub from: String,
    pub to: String,
    pub outcome: LearnOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditReport {
    pub learned: Vec<FieldChange>,
    pub price_changed: bool,
}

/// Parse a price as typed by a Brazilian user.
///
/// Accepts `4,50`, `4.50`, `R$ 4,50` and `1.234,56`. When both separators
/// appear, the last one is the decimal separator; a lone `,` is always
/// decimal, as is a lone `.`. Repeated dots with no comma are thousands
/// separators. The result is rounded to cents. Negative prices are refused.
pub fn parse_price(text: &str) -> Result<Decimal> {
    let cleaned: String = text
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        anyhow::bail!("price is empty");
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let canonical = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        // A lone dot before exactly three digits groups thousands: "1.234".
        (None, Some(d)) if is_thousands_group(&cleaned[d + 1..]) => cleaned.replace('.', ""),
        _ => cleaned,
    };

    let price = Decimal::from_str(&canonical)
        .map_err(|e| anyhow::anyhow!("invalid price '{}': {}", text.trim(), e))?;
    if price.is_sign_negative() && !price.is_zero() {
        anyhow::bail!("price must not be negative: '{}'", text.trim());
    }
    Ok(round_price(price))
}

fn is_thousands_group(tail: &str) -> bool {
    tail.len() == 3 && tail.chars().all(|c| c.is_ascii_digit())
}

/// How finished posters are laid out on paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintLayout {
    #[default]
    TwoPerPage,
    OnePerPage,
}

impl PrintLayout {
    pub fn pages_for(&self, entries: usize) -> usize {
        match self {
            PrintLayout::TwoPerPage => entries.div_ceil(2),
            PrintLayout::OnePerPage => entries,
        }
    }
}

impl FromStr for PrintLayout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "2" | "two" | "two-per-page" => Ok(PrintLayout::TwoPerPage),
            "1" | "one" | "one-per-page" => Ok(PrintLayout::OnePerPage),
            other => anyhow::bail!(
                "Unknown print layout: '{}'. Must be two-per-page or one-per-page.",
                other
            ),
        }
    }
}

/// Totals shown before printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Raw lines represented, counting every family member.
    pub total_products: usize,
    pub families: usize,
    /// Poster entries after grouping.
    pub entries: usize,
    pub layout: PrintLayout,
    pub pages: usize,
}

impl Summary {
    pub fn of(items: &[ProcessedItem], layout: PrintLayout) -> Self {
        Self {
            total_products: items.iter().map(|i| i.member_count).sum(),
            families: items.iter().filter(|i| i.is_family).count(),
            entries: items.len(),
            layout,
            pages: layout.pages_for(items.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::lifecycle::Rejection;
    use crate::models::CorrectionState;
    use crate::store::memory::InMemoryCorrectionStore;
    use crate::store::{CorrectionStore, UpsertOutcome};

    fn line(description: &str, cents: i64) -> RawLine {
        RawLine::new(description, Decimal::new(cents, 2))
    }

    fn with_store() -> (Arc<InMemoryCorrectionStore>, DescriptionProcessor) {
        let store = Arc::new(InMemoryCorrectionStore::new());
        let processor = DescriptionProcessor::new(CorrectionResolver::new(store.clone()));
        (store, processor)
    }

    #[tokio::test]
    async fn test_end_to_end_coca_cola() {
        let (_, p) = with_store();
        let price = parse_price("4,50").unwrap();
        let items = p
            .process_lines(&[RawLine::new("COCA COLA LATA 350ML", price)], &TenantKey::anonymous())
            .await;
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.base_name(), "COCA COLA");
        assert_eq!(item.weight(), "350ML");
        assert_eq!(item.variety(), "LATA");
        assert_eq!(item.price, Decimal::new(450, 2));
        assert_eq!(item.formatted_label(), "COCA COLA LATA\n350ML");
        assert!(item.formatted_label().lines().all(|l| l.chars().count() <= 16));
    }

    #[tokio::test]
    async fn test_resolver_applied_per_field() {
        let (store, p) = with_store();
        let t = TenantKey::anonymous();
        store.insert_raw(&t, FieldKind::Name, "REFRI GUARANA", "GUARANÁ ANTARCTICA", true, 1).unwrap();
        store.insert_raw(&t, FieldKind::Weight, "2L", "2 LITROS", true, 1).unwrap();
        let item = p.process_line(&line("REFRI GUARANA 2L", 899), &t).await;
        assert_eq!(item.base_name(), "GUARANÁ ANTARCTICA");
        assert_eq!(item.weight(), "2 LITROS");
        assert_eq!(item.original_text, "REFRI GUARANA 2L");
    }

    #[tokio::test]
    async fn test_families_and_ids() {
        let p = DescriptionProcessor::new(CorrectionResolver::disabled());
        let lines = vec![
            line("SUCO DEL VALLE UVA 1L", 799),
            line("ARROZ TIO JOAO 5KG", 2490),
            line("SUCO DEL VALLE LARANJA 1L", 899),
        ];
        let items = p.process_lines(&lines, &TenantKey::anonymous()).await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_family);
        assert_eq!(items[0].base_name(), "SUCO DEL VALLE");
        assert_eq!(items[0].variety(), "");
        assert_eq!(items[0].price, Decimal::new(849, 2));
        assert_eq!(items[0].id, 4);
        assert_eq!(items[1].id, 2);

        let summary = Summary::of(&items, PrintLayout::TwoPerPage);
        assert_eq!(summary.total_products, 3);
        assert_eq!(summary.families, 1);
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.pages, 1);
        assert_eq!(Summary::of(&items, PrintLayout::OnePerPage).pages, 2);
    }

    #[tokio::test]
    async fn test_edit_learns_changed_fields() {
        let (store, p) = with_store();
        let t = TenantKey::new(Some("maria"), Some("loja-centro"));
        let mut item = p.process_line(&line("REFRIG COCA 2L", 999), &t).await;
        assert_eq!(item.base_name(), "REFRIG COCA");

        let edit = ItemEdit {
            name: Some("REFRIGERANTE COCA-COLA".into()),
            weight: Some("2L".into()),
            price: Some("R$ 10,49".into()),
            ..Default::default()
        };
        let report = p.apply_edit(&mut item, &edit, &t, "sess-1").await.unwrap();
        assert!(report.price_changed);
        assert_eq!(report.learned.len(), 1);
        assert_eq!(report.learned[0].kind, FieldKind::Name);
        assert!(matches!(
            report.learned[0].outcome,
            LearnOutcome::Stored(UpsertOutcome::Created(_))
        ));
        assert_eq!(item.base_name(), "REFRIGERANTE COCA-COLA");
        assert_eq!(item.price, Decimal::new(1049, 2));
        assert_eq!(item.formatted_label(), "REFRIGERANTE\nCOCA-COLA 2L");

        let again = p.process_line(&line("refrig coca 2L", 999), &t).await;
        assert_eq!(again.base_name(), "REFRIGERANTE COCA-COLA");
        let history = store.history(&t, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].session_id, "sess-1");
    }

    #[tokio::test]
    async fn test_edit_rejected_correction_still_edits_item() {
        let (store, p) = with_store();
        let t = TenantKey::anonymous();
        let mut item = p.process_line(&line("REFRIGERANTE COLA", 500), &t).await;
        let edit = ItemEdit {
            name: Some("C".into()),
            ..Default::default()
        };
        let report = p.apply_edit(&mut item, &edit, &t, "s").await.unwrap();
        assert_eq!(report.learned[0].outcome, LearnOutcome::Rejected(Rejection::TooShort));
        assert_eq!(item.base_name(), "C");
        assert!(store
            .list_corrections(&t, CorrectionState::All, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_edit_without_store_learns_nothing() {
        let p = DescriptionProcessor::new(CorrectionResolver::disabled());
        let t = TenantKey::anonymous();
        let mut item = p.process_line(&line("FEIJAO 1KG", 800), &t).await;
        let edit = ItemEdit {
            variety: Some("CARIOCA".into()),
            ..Default::default()
        };
        let report = p.apply_edit(&mut item, &edit, &t, "s").await.unwrap();
        assert!(report.learned.is_empty());
        assert_eq!(item.formatted_label(), "FEIJAO CARIOCA\n1KG");
    }

    #[tokio::test]
    async fn test_edit_bad_price_fails_before_changes() {
        let p = DescriptionProcessor::new(CorrectionResolver::disabled());
        let t = TenantKey::anonymous();
        let mut item = p.process_line(&line("FEIJAO 1KG", 800), &t).await;
        let edit = ItemEdit {
            name: Some("FEIJAO PRETO".into()),
            price: Some("oito".into()),
            ..Default::default()
        };
        assert!(p.apply_edit(&mut item, &edit, &t, "s").await.is_err());
        assert_eq!(item.base_name(), "FEIJAO");
    }

    #[test]
    fn test_parse_price_formats() {
        assert_eq!(parse_price("4,50").unwrap(), Decimal::new(450, 2));
        assert_eq!(parse_price("4.50").unwrap(), Decimal::new(450, 2));
        assert_eq!(parse_price("R$ 4,50").unwrap(), Decimal::new(450, 2));
        assert_eq!(parse_price("1.234,56").unwrap(), Decimal::new(123456, 2));
        assert_eq!(parse_price("1,234.56").unwrap(), Decimal::new(123456, 2));
        assert_eq!(parse_price("1.234.567").unwrap(), Decimal::new(123456700, 2));
        assert_eq!(parse_price(" 7 ").unwrap(), Decimal::new(700, 2));
        assert_eq!(parse_price("2,999").unwrap(), Decimal::new(300, 2));
        assert_eq!(parse_price("12.5").unwrap(), Decimal::new(1250, 2));
    }

    #[test]
    fn test_parse_price_lone_dot_thousands() {
        assert_eq!(parse_price("1.234").unwrap(), Decimal::new(123400, 2));
        assert_eq!(parse_price("R$ 1.299").unwrap(), Decimal::new(129900, 2));
        assert_eq!(parse_price("1.2345").unwrap(), Decimal::new(123, 2));
    }

    #[test]
    fn test_parse_price_rejects() {
        assert!(parse_price("").is_err());
        assert!(parse_price("R$").is_err());
        assert!(parse_price("abc").is_err());
        assert!(parse_price("-1,00").is_err());
    }

    #[test]
    fn test_print_layout_pages() {
        assert_eq!(PrintLayout::TwoPerPage.pages_for(0), 0);
        assert_eq!(PrintLayout::TwoPerPage.pages_for(5), 3);
        assert_eq!(PrintLayout::OnePerPage.pages_for(5), 5);
        assert_eq!("one-per-page".parse::<PrintLayout>().unwrap(), PrintLayout::OnePerPage);
        assert!("three".parse::<PrintLayout>().is_err());
    }
}
