//! `posters process` and `posters edit`.

use std::path::Path;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;

use poster_labels_core::models::{ProcessedItem, TenantKey};
use poster_labels_core::process::{
    DescriptionProcessor, EditReport, ItemEdit, PrintLayout, Summary,
};
use poster_labels_core::resolve::LearnOutcome;
use poster_labels_core::store::UpsertOutcome;

use crate::backend;
use crate::config::Config;
use crate::import;

#[derive(Serialize)]
struct ProcessOutput<'a> {
    tenant: &'a TenantKey,
    items: &'a [ProcessedItem],
    summary: Summary,
}

async fn load_items(
    config: &Config,
    csv: &Path,
    tenant: &TenantKey,
) -> Result<(DescriptionProcessor, Vec<ProcessedItem>)> {
    let lines = import::read_file(csv, config.import.delimiter_char())?;
    let processor = DescriptionProcessor::new(backend::open_resolver(config).await?);
    let items = processor.process_lines(&lines, tenant).await;
    Ok((processor, items))
}

/// Run the full pipeline over a price list and print the poster entries.
pub async fn run_process(
    config: &Config,
    csv: &Path,
    tenant: &TenantKey,
    layout: PrintLayout,
    json: bool,
) -> Result<()> {
    let (_, items) = load_items(config, csv, tenant).await?;
    let summary = Summary::of(&items, layout);

    if json {
        let output = ProcessOutput {
            tenant,
            items: &items,
            summary,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for item in &items {
        print_item(item);
    }
    println!();
    println!(
        "Products: {}  Entries: {}  Families: {}  Posters ({}): {}",
        summary.total_products,
        summary.entries,
        summary.families,
        match summary.layout {
            PrintLayout::TwoPerPage => "2 per page",
            PrintLayout::OnePerPage => "1 per page",
        },
        summary.pages
    );
    Ok(())
}

/// Process a price list, apply a review edit to one entry and learn from it.
pub async fn run_edit(
    config: &Config,
    csv: &Path,
    item_id: i64,
    edit: &ItemEdit,
    tenant: &TenantKey,
    session_id: &str,
) -> Result<()> {
    let (processor, mut items) = load_items(config, csv, tenant).await?;
    let item = match items.iter_mut().find(|i| i.id == item_id) {
        Some(item) => item,
        None => anyhow::bail!(
            "No entry with id {} in {} (run `posters process` to list ids)",
            item_id,
            csv.display()
        ),
    };

    let report = processor
        .apply_edit(item, edit, tenant, session_id)
        .await?;
    print_report(&report, processor.resolver().is_enabled());
    print_item(item);
    Ok(())
}

fn print_item(item: &ProcessedItem) {
    let label = item.formatted_label().replace('\n', " / ");
    let family = if item.is_family {
        format!("  (family of {})", item.member_count)
    } else {
        String::new()
    };
    println!(
        "[{}] {:<34} R$ {}{}",
        item.id,
        label,
        format_brl(item.price),
        family
    );
}

fn print_report(report: &EditReport, learning: bool) {
    if report.price_changed {
        println!("price updated");
    }
    if !learning {
        println!("learning disabled: no corrections saved");
        return;
    }
    for change in &report.learned {
        let status = match &change.outcome {
            LearnOutcome::Stored(UpsertOutcome::Created(id)) => format!("learned (#{})", id),
            LearnOutcome::Stored(UpsertOutcome::Updated(id)) => format!("updated (#{})", id),
            LearnOutcome::Rejected(reason) => format!("not learned: {}", reason),
        };
        println!(
            "{}: '{}' -> '{}' {}",
            change.kind, change.from, change.to, status
        );
    }
}

/// `4.5` → `4,50`.
pub fn format_brl(price: Decimal) -> String {
    format!("{:.2}", price).replace('.', ",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_brl() {
        assert_eq!(format_brl(Decimal::new(45, 1)), "4,50");
        assert_eq!(format_brl(Decimal::new(123456, 2)), "1234,56");
    }
}
