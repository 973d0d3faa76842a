use anyhow::Context;
use serde::{Deserialize, Serialize};
use splitty_core::{
    assign, fill_shared_charges, validate_assignments, BillResult, BillSplitter, Config,
    CurrencyCode, LineItem, Participant, ParticipantBill, Roster, SplitMode,
};
use splitty_fx::detect_currency;
use splitty_ocr::{ReceiptPipeline, TableParser};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Read;
use std::path::{Path, PathBuf};

/// `config.toml` in the per-user config directory, if one has been written.
pub fn default_config_path() -> Option<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "splitty", "Splitty")?;
    let path = dirs.config_dir().join("config.toml");
    path.exists().then_some(path)
}

/// Reads a file, or stdin when the path is `-`.
pub fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("failed to read stdin")?;
        return Ok(content);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

// ── process ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ProcessOutput<'a> {
    items: &'a [LineItem],
    source_currency: &'a CurrencyCode,
    target_currency: &'a CurrencyCode,
    converted: bool,
    skipped_rows: usize,
}

pub async fn process(
    config: &Config,
    image: &Path,
    target: Option<&str>,
    json: bool,
) -> anyhow::Result<String> {
    let target = match target {
        Some(code) => CurrencyCode::new(code)?,
        None => config.split.target_currency.clone(),
    };
    let pipeline = ReceiptPipeline::from_config(config)?;
    let receipt = pipeline
        .process_file(image, &target)
        .await
        .with_context(|| format!("failed to process {}", image.display()))?;

    if json {
        return Ok(serde_json::to_string_pretty(&ProcessOutput {
            items: &receipt.items,
            source_currency: &receipt.source_currency,
            target_currency: &receipt.target_currency,
            converted: receipt.converted(),
            skipped_rows: receipt.skipped_rows,
        })?);
    }

    let mut out = render_items(&receipt.items, &receipt.source_currency, Some(&target))?;
    if !receipt.converted() && receipt.source_currency != target && !receipt.items.is_empty() {
        writeln!(out, "(amounts not converted, shown in {})", receipt.source_currency)?;
    }
    if receipt.skipped_rows > 0 {
        writeln!(out, "{} table row(s) skipped", receipt.skipped_rows)?;
    }
    Ok(out.trim_end().to_string())
}

// ── parse ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ParseOutput<'a> {
    currency: CurrencyCode,
    items: &'a [LineItem],
    skipped: Vec<SkippedOutput>,
}

#[derive(Debug, Serialize)]
struct SkippedOutput {
    line: usize,
    reason: String,
}

pub fn parse(markdown: &str, json: bool) -> anyhow::Result<String> {
    let report = TableParser::parse_report(markdown);
    let currency = detect_currency(markdown);

    if json {
        let skipped = report
            .skipped
            .iter()
            .map(|s| SkippedOutput { line: s.line, reason: s.reason.to_string() })
            .collect();
        return Ok(serde_json::to_string_pretty(&ParseOutput {
            currency,
            items: &report.items,
            skipped,
        })?);
    }

    let mut out = render_items(&report.items, &currency, None)?;
    for row in &report.skipped {
        writeln!(out, "skipped line {}: {}", row.line, row.reason)?;
    }
    Ok(out.trim_end().to_string())
}

// ── split ─────────────────────────────────────────────────────────────────────

/// Accepts a bare item list or any object with an `items` field, such as the
/// output of `process --json`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ItemsFile {
    List(Vec<LineItem>),
    Wrapped { items: Vec<LineItem> },
}

fn read_items(content: &str) -> anyhow::Result<Vec<LineItem>> {
    let file: ItemsFile = serde_json::from_str(content).context("expected a JSON item list")?;
    Ok(match file {
        ItemsFile::List(items) | ItemsFile::Wrapped { items } => items,
    })
}

#[derive(Debug, Serialize)]
struct SplitOutput {
    mode: SplitMode,
    user_totals: BillResult,
    breakdown: BTreeMap<Participant, ParticipantBill>,
}

pub fn split(
    content: &str,
    participants: &[String],
    mode: SplitMode,
    everyone: bool,
    json: bool,
) -> anyhow::Result<String> {
    let mut items = read_items(content)?;
    let roster = Roster::new(participants.iter().map(|p| Participant::new(p.trim())))?;

    fill_shared_charges(&mut items, &roster);
    if everyone {
        for item in items.iter_mut().filter(|i| i.shared_by.is_empty()) {
            assign(item, roster.participants().iter().cloned());
        }
    }
    validate_assignments(&items, &roster)?;

    let unassigned: Vec<&str> = items
        .iter()
        .filter(|i| i.shared_by.is_empty())
        .map(|i| i.name.as_str())
        .collect();
    if !unassigned.is_empty() {
        tracing::warn!(items = ?unassigned, "items without participants are left out of the split");
    }

    let splitter = BillSplitter::new(mode);
    let breakdown = splitter.breakdown(&items);
    let user_totals: BillResult = breakdown.iter().map(|(p, b)| (p.clone(), b.total)).collect();

    if json {
        return Ok(serde_json::to_string_pretty(&SplitOutput { mode, user_totals, breakdown })?);
    }

    let mut out = String::new();
    for (participant, bill) in &breakdown {
        writeln!(out, "{participant}: {}", bill.total)?;
        for line in &bill.items {
            writeln!(out, "    {:<24} {:>10}", line.item, line.share.to_string())?;
        }
    }
    let owed = user_totals.values().fold(splitty_core::Money::zero(), |acc, m| acc + *m);
    writeln!(out, "total owed: {owed}")?;
    Ok(out.trim_end().to_string())
}

fn render_items(
    items: &[LineItem],
    source: &CurrencyCode,
    target: Option<&CurrencyCode>,
) -> anyhow::Result<String> {
    let mut out = String::new();
    if items.is_empty() {
        writeln!(out, "no line items found")?;
        return Ok(out);
    }
    for item in items {
        write!(
            out,
            "{:<24} {:>3} x {:>8} = {:>9} {source}",
            item.name,
            item.quantity,
            item.unit_price.to_string(),
            item.line_total.to_string(),
        )?;
        match (item.converted_total, target) {
            (Some(converted), Some(target)) => writeln!(out, "  ({converted} {target})")?,
            _ => writeln!(out)?,
        }
    }
    Ok(out)
}
