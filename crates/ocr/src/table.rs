use rust_decimal::Decimal;
use splitty_core::{LineItem, Money};
use std::fmt;
use std::str::FromStr;

const DELIMITER: char = '|';
const HEADER_KEYWORDS: [&str; 3] = ["item", "product", "description"];
const END_KEYWORDS: [&str; 3] = ["total", "subtotal", "amount due"];

// ── Skip diagnostics ──────────────────────────────────────────────────────────

/// Why a table row did not become a line item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The header has no column for this role.
    MissingColumn(Role),
    TooFewColumns { expected: usize, found: usize },
    EmptyField(Role),
    InvalidNumber { role: Role, raw: String },
    AmountTooLarge { role: Role, raw: String },
    ZeroPrice,
    ZeroQuantity,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingColumn(role) => write!(f, "header has no {role} column"),
            SkipReason::TooFewColumns { expected, found } => {
                write!(f, "expected {expected} columns, found {found}")
            }
            SkipReason::EmptyField(role) => write!(f, "empty {role} field"),
            SkipReason::InvalidNumber { role, raw } => write!(f, "unparseable {role}: '{raw}'"),
            SkipReason::AmountTooLarge { role, raw } => write!(f, "{role} out of range: '{raw}'"),
            SkipReason::ZeroPrice => write!(f, "zero price"),
            SkipReason::ZeroQuantity => write!(f, "zero quantity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Item,
    Price,
    Qty,
    Total,
}

impl Role {
    /// Every role the cell names, in declaration order.
    fn candidates(header_cell: &str) -> Vec<Role> {
        let cell = header_cell.to_lowercase();
        let mut roles = Vec::new();
        if HEADER_KEYWORDS.iter().any(|k| cell.contains(k)) {
            roles.push(Role::Item);
        }
        if cell.contains("price") {
            roles.push(Role::Price);
        }
        if cell.contains("qty") || cell.contains("quantity") {
            roles.push(Role::Qty);
        }
        if cell.contains("total") {
            roles.push(Role::Total);
        }
        roles
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Item => write!(f, "item"),
            Role::Price => write!(f, "price"),
            Role::Qty => write!(f, "qty"),
            Role::Total => write!(f, "total"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line number in the input text.
    pub line: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub items: Vec<LineItem>,
    pub skipped: Vec<SkippedRow>,
}

// ── Column map ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
struct ColumnMap {
    item: Option<usize>,
    price: Option<usize>,
    qty: Option<usize>,
    total: Option<usize>,
}

/// Column indices once every role is known to be present.
#[derive(Debug, Clone, Copy)]
struct Columns {
    item: usize,
    price: usize,
    qty: usize,
    total: usize,
}

impl ColumnMap {
    fn from_header(cells: &[&str]) -> Self {
        let mut map = ColumnMap::default();
        // A cell takes the first role it names that no earlier cell claimed,
        // so `Description | Item Total` maps the second cell to total.
        for (idx, cell) in cells.iter().enumerate() {
            let free = Role::candidates(cell)
                .into_iter()
                .find(|role| map.slot(*role).is_none());
            if let Some(role) = free {
                *map.slot(role) = Some(idx);
            }
        }
        map
    }

    fn slot(&mut self, role: Role) -> &mut Option<usize> {
        match role {
            Role::Item => &mut self.item,
            Role::Price => &mut self.price,
            Role::Qty => &mut self.qty,
            Role::Total => &mut self.total,
        }
    }

    fn resolve(&self) -> Result<Columns, SkipReason> {
        Ok(Columns {
            item: self.item.ok_or(SkipReason::MissingColumn(Role::Item))?,
            price: self.price.ok_or(SkipReason::MissingColumn(Role::Price))?,
            qty: self.qty.ok_or(SkipReason::MissingColumn(Role::Qty))?,
            total: self.total.ok_or(SkipReason::MissingColumn(Role::Total))?,
        })
    }
}

impl Columns {
    fn width(&self) -> usize {
        self.item.max(self.price).max(self.qty).max(self.total) + 1
    }
}

// ── Public parsing API ────────────────────────────────────────────────────────

/// Finds the pipe-delimited item table in OCR markdown and reads its rows.
pub struct TableParser;

impl TableParser {
    /// Line items in table order. Never fails: no table means no items.
    pub fn parse(markdown: &str) -> Vec<LineItem> {
        Self::parse_report(markdown).items
    }

    /// Like [`parse`](Self::parse), keeping the reason each dropped row was dropped.
    pub fn parse_report(markdown: &str) -> ParseReport {
        let lines: Vec<&str> = markdown.lines().collect();

        let Some(header) = find_header(&lines) else {
            tracing::debug!("no item table header found");
            return ParseReport::default();
        };

        let columns = ColumnMap::from_header(&split_cells(lines[header])).resolve();
        let start = (header + 2).min(lines.len());
        let end = find_table_end(&lines, start);
        tracing::debug!(header = header + 1, start = start + 1, end = end + 1, "item table located");

        let mut report = ParseReport::default();
        for (idx, line) in lines.iter().enumerate().take(end).skip(start) {
            let row = columns
                .clone()
                .and_then(|cols| parse_row(&split_cells(line), cols));
            match row {
                Ok(item) => report.items.push(item),
                Err(reason) => {
                    tracing::debug!(line = idx + 1, %reason, "skipping table row");
                    report.skipped.push(SkippedRow { line: idx + 1, reason });
                }
            }
        }

        tracing::debug!(
            items = report.items.len(),
            skipped = report.skipped.len(),
            "item table parsed"
        );
        report
    }
}

// ── Table location ────────────────────────────────────────────────────────────

fn delimiter_count(line: &str) -> usize {
    line.matches(DELIMITER).count()
}

fn find_header(lines: &[&str]) -> Option<usize> {
    lines.iter().position(|line| {
        delimiter_count(line) >= 2
            && split_cells(line).iter().any(|cell| {
                let cell = cell.to_lowercase();
                HEADER_KEYWORDS.iter().any(|k| cell.contains(k))
            })
    })
}

/// Index of the first line that is no longer part of the table.
fn find_table_end(lines: &[&str], start: usize) -> usize {
    lines
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, line)| {
            let lower = line.to_lowercase();
            delimiter_count(line) < 2 || END_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .map(|(idx, _)| idx)
        .unwrap_or(lines.len())
}

/// Trimmed cells; one leading and one trailing pipe are dropped first.
fn split_cells(line: &str) -> Vec<&str> {
    let line = line.trim();
    let line = line.strip_prefix(DELIMITER).unwrap_or(line);
    let line = line.strip_suffix(DELIMITER).unwrap_or(line);
    line.split(DELIMITER).map(str::trim).collect()
}

// ── Row parsing ───────────────────────────────────────────────────────────────

fn parse_row(cells: &[&str], cols: Columns) -> Result<LineItem, SkipReason> {
    if cells.len() < cols.width() {
        return Err(SkipReason::TooFewColumns { expected: cols.width(), found: cells.len() });
    }

    let name = non_empty(cells[cols.item], Role::Item)?;
    let price_raw = non_empty(cells[cols.price], Role::Price)?;
    let qty_raw = non_empty(cells[cols.qty], Role::Qty)?;
    let total_raw = non_empty(cells[cols.total], Role::Total)?;

    let unit_price = parse_amount(price_raw, Role::Price)?;
    if unit_price.is_zero() {
        return Err(SkipReason::ZeroPrice);
    }
    let quantity = parse_quantity(qty_raw)?;
    let line_total = parse_amount(total_raw, Role::Total)?;

    Ok(LineItem::new(name, unit_price, quantity, line_total))
}

fn non_empty(cell: &str, role: Role) -> Result<&str, SkipReason> {
    if cell.is_empty() {
        Err(SkipReason::EmptyField(role))
    } else {
        Ok(cell)
    }
}

/// Keeps digits and the decimal point only, so `€12.50` and `12.50 EUR` both read as 12.50.
fn parse_amount(raw: &str, role: Role) -> Result<Money, SkipReason> {
    let clean: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    let amount = Decimal::from_str(&clean)
        .map(Money::new)
        .map_err(|_| SkipReason::InvalidNumber { role, raw: raw.to_string() })?;
    if !amount.within_limit() {
        return Err(SkipReason::AmountTooLarge { role, raw: raw.to_string() });
    }
    Ok(amount)
}

fn parse_quantity(raw: &str) -> Result<u32, SkipReason> {
    let clean: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let qty: u32 = clean
        .parse()
        .map_err(|_| SkipReason::InvalidNumber { role: Role::Qty, raw: raw.to_string() })?;
    if qty == 0 {
        return Err(SkipReason::ZeroQuantity);
    }
    Ok(qty)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
