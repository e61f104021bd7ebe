//! Bounded textual summary of loaded records for the prompt.
//!
//! Layout, in order:
//!
//! 1. a header with file and row counts,
//! 2. a field inventory (dotted path, observed JSON types, rows carrying it),
//! 3. sample rows as compact JSON in input order,
//! 4. lines counting the fields and rows left out.
//!
//! Every line is cut to `max_row_chars`, and the whole text never exceeds
//! `max_chars`: inventory and rows stop being added once the budget is spent.
//!
//! Output depends only on the records and budgets, so the same input always
//! yields the same prompt.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write;

use crate::config::PromptConfig;
use crate::models::JsonRecord;
use crate::rows::{field_paths, rows, type_name};

/// Field paths listed in the inventory.
const MAX_INVENTORY_FIELDS: usize = 64;

pub fn summarize(records: &[JsonRecord], budget: &PromptConfig) -> String {
    let rows = rows(records);

    // Field inventory, first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut stats: HashMap<String, (BTreeSet<&'static str>, usize)> = HashMap::new();
    for row in &rows {
        for (path, value) in field_paths(row.value) {
            let entry = stats.entry(path.clone()).or_insert_with(|| {
                order.push(path.clone());
                (BTreeSet::new(), 0)
            });
            entry.0.insert(type_name(value));
            entry.1 += 1;
        }
    }

    // Room for the "more fields" and "rows omitted" trailers.
    let reserve = format!("- ... {} more field(s)\n", order.len()).chars().count()
        + format!("... {} more row(s) omitted\n", rows.len()).chars().count();
    let mut out = Budgeted::new(budget.max_chars.saturating_sub(reserve));

    let mut header = format!(
        "{} file(s), {} row(s). Array files are expanded into one row per element.",
        records.len(),
        rows.len()
    );
    truncate_chars(&mut header, budget.max_row_chars);
    header.push('\n');
    out.push(&header);

    let mut listed = 0usize;
    if !order.is_empty() && out.push("\nFields (path: types, rows present):\n") {
        for path in order.iter().take(MAX_INVENTORY_FIELDS) {
            let Some((types, count)) = stats.get(path) else {
                continue;
            };
            let types: Vec<&str> = types.iter().copied().collect();
            let mut line = format!("- {}: {}, {}", path, types.join("|"), count);
            truncate_chars(&mut line, budget.max_row_chars);
            line.push('\n');
            if !out.push(&line) {
                break;
            }
            listed += 1;
        }
    }

    let mut included = 0usize;
    if out.push("\nRows:\n") {
        for row in &rows {
            let mut line = format!(
                "[{}] {}",
                row.source_key,
                serde_json::to_string(row.value).unwrap_or_default()
            );
            truncate_chars(&mut line, budget.max_row_chars);
            line.push('\n');
            if !out.push(&line) {
                break;
            }
            included += 1;
        }
    }

    let mut out = out.into_inner();
    if order.len() > listed {
        let _ = writeln!(out, "- ... {} more field(s)", order.len() - listed);
    }
    let omitted = rows.len() - included;
    if omitted > 0 {
        let _ = writeln!(out, "... {} more row(s) omitted", omitted);
    }

    // Only reachable when the budget is smaller than the trailers.
    if let Some((idx, _)) = out.char_indices().nth(budget.max_chars) {
        out.truncate(idx);
    }
    out
}

/// String builder that refuses lines past a character limit.
struct Budgeted {
    text: String,
    used: usize,
    limit: usize,
}

impl Budgeted {
    fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            used: 0,
            limit,
        }
    }

    /// Append `line` whole if it fits; returns whether it was appended.
    fn push(&mut self, line: &str) -> bool {
        let len = line.chars().count();
        if self.used + len > self.limit {
            return false;
        }
        self.text.push_str(line);
        self.used += len;
        true
    }

    fn into_inner(self) -> String {
        self.text
    }
}

fn truncate_chars(s: &mut String, max: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
        s.push('…');
    }
}
