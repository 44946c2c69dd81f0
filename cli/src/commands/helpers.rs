use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use psmf_core::models::{FoodEntry, Macros};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => parse_date_str(&s),
    }
}

pub(crate) fn parse_date_str(s: &str) -> Result<NaiveDate> {
    match s {
        "today" => Ok(Local::now().date_naive()),
        "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
        "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
        _ => NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| {
            format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
        }),
    }
}

/// Resolve a full id or a unique prefix of one (as printed in tables).
pub(crate) fn resolve_id<'a, I>(ids: I, query: &str) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let query = query.trim();
    if query.is_empty() {
        bail!("Id must not be empty");
    }
    let matches: Vec<&str> = ids.into_iter().filter(|id| id.starts_with(query)).collect();
    if let Some(exact) = matches.iter().find(|id| **id == query) {
        return Ok((*exact).to_string());
    }
    match matches.as_slice() {
        [] => bail!("No item with id '{query}'"),
        [one] => Ok((*one).to_string()),
        _ => bail!("Id prefix '{query}' is ambiguous ({} matches)", matches.len()),
    }
}

pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub(crate) fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N]: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub(crate) fn format_macros(m: &Macros) -> String {
    let cal = no_neg_zero(m.calories);
    let p = no_neg_zero(m.protein);
    let f = no_neg_zero(m.fat);
    let c = no_neg_zero(m.carbs);
    format!("{cal:.0} kcal | P:{p:.0}g F:{f:.0}g C:{c:.0}g")
}

pub(crate) fn print_entries_table(entries: &[FoodEntry]) {
    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "kcal")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Fat")]
        fat: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            id: short_id(&e.id).to_string(),
            time: e
                .timestamp
                .with_timezone(&Local)
                .format("%H:%M")
                .to_string(),
            name: truncate(&e.name, 35),
            calories: format!("{:.0}", no_neg_zero(e.macros.calories)),
            protein: format!("{:.0}g", no_neg_zero(e.macros.protein)),
            fat: format!("{:.0}g", no_neg_zero(e.macros.fat)),
            carbs: format!("{:.0}g", no_neg_zero(e.macros.carbs)),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
