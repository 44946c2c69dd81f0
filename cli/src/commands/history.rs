use anyhow::Result;
use chrono::{Datelike, Local, NaiveDate};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use psmf_core::calendar::{CalendarDay, CalendarStatus};
use psmf_core::service::PsmfService;

use super::helpers::json_error;
use super::status::print_day_log;

fn status_mark(status: CalendarStatus) -> &'static str {
    match status {
        CalendarStatus::Future => ".",
        CalendarStatus::Today => "*",
        CalendarStatus::Perfect => "P",
        CalendarStatus::Good => "G",
        CalendarStatus::Bad => "B",
        CalendarStatus::Pending => "?",
        CalendarStatus::Missed => "-",
    }
}

/// Lay the protocol out in Monday-first weeks, one cell per day.
pub(crate) fn render_calendar(days: &[CalendarDay]) -> String {
    let mut out = String::from("  Mo  Tu  We  Th  Fr  Sa  Su\n");
    let Some(first) = days.first() else {
        return out;
    };
    let lead = first.date.weekday().num_days_from_monday() as usize;
    let mut col = lead;
    out.push_str(&"    ".repeat(lead));
    for day in days {
        out.push_str(&format!("{:>3}{}", day.date.day(), status_mark(day.status)));
        col += 1;
        if col == 7 {
            out.push('\n');
            col = 0;
        }
    }
    if col != 0 {
        out.push('\n');
    }
    out
}

pub(crate) fn cmd_calendar(svc: &PsmfService, json: bool) -> Result<()> {
    let today = Local::now().date_naive();
    let days = svc.calendar(today)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&days)?);
        return Ok(());
    }

    print!("{}", render_calendar(&days));
    println!("\n  P perfect  G good  B bad  - missed  * today  . upcoming");
    Ok(())
}

pub(crate) fn cmd_day(svc: &PsmfService, date: NaiveDate, json: bool) -> Result<()> {
    let Some(log) = svc.day_log(date) else {
        let msg = format!("No archived day for {date}");
        if json {
            println!("{}", json_error(&msg));
        } else {
            eprintln!("{msg}");
        }
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(log)?);
    } else {
        print_day_log(log);
    }
    Ok(())
}

pub(crate) fn cmd_history(svc: &PsmfService, days: Option<usize>, json: bool) -> Result<()> {
    let mut history = svc.history();
    if let Some(n) = days {
        let skip = history.len().saturating_sub(n);
        history.drain(..skip);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        eprintln!("No finished days yet. Use `psmf finish` at the end of the day.");
        process::exit(2);
    }

    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Score")]
        score: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Weight (kg)")]
        weight: String,
        #[tabled(rename = "kcal")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
    }

    let rows: Vec<HistoryRow> = history
        .iter()
        .map(|d| HistoryRow {
            date: d.date.format("%Y-%m-%d").to_string(),
            score: format!("{}%", d.score),
            status: d.status.to_string(),
            weight: format!("{:.1}", d.weight),
            calories: d
                .details
                .as_ref()
                .map_or("-".into(), |x| format!("{:.0}", x.macros.calories)),
            protein: d
                .details
                .as_ref()
                .map_or("-".into(), |x| format!("{:.0}g", x.macros.protein)),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(date: &str, status: CalendarStatus) -> CalendarDay {
        CalendarDay {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            day_number: 1,
            status,
            score: None,
        }
    }

    #[test]
    fn test_render_calendar_empty() {
        assert_eq!(render_calendar(&[]), "  Mo  Tu  We  Th  Fr  Sa  Su\n");
    }

    #[test]
    fn test_render_calendar_alignment() {
        // 2024-06-01 is a Saturday
        let days = vec![
            day("2024-06-01", CalendarStatus::Perfect),
            day("2024-06-02", CalendarStatus::Missed),
            day("2024-06-03", CalendarStatus::Today),
        ];
        let out = render_calendar(&days);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], format!("{}  1P  2-", "    ".repeat(5)));
        assert_eq!(lines[2], "  3*");
    }
}
