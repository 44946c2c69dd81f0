use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::process;

use psmf_core::dashboard::{AdviceLevel, Dashboard};
use psmf_core::models::{DayLog, Macros};
use psmf_core::scoring::ComplianceReport;
use psmf_core::service::PsmfService;

use super::habit::print_habits;
use super::helpers::{format_macros, json_error, no_neg_zero};

#[derive(Serialize)]
struct StatusReport<'a> {
    macros: Macros,
    goals: &'a Macros,
    compliance: ComplianceReport,
    dashboard: Dashboard,
}

fn require_onboarded(svc: &PsmfService, json: bool) {
    if svc.profile().is_none() {
        let msg = "No profile yet. Run `psmf onboard` first.";
        if json {
            println!("{}", json_error(msg));
        } else {
            eprintln!("{msg}");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_status(svc: &PsmfService, json: bool) -> Result<()> {
    require_onboarded(svc, json);
    let today = Local::now().date_naive();
    let report = StatusReport {
        macros: svc.current_macros(),
        goals: svc.goals(),
        compliance: svc.compliance(),
        dashboard: svc.dashboard(today)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let d = &report.dashboard;
    println!(
        "=== {} | day {} of {} ({:.0}%) ===\n",
        d.today,
        d.progress.days_passed + 1,
        d.progress.total_days + 1,
        d.progress.progress_pct
    );
    println!("  EATEN:     {}", format_macros(&report.macros));
    println!("  GOAL:      {}", format_macros(report.goals));
    let left = Macros {
        calories: report.goals.calories - report.macros.calories,
        protein: report.goals.protein - report.macros.protein,
        fat: report.goals.fat - report.macros.fat,
        carbs: report.goals.carbs - report.macros.carbs,
    };
    println!("  REMAINING: {}\n", format_macros(&left));

    print_habits(svc);

    let label = match d.advice.level {
        AdviceLevel::Ok => "OK",
        AdviceLevel::Warning => "WARNING",
        AdviceLevel::Danger => "DANGER",
    };
    println!("\n  {label}: {}", d.advice.message);
    println!(
        "  Weight: {:.1} kg (lost {:.1}, {:.1} to go)",
        d.weight.current,
        no_neg_zero(d.weight.lost),
        no_neg_zero(d.weight.remaining)
    );
    println!(
        "\n  SCORE: {}% ({}/{} criteria)",
        report.compliance.score,
        report.compliance.met_count,
        report.compliance.criteria.len()
    );
    Ok(())
}

pub(crate) fn print_day_log(log: &DayLog) {
    println!(
        "{}: {}% ({}), weight {:.1} kg",
        log.date, log.score, log.status, log.weight
    );
    if let Some(ref details) = log.details {
        println!("  Macros: {}", format_macros(&details.macros));
        let h = &details.habits;
        println!(
            "  Water {} ml, steps {}, omega-3 {}, multivitamin {}, gym {}",
            h.water_ml,
            h.steps,
            h.omega3,
            if h.multivitamin { "yes" } else { "no" },
            if h.gym_workout { "yes" } else { "no" }
        );
        if let (Some(start), Some(end)) = (&h.sleep_start, &h.sleep_end) {
            println!("  Sleep {start} - {end}");
        }
    }
}

pub(crate) fn cmd_finish(svc: &mut PsmfService, date: NaiveDate, json: bool) -> Result<()> {
    let Some(log) = svc.finish_day(date)? else {
        let msg = "No profile yet. Run `psmf onboard` first.";
        if json {
            println!("{}", json_error(msg));
        } else {
            eprintln!("{msg}");
        }
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
    } else {
        print_day_log(&log);
        println!("Day archived. Counters reset for the next day.");
    }
    Ok(())
}
