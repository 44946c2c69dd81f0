use anyhow::Result;
use std::process;

use psmf_core::models::{OMEGA3_TARGET, STEPS_GOAL, WATER_GOAL_ML};
use psmf_core::scoring::Criterion;
use psmf_core::service::PsmfService;

use super::helpers::{json_error, resolve_id, short_id};

pub(crate) enum HabitAction {
    Water(Option<u32>),
    Omega3(u8),
    Multivitamin(bool),
    Steps(u32),
    Gym(bool),
    Sleep { start: String, end: String },
    ClearSleep,
}

fn check(done: bool) -> &'static str {
    if done { "x" } else { " " }
}

pub(crate) fn print_habits(svc: &PsmfService) {
    let habits = svc.habits();
    let report = svc.compliance();
    let met = |c| check(report.is_met(c));

    println!(
        "  [{}] Water        {} / {WATER_GOAL_ML} ml",
        met(Criterion::Water),
        habits.water_ml
    );
    println!(
        "  [{}] Steps        {} / {STEPS_GOAL}{}",
        met(Criterion::Activity),
        habits.steps,
        if habits.gym_workout { " (gym done)" } else { "" }
    );
    println!(
        "  [{}] Supplements  omega-3 {}/{OMEGA3_TARGET}, multivitamin {}",
        met(Criterion::Supplements),
        habits.omega3,
        if habits.multivitamin { "taken" } else { "not taken" }
    );
    match (&habits.sleep_start, &habits.sleep_end, svc.sleep_hours()) {
        (Some(start), Some(end), Some(hours)) => println!(
            "  [{}] Sleep        {start} - {end} ({hours:.1} h)",
            met(Criterion::Sleep)
        ),
        _ => println!("  [ ] Sleep        not set"),
    }
    for h in &habits.custom_habits {
        println!("  [{}] {} ({})", check(h.completed), h.name, short_id(&h.id));
    }
}

pub(crate) fn cmd_habit(svc: &mut PsmfService, action: HabitAction, json: bool) -> Result<()> {
    match action {
        HabitAction::Water(None) => svc.add_water()?,
        HabitAction::Water(Some(ml)) => svc.set_water(ml)?,
        HabitAction::Omega3(count) => svc.set_omega3(count)?,
        HabitAction::Multivitamin(taken) => svc.set_multivitamin(taken)?,
        HabitAction::Steps(steps) => svc.set_steps(steps)?,
        HabitAction::Gym(done) => svc.set_gym(done)?,
        HabitAction::Sleep { start, end } => svc.set_sleep(&start, &end)?,
        HabitAction::ClearSleep => svc.clear_sleep()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(svc.habits())?);
    } else {
        print_habits(svc);
        println!("Score: {}%", svc.score());
    }
    Ok(())
}

pub(crate) fn cmd_habit_list(svc: &PsmfService, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(svc.habits())?);
    } else {
        print_habits(svc);
    }
    Ok(())
}

pub(crate) fn cmd_custom_add(svc: &mut PsmfService, name: &str, json: bool) -> Result<()> {
    let habit = svc.add_custom_habit(name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&habit)?);
    } else {
        println!("Added habit '{}' ({})", habit.name, short_id(&habit.id));
    }
    Ok(())
}

fn resolve_custom_id(svc: &PsmfService, query: &str, json: bool) -> String {
    let ids = svc.habits().custom_habits.iter().map(|h| h.id.as_str());
    match resolve_id(ids, query) {
        Ok(id) => id,
        Err(e) => {
            if json {
                println!("{}", json_error(&format!("{e}")));
            } else {
                eprintln!("{e}");
            }
            process::exit(2);
        }
    }
}

pub(crate) fn cmd_custom_toggle(svc: &mut PsmfService, id: &str, json: bool) -> Result<()> {
    let id = resolve_custom_id(svc, id, json);
    svc.toggle_custom_habit(&id)?;
    let habit = svc.habits().custom_habits.iter().find(|h| h.id == id);

    if json {
        println!("{}", serde_json::to_string_pretty(&habit)?);
    } else if let Some(h) = habit {
        let state = if h.completed { "done" } else { "not done" };
        println!("'{}' marked {state}", h.name);
    }
    Ok(())
}

pub(crate) fn cmd_custom_remove(svc: &mut PsmfService, id: &str, json: bool) -> Result<()> {
    let id = resolve_custom_id(svc, id, json);
    svc.remove_custom_habit(&id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Removed habit {id}");
    }
    Ok(())
}
