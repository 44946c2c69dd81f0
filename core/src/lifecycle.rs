use chrono::NaiveDate;

use crate::history::upsert_by_date;
use crate::models::{AppState, CustomHabit, DayDetails, DayLog, DayStatus, HabitState, Macros};
use crate::scoring::{aggregate_macros, score};

pub const PERFECT_THRESHOLD: u8 = 90;
pub const GOOD_THRESHOLD: u8 = 60;

#[must_use]
pub fn status_for_score(score: u8) -> DayStatus {
    if score >= PERFECT_THRESHOLD {
        DayStatus::Perfect
    } else if score >= GOOD_THRESHOLD {
        DayStatus::Good
    } else {
        DayStatus::Bad
    }
}

/// Fresh habits for the next day: everything zeroed, custom habit
/// definitions kept with completion cleared.
#[must_use]
pub fn next_day_habits(habits: &HabitState) -> HabitState {
    HabitState {
        custom_habits: habits
            .custom_habits
            .iter()
            .map(|h| CustomHabit {
                completed: false,
                ..h.clone()
            })
            .collect(),
        ..HabitState::default()
    }
}

#[must_use]
pub fn build_day_log(
    date: NaiveDate,
    macros: Macros,
    habits: &HabitState,
    goals: &Macros,
    weight: f64,
) -> DayLog {
    let score = score(&macros, habits, goals);
    DayLog {
        date,
        score,
        weight,
        status: status_for_score(score),
        details: Some(DayDetails {
            macros,
            habits: habits.clone(),
        }),
    }
}

/// Result of closing a day: the archived record and the state that replaces
/// the old one wholesale.
#[derive(Debug, Clone)]
pub struct FinishedDay {
    pub log: DayLog,
    pub state: AppState,
}

/// Archive `state` under `date` and reset the daily counters.
///
/// Returns `None` when no profile exists. Finishing the same date again
/// replaces that date's record.
#[must_use]
pub fn finish_day(state: &AppState, date: NaiveDate, goals: &Macros) -> Option<FinishedDay> {
    let profile = state.profile.as_ref()?;
    let macros = aggregate_macros(&state.entries);
    let log = build_day_log(date, macros, &state.habits, goals, profile.current_weight);

    let next = AppState {
        profile: Some(profile.clone()),
        entries: Vec::new(),
        habits: next_day_habits(&state.habits),
        history: upsert_by_date(&state.history, log.clone()),
    };

    Some(FinishedDay { log, state: next })
}
