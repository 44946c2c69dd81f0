use serde::Serialize;

use crate::models::{
    FoodEntry, HabitState, Macros, OMEGA3_TARGET, STEPS_GOAL, WATER_GOAL_ML, parse_time_of_day,
};

const MIN_SLEEP_HOURS: f64 = 7.0;
const MAX_SLEEP_HOURS: f64 = 9.0;

/// Component-wise sum of all entries' macros.
#[must_use]
pub fn aggregate_macros(entries: &[FoodEntry]) -> Macros {
    entries
        .iter()
        .fold(Macros::ZERO, |acc, entry| acc + entry.macros)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Protein,
    Fat,
    Calories,
    Carbs,
    Water,
    Activity,
    Supplements,
    Sleep,
}

impl Criterion {
    pub const ALL: [Criterion; 8] = [
        Criterion::Protein,
        Criterion::Fat,
        Criterion::Calories,
        Criterion::Carbs,
        Criterion::Water,
        Criterion::Activity,
        Criterion::Supplements,
        Criterion::Sleep,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Criterion::Protein => "Protein >= 90% of goal",
            Criterion::Fat => "Fat <= 110% of goal",
            Criterion::Calories => "Calories <= 105% of goal",
            Criterion::Carbs => "Carbs <= 120% of goal",
            Criterion::Water => "Water >= 3000 ml",
            Criterion::Activity => "Steps >= 10000 or gym workout",
            Criterion::Supplements => "Multivitamin + 4 omega-3",
            Criterion::Sleep => "Sleep 7-9 hours",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CriterionResult {
    pub criterion: Criterion,
    pub met: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    pub score: u8,
    pub met_count: u8,
    pub criteria: Vec<CriterionResult>,
}

impl ComplianceReport {
    #[must_use]
    pub fn is_met(&self, criterion: Criterion) -> bool {
        self.criteria
            .iter()
            .any(|c| c.criterion == criterion && c.met)
    }
}

/// Hours slept between two `HH:MM` boundaries. An end earlier than the start is
/// taken to be on the next day. `None` if either boundary is unset or unparseable.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sleep_duration_hours(start: Option<&str>, end: Option<&str>) -> Option<f64> {
    let start = parse_time_of_day(start?).ok()?;
    let end = parse_time_of_day(end?).ok()?;
    let mut minutes = end.signed_duration_since(start).num_minutes();
    if minutes < 0 {
        minutes += 24 * 60;
    }
    Some(minutes as f64 / 60.0)
}

fn has_intake(macros: &Macros) -> bool {
    macros.calories > 0.0 || macros.protein > 0.0 || macros.fat > 0.0 || macros.carbs > 0.0
}

// Fat, calories and carbs only count once some macro is non-zero, so an
// untouched day scores 0.
fn criterion_met(criterion: Criterion, macros: &Macros, habits: &HabitState, goals: &Macros) -> bool {
    match criterion {
        Criterion::Protein => macros.protein >= goals.protein * 0.9,
        Criterion::Fat => has_intake(macros) && macros.fat <= goals.fat * 1.1,
        Criterion::Calories => has_intake(macros) && macros.calories <= goals.calories * 1.05,
        Criterion::Carbs => has_intake(macros) && macros.carbs <= goals.carbs * 1.2,
        Criterion::Water => habits.water_ml >= WATER_GOAL_ML,
        Criterion::Activity => habits.steps >= STEPS_GOAL || habits.gym_workout,
        Criterion::Supplements => habits.multivitamin && habits.omega3 >= OMEGA3_TARGET,
        Criterion::Sleep => sleep_duration_hours(
            habits.sleep_start.as_deref(),
            habits.sleep_end.as_deref(),
        )
        .is_some_and(|h| (MIN_SLEEP_HOURS..=MAX_SLEEP_HOURS).contains(&h)),
    }
}

/// Evaluate the eight fixed criteria. Custom habits never count.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
pub fn evaluate(macros: &Macros, habits: &HabitState, goals: &Macros) -> ComplianceReport {
    let criteria: Vec<CriterionResult> = Criterion::ALL
        .iter()
        .map(|&criterion| CriterionResult {
            criterion,
            met: criterion_met(criterion, macros, habits, goals),
        })
        .collect();
    let met_count = criteria.iter().filter(|c| c.met).count() as u8;
    let score = (f64::from(met_count) / Criterion::ALL.len() as f64 * 100.0).round() as u8;
    ComplianceReport {
        score,
        met_count,
        criteria,
    }
}

#[must_use]
pub fn score(macros: &Macros, habits: &HabitState, goals: &Macros) -> u8 {
    evaluate(macros, habits, goals).score
}
