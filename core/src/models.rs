use std::ops::{Add, AddAssign};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- PSMF protocol constants ---

/// Strict PSMF macro goals for a single day.
pub const DAILY_GOALS: Macros = Macros {
    calories: 1650.0,
    protein: 200.0,
    fat: 55.0,
    carbs: 40.0,
};

pub const WATER_GOAL_ML: u32 = 3000;
pub const STEPS_GOAL: u32 = 10_000;
pub const OMEGA3_TARGET: u8 = 4;

/// One glass, as added by the quick-add water action.
pub const WATER_STEP_ML: u32 = 250;
/// Quick-add never pushes water intake past this value.
pub const WATER_QUICK_ADD_CAP_ML: u32 = 5000;

pub const MIN_AGE: u32 = 16;
pub const MAX_AGE: u32 = 99;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
}

impl Macros {
    pub const ZERO: Macros = Macros {
        calories: 0.0,
        protein: 0.0,
        fat: 0.0,
        carbs: 0.0,
    };
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            fat: self.fat + rhs.fat,
            carbs: self.carbs + rhs.carbs,
        }
    }
}

impl AddAssign for Macros {
    fn add_assign(&mut self, rhs: Macros) {
        *self = *self + rhs;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub macros: Macros,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub micronutrients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomHabit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub completed: bool,
}

impl CustomHabit {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            completed: false,
        }
    }
}

/// Today's habit counters. Sleep boundaries are `HH:MM` strings, `None` when unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HabitState {
    pub omega3: u8,
    pub multivitamin: bool,
    pub water_ml: u32,
    pub steps: u32,
    pub gym_workout: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_end: Option<String>,
    pub custom_habits: Vec<CustomHabit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            _ => bail!("Invalid gender '{s}'. Must be one of: male, female"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub start_date: NaiveDate,
    pub target_date: NaiveDate,
    pub height_cm: f64,
    pub start_weight: f64,
    pub current_weight: f64,
    pub target_weight: f64,
    pub age: u32,
    pub gender: Gender,
}

/// Onboarding input. Current weight starts out equal to the start weight.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub start_date: NaiveDate,
    pub target_date: NaiveDate,
    pub height_cm: f64,
    pub start_weight: f64,
    pub target_weight: f64,
    pub age: u32,
    pub gender: Gender,
}

impl From<NewProfile> for UserProfile {
    fn from(p: NewProfile) -> Self {
        Self {
            start_date: p.start_date,
            target_date: p.target_date,
            height_cm: p.height_cm,
            start_weight: p.start_weight,
            current_weight: p.start_weight,
            target_weight: p.target_weight,
            age: p.age,
            gender: p.gender,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub height_cm: Option<f64>,
    pub start_weight: Option<f64>,
    pub current_weight: Option<f64>,
    pub target_weight: Option<f64>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn apply_to(&self, profile: &UserProfile) -> UserProfile {
        UserProfile {
            start_date: self.start_date.unwrap_or(profile.start_date),
            target_date: self.target_date.unwrap_or(profile.target_date),
            height_cm: self.height_cm.unwrap_or(profile.height_cm),
            start_weight: self.start_weight.unwrap_or(profile.start_weight),
            current_weight: self.current_weight.unwrap_or(profile.current_weight),
            target_weight: self.target_weight.unwrap_or(profile.target_weight),
            age: self.age.unwrap_or(profile.age),
            gender: self.gender.unwrap_or(profile.gender),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none()
            && self.target_date.is_none()
            && self.height_cm.is_none()
            && self.start_weight.is_none()
            && self.current_weight.is_none()
            && self.target_weight.is_none()
            && self.age.is_none()
            && self.gender.is_none()
    }
}

/// Partial change to today's habits, applied as one replacement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HabitUpdate {
    pub omega3: Option<u8>,
    pub multivitamin: Option<bool>,
    pub water_ml: Option<u32>,
    pub steps: Option<u32>,
    pub gym_workout: Option<bool>,
    pub sleep_start: Option<String>,
    pub sleep_end: Option<String>,
    #[serde(default)]
    pub clear_sleep: bool,
}

impl HabitUpdate {
    /// The habits after this update. Fails without touching anything if any field is invalid.
    pub fn apply_to(&self, habits: &HabitState) -> Result<HabitState> {
        let omega3 = match self.omega3 {
            Some(count) => validate_omega3(count)?,
            None => habits.omega3,
        };
        let (sleep_start, sleep_end) =
            match (self.sleep_start.as_deref(), self.sleep_end.as_deref()) {
                (Some(_), Some(_)) if self.clear_sleep => {
                    bail!("clear_sleep cannot be combined with sleep times")
                }
                (Some(start), Some(end)) => (
                    Some(parse_time_of_day(start)?.format("%H:%M").to_string()),
                    Some(parse_time_of_day(end)?.format("%H:%M").to_string()),
                ),
                (None, None) if self.clear_sleep => (None, None),
                (None, None) => (habits.sleep_start.clone(), habits.sleep_end.clone()),
                _ => bail!("sleep_start and sleep_end must be given together"),
            };
        Ok(HabitState {
            omega3,
            multivitamin: self.multivitamin.unwrap_or(habits.multivitamin),
            water_ml: self.water_ml.unwrap_or(habits.water_ml),
            steps: self.steps.unwrap_or(habits.steps),
            gym_workout: self.gym_workout.unwrap_or(habits.gym_workout),
            sleep_start,
            sleep_end,
            custom_habits: habits.custom_habits.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Perfect,
    Good,
    Bad,
    /// Placeholder for days that were never processed. Finishing a day never produces it.
    Pending,
}

impl DayStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DayStatus::Perfect => "perfect",
            DayStatus::Good => "good",
            DayStatus::Bad => "bad",
            DayStatus::Pending => "pending",
        }
    }
}

impl std::fmt::Display for DayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayDetails {
    pub macros: Macros,
    pub habits: HabitState,
}

/// Archived record of a finished day. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayLog {
    pub date: NaiveDate,
    pub score: u8,
    pub weight: f64,
    pub status: DayStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<DayDetails>,
}

/// Everything that is persisted, as a single value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub profile: Option<UserProfile>,
    pub entries: Vec<FoodEntry>,
    pub habits: HabitState,
    pub history: Vec<DayLog>,
}

// --- Validation ---

/// Parse a 24h `HH:MM` time-of-day string.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .with_context(|| format!("Invalid time '{s}'. Use 24h HH:MM (e.g. 23:00)"))
}

pub fn validate_profile(profile: &UserProfile) -> Result<()> {
    if profile.height_cm <= 0.0 {
        bail!("height_cm must be greater than 0");
    }
    if profile.start_weight <= 0.0 {
        bail!("start_weight must be greater than 0");
    }
    if profile.current_weight <= 0.0 {
        bail!("current_weight must be greater than 0");
    }
    if profile.target_weight <= 0.0 {
        bail!("target_weight must be greater than 0");
    }
    if !(MIN_AGE..=MAX_AGE).contains(&profile.age) {
        bail!("age must be between {MIN_AGE} and {MAX_AGE}");
    }
    if profile.start_date > profile.target_date {
        bail!(
            "start_date {} must not be after target_date {}",
            profile.start_date,
            profile.target_date
        );
    }
    Ok(())
}

/// Trim a custom habit name, rejecting blank ones.
pub fn validate_custom_habit_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("Custom habit name must not be empty");
    }
    Ok(trimmed.to_string())
}

pub fn validate_omega3(count: u8) -> Result<u8> {
    if count > OMEGA3_TARGET {
        bail!("omega3 count must be between 0 and {OMEGA3_TARGET}");
    }
    Ok(count)
}
