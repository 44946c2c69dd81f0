use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, Utc};

use crate::analysis::{AnalysisError, AnalysisRequest, AnalysisResult, FoodAnalyzer};
use crate::calendar::{CalendarDay, build_calendar};
use crate::dashboard::{Advice, Dashboard, advise, build_dashboard};
use crate::db::Database;
use crate::history::{find_by_date, sorted_by_date};
use crate::lifecycle;
use crate::models::{
    AppState, CustomHabit, DAILY_GOALS, DayLog, FoodEntry, HabitState, HabitUpdate, Macros,
    NewProfile,
    ProfileUpdate, UserProfile, WATER_QUICK_ADD_CAP_ML, WATER_STEP_ML, parse_time_of_day,
    validate_custom_habit_name, validate_omega3, validate_profile,
};
use crate::scoring::{ComplianceReport, aggregate_macros, evaluate, sleep_duration_hours};

/// Owns the application state and its store. Every mutating call replaces
/// the relevant part of the state and then saves.
pub struct PsmfService {
    db: Database,
    state: AppState,
    goals: Macros,
}

impl PsmfService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Self::from_database(db)
    }

    pub fn new_in_memory() -> Result<Self> {
        Self::from_database(Database::open_in_memory()?)
    }

    pub fn from_database(db: Database) -> Result<Self> {
        let state = db.load_state()?.unwrap_or_default();
        Ok(Self {
            db,
            state,
            goals: DAILY_GOALS,
        })
    }

    fn save(&self) -> Result<()> {
        // Nothing is persisted until onboarding has happened.
        if self.state.profile.is_none() {
            return Ok(());
        }
        self.db.save_state(&self.state)
    }

    fn replace_habits(&mut self, habits: HabitState) -> Result<&HabitState> {
        self.state.habits = habits;
        self.save()?;
        Ok(&self.state.habits)
    }

    // --- State queries ---

    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    #[must_use]
    pub fn goals(&self) -> &Macros {
        &self.goals
    }

    #[must_use]
    pub fn profile(&self) -> Option<&UserProfile> {
        self.state.profile.as_ref()
    }

    fn require_profile(&self) -> Result<&UserProfile> {
        self.profile()
            .context("No profile yet. Run onboarding first")
    }

    #[must_use]
    pub fn entries(&self) -> &[FoodEntry] {
        &self.state.entries
    }

    #[must_use]
    pub fn habits(&self) -> &HabitState {
        &self.state.habits
    }

    #[must_use]
    pub fn current_macros(&self) -> Macros {
        aggregate_macros(&self.state.entries)
    }

    #[must_use]
    pub fn compliance(&self) -> ComplianceReport {
        evaluate(&self.current_macros(), &self.state.habits, &self.goals)
    }

    #[must_use]
    pub fn score(&self) -> u8 {
        self.compliance().score
    }

    #[must_use]
    pub fn sleep_hours(&self) -> Option<f64> {
        sleep_duration_hours(
            self.state.habits.sleep_start.as_deref(),
            self.state.habits.sleep_end.as_deref(),
        )
    }

    #[must_use]
    pub fn advice(&self) -> Advice {
        advise(&self.current_macros(), &self.goals)
    }

    // --- Profile ---

    /// Store a new profile and start from a clean slate.
    pub fn onboard(&mut self, new_profile: NewProfile) -> Result<&UserProfile> {
        let profile: UserProfile = new_profile.into();
        validate_profile(&profile)?;
        self.state = AppState {
            profile: Some(profile),
            ..AppState::default()
        };
        self.save()?;
        tracing::info!("onboarding complete");
        self.require_profile()
    }

    pub fn update_profile(&mut self, update: &ProfileUpdate) -> Result<&UserProfile> {
        let updated = update.apply_to(self.require_profile()?);
        validate_profile(&updated)?;
        self.state.profile = Some(updated);
        self.save()?;
        self.require_profile()
    }

    /// Forget everything, including history. The next load starts onboarding.
    pub fn reset_all(&mut self) -> Result<()> {
        self.db.clear_state()?;
        self.state = AppState::default();
        tracing::info!("all data reset");
        Ok(())
    }

    // --- Food entries ---

    pub fn add_entry(&mut self, entry: FoodEntry) -> Result<&FoodEntry> {
        self.require_profile()?;
        let mut entries = self.state.entries.clone();
        entries.push(entry);
        self.state.entries = entries;
        self.save()?;
        self.state
            .entries
            .last()
            .context("entry list unexpectedly empty")
    }

    pub fn add_analyzed_entry(&mut self, result: AnalysisResult) -> Result<&FoodEntry> {
        self.add_entry(result.into_entry(Utc::now()))
    }

    /// Analyse and log in one call. On any analysis failure nothing is logged.
    pub async fn log_food(
        &mut self,
        analyzer: &dyn FoodAnalyzer,
        request: &AnalysisRequest,
    ) -> Result<FoodEntry> {
        self.require_profile()?;
        request.validate()?;
        let result = analyzer.analyze(request).await.map_err(|e: AnalysisError| {
            tracing::warn!(error = %e, "food analysis failed");
            e
        })?;
        Ok(self.add_analyzed_entry(result)?.clone())
    }

    pub fn remove_entry(&mut self, id: &str) -> Result<bool> {
        let before = self.state.entries.len();
        let entries: Vec<FoodEntry> = self
            .state
            .entries
            .iter()
            .filter(|e| e.id != id)
            .cloned()
            .collect();
        if entries.len() == before {
            return Ok(false);
        }
        self.state.entries = entries;
        self.save()?;
        Ok(true)
    }

    // --- Habits ---

    /// Add one glass of water, never going past the quick-add cap.
    pub fn add_water(&mut self) -> Result<&HabitState> {
        let water_ml = self
            .state
            .habits
            .water_ml
            .saturating_add(WATER_STEP_ML)
            .min(WATER_QUICK_ADD_CAP_ML);
        let habits = HabitState {
            water_ml: water_ml.max(self.state.habits.water_ml),
            ..self.state.habits.clone()
        };
        self.replace_habits(habits)
    }

    pub fn set_water(&mut self, water_ml: u32) -> Result<&HabitState> {
        let habits = HabitState {
            water_ml,
            ..self.state.habits.clone()
        };
        self.replace_habits(habits)
    }

    pub fn set_omega3(&mut self, count: u8) -> Result<&HabitState> {
        let habits = HabitState {
            omega3: validate_omega3(count)?,
            ..self.state.habits.clone()
        };
        self.replace_habits(habits)
    }

    /// Tap omega-3 capsule `slot` (0-based): fills up to and including it, or
    /// un-fills it when it is the current top.
    pub fn toggle_omega3(&mut self, slot: u8) -> Result<&HabitState> {
        let count = validate_omega3(slot.saturating_add(1))?;
        let next = if count == self.state.habits.omega3 {
            slot
        } else {
            count
        };
        self.set_omega3(next)
    }

    pub fn set_multivitamin(&mut self, taken: bool) -> Result<&HabitState> {
        let habits = HabitState {
            multivitamin: taken,
            ..self.state.habits.clone()
        };
        self.replace_habits(habits)
    }

    pub fn set_steps(&mut self, steps: u32) -> Result<&HabitState> {
        let habits = HabitState {
            steps,
            ..self.state.habits.clone()
        };
        self.replace_habits(habits)
    }

    pub fn set_gym(&mut self, done: bool) -> Result<&HabitState> {
        let habits = HabitState {
            gym_workout: done,
            ..self.state.habits.clone()
        };
        self.replace_habits(habits)
    }

    pub fn set_sleep(&mut self, start: &str, end: &str) -> Result<&HabitState> {
        let start = parse_time_of_day(start)?;
        let end = parse_time_of_day(end)?;
        let habits = HabitState {
            sleep_start: Some(start.format("%H:%M").to_string()),
            sleep_end: Some(end.format("%H:%M").to_string()),
            ..self.state.habits.clone()
        };
        self.replace_habits(habits)
    }

    pub fn clear_sleep(&mut self) -> Result<&HabitState> {
        let habits = HabitState {
            sleep_start: None,
            sleep_end: None,
            ..self.state.habits.clone()
        };
        self.replace_habits(habits)
    }

    /// Apply several habit changes with a single save. Nothing changes if any field is invalid.
    pub fn update_habits(&mut self, update: &HabitUpdate) -> Result<&HabitState> {
        let habits = update.apply_to(&self.state.habits)?;
        self.replace_habits(habits)
    }

    pub fn add_custom_habit(&mut self, name: &str) -> Result<CustomHabit> {
        let habit = CustomHabit::new(validate_custom_habit_name(name)?);
        let mut habits = self.state.habits.clone();
        habits.custom_habits.push(habit.clone());
        self.replace_habits(habits)?;
        Ok(habit)
    }

    pub fn toggle_custom_habit(&mut self, id: &str) -> Result<bool> {
        if !self.state.habits.custom_habits.iter().any(|h| h.id == id) {
            return Ok(false);
        }
        let mut habits = self.state.habits.clone();
        habits.custom_habits = habits
            .custom_habits
            .into_iter()
            .map(|h| {
                if h.id == id {
                    CustomHabit {
                        completed: !h.completed,
                        ..h
                    }
                } else {
                    h
                }
            })
            .collect();
        self.replace_habits(habits)?;
        Ok(true)
    }

    pub fn remove_custom_habit(&mut self, id: &str) -> Result<bool> {
        let mut habits = self.state.habits.clone();
        let before = habits.custom_habits.len();
        habits.custom_habits.retain(|h| h.id != id);
        if habits.custom_habits.len() == before {
            return Ok(false);
        }
        self.replace_habits(habits)?;
        Ok(true)
    }

    // --- Day lifecycle ---

    /// Archive today under `date` and reset the daily counters. `None` when
    /// there is no profile.
    pub fn finish_day(&mut self, date: NaiveDate) -> Result<Option<DayLog>> {
        let Some(done) = lifecycle::finish_day(&self.state, date, &self.goals) else {
            tracing::debug!("finish day ignored: no profile");
            return Ok(None);
        };
        self.state = done.state;
        self.save()?;
        tracing::info!(
            date = %done.log.date,
            score = done.log.score,
            status = %done.log.status,
            "day finished"
        );
        Ok(Some(done.log))
    }

    pub fn finish_today(&mut self) -> Result<Option<DayLog>> {
        self.finish_day(Local::now().date_naive())
    }

    // --- History / calendar ---

    #[must_use]
    pub fn history(&self) -> Vec<DayLog> {
        sorted_by_date(&self.state.history)
    }

    #[must_use]
    pub fn day_log(&self, date: NaiveDate) -> Option<&DayLog> {
        find_by_date(&self.state.history, date)
    }

    pub fn calendar(&self, today: NaiveDate) -> Result<Vec<CalendarDay>> {
        let profile = self.require_profile()?;
        if profile.start_date > profile.target_date {
            bail!("Profile start date is after its target date");
        }
        Ok(build_calendar(
            profile.start_date,
            profile.target_date,
            today,
            &self.state.history,
        ))
    }

    pub fn dashboard(&self, today: NaiveDate) -> Result<Dashboard> {
        let profile = self.require_profile()?;
        Ok(build_dashboard(
            profile,
            &self.state.history,
            &self.current_macros(),
            &self.goals,
            self.score(),
            today,
        ))
    }
}
