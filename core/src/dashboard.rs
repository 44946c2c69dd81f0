use chrono::NaiveDate;
use serde::Serialize;

use crate::history::sorted_by_date;
use crate::models::{DayLog, Macros, UserProfile};

/// Fat may exceed its goal by this many grams before advice turns critical.
const FAT_DANGER_MARGIN_G: f64 = 5.0;
const PROTEIN_GAP_WARNING_G: f64 = 50.0;
const LOW_CALORIES_LEFT: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProtocolProgress {
    pub total_days: i64,
    pub days_passed: i64,
    pub days_left: i64,
    pub progress_pct: f64,
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn protocol_progress(start: NaiveDate, target: NaiveDate, today: NaiveDate) -> ProtocolProgress {
    let total_days = (target - start).num_days();
    let days_passed = (today - start).num_days();
    let days_left = (target - today).num_days();
    let progress_pct = if total_days > 0 {
        (days_passed as f64 / total_days as f64 * 100.0).clamp(0.0, 100.0)
    } else if days_passed >= 0 {
        100.0
    } else {
        0.0
    };
    ProtocolProgress {
        total_days,
        days_passed,
        days_left,
        progress_pct,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightStats {
    pub start: f64,
    pub current: f64,
    pub target: f64,
    pub lost: f64,
    pub remaining: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bmi: Option<f64>,
}

#[must_use]
pub fn bmi(weight_kg: f64, height_cm: f64) -> Option<f64> {
    if height_cm <= 0.0 {
        return None;
    }
    let m = height_cm / 100.0;
    Some(weight_kg / (m * m))
}

#[must_use]
pub fn weight_stats(profile: &UserProfile) -> WeightStats {
    WeightStats {
        start: profile.start_weight,
        current: profile.current_weight,
        target: profile.target_weight,
        lost: profile.start_weight - profile.current_weight,
        remaining: profile.current_weight - profile.target_weight,
        bmi: bmi(profile.current_weight, profile.height_cm),
    }
}

/// Archived weights in date order followed by the current weight. Empty until
/// there are at least two archived days to draw a line through.
#[must_use]
pub fn weight_trend(history: &[DayLog], current_weight: f64) -> Vec<f64> {
    if history.len() < 2 {
        return Vec::new();
    }
    let mut points: Vec<f64> = sorted_by_date(history).iter().map(|d| d.weight).collect();
    points.push(current_weight);
    points
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceLevel {
    Ok,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advice {
    pub level: AdviceLevel,
    pub message: String,
}

/// One-line guidance for the rest of today, first matching rule wins.
#[must_use]
pub fn advise(macros: &Macros, goals: &Macros) -> Advice {
    let calories_left = goals.calories - macros.calories;
    let protein_left = goals.protein - macros.protein;

    let (level, message) = if macros.fat > goals.fat + FAT_DANGER_MARGIN_G {
        (
            AdviceLevel::Danger,
            "Fat limit exceeded. Stop eating fat for the rest of the day.".to_string(),
        )
    } else if calories_left < 0.0 {
        (
            AdviceLevel::Danger,
            "Calorie surplus. Increase activity.".to_string(),
        )
    } else if protein_left > PROTEIN_GAP_WARNING_G && calories_left < LOW_CALORIES_LEFT {
        (
            AdviceLevel::Warning,
            "Protein gap is too large for the calories left. Eat egg whites or isolate."
                .to_string(),
        )
    } else if protein_left > 0.0 {
        (
            AdviceLevel::Ok,
            format!(
                "{:.0} kcal left. Focus on lean protein sources.",
                calories_left.round()
            ),
        )
    } else {
        (
            AdviceLevel::Ok,
            "Protocol on track. Macros are balanced.".to_string(),
        )
    };

    Advice { level, message }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub today: NaiveDate,
    pub score: u8,
    pub progress: ProtocolProgress,
    pub weight: WeightStats,
    pub weight_trend: Vec<f64>,
    pub advice: Advice,
}

#[must_use]
pub fn build_dashboard(
    profile: &UserProfile,
    history: &[DayLog],
    macros: &Macros,
    goals: &Macros,
    score: u8,
    today: NaiveDate,
) -> Dashboard {
    Dashboard {
        today,
        score,
        progress: protocol_progress(profile.start_date, profile.target_date, today),
        weight: weight_stats(profile),
        weight_trend: weight_trend(history, profile.current_weight),
        advice: advise(macros, goals),
    }
}
