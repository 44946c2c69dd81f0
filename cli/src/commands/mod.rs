mod habit;
mod helpers;
mod history;
mod log;
mod profile;
mod status;

pub(crate) use habit::{
    HabitAction, cmd_custom_add, cmd_custom_remove, cmd_custom_toggle, cmd_habit, cmd_habit_list,
};
pub(crate) use helpers::parse_date;
pub(crate) use history::{cmd_calendar, cmd_day, cmd_history};
pub(crate) use log::{cmd_entries, cmd_log, cmd_remove};
pub(crate) use profile::{OnboardArgs, cmd_onboard, cmd_profile_set, cmd_profile_show, cmd_reset};
pub(crate) use status::{cmd_finish, cmd_status};
