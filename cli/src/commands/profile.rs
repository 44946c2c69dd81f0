use anyhow::{Result, bail};
use std::process;

use psmf_core::dashboard::weight_stats;
use psmf_core::models::{Gender, NewProfile, ProfileUpdate};
use psmf_core::service::PsmfService;

use super::helpers::{confirm, json_error, parse_date_str};

pub(crate) struct OnboardArgs {
    pub start_date: Option<String>,
    pub target_date: String,
    pub height: f64,
    pub start_weight: f64,
    pub target_weight: f64,
    pub age: u32,
    pub gender: String,
}

pub(crate) fn cmd_onboard(svc: &mut PsmfService, args: OnboardArgs, json: bool) -> Result<()> {
    let start_date = match args.start_date {
        Some(s) => parse_date_str(&s)?,
        None => chrono::Local::now().date_naive(),
    };
    let new_profile = NewProfile {
        start_date,
        target_date: parse_date_str(&args.target_date)?,
        height_cm: args.height,
        start_weight: args.start_weight,
        target_weight: args.target_weight,
        age: args.age,
        gender: args.gender.parse::<Gender>()?,
    };

    let profile = svc.onboard(new_profile)?;

    if json {
        println!("{}", serde_json::to_string_pretty(profile)?);
    } else {
        let days = (profile.target_date - profile.start_date).num_days();
        println!(
            "Protocol started: {} -> {} ({days} days), {:.1} kg -> {:.1} kg",
            profile.start_date, profile.target_date, profile.start_weight, profile.target_weight
        );
    }
    Ok(())
}

pub(crate) fn cmd_profile_show(svc: &PsmfService, json: bool) -> Result<()> {
    let Some(profile) = svc.profile() else {
        let msg = "No profile yet. Run `psmf onboard` first.";
        if json {
            println!("{}", json_error(msg));
        } else {
            eprintln!("{msg}");
        }
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(profile)?);
        return Ok(());
    }

    let w = weight_stats(profile);
    println!("Protocol:  {} -> {}", profile.start_date, profile.target_date);
    println!(
        "Body:      {} y, {}, {:.0} cm",
        profile.age,
        profile.gender.as_str(),
        profile.height_cm
    );
    println!(
        "Weight:    start {:.1} kg, current {:.1} kg, target {:.1} kg",
        w.start, w.current, w.target
    );
    println!("Lost:      {:.1} kg ({:.1} kg to go)", w.lost, w.remaining);
    if let Some(bmi) = w.bmi {
        println!("BMI:       {bmi:.1}");
    }
    Ok(())
}

pub(crate) fn cmd_profile_set(svc: &mut PsmfService, update: &ProfileUpdate, json: bool) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update. Pass at least one field (e.g. --weight 92.4)");
    }
    let profile = svc.update_profile(update)?;

    if json {
        println!("{}", serde_json::to_string_pretty(profile)?);
    } else {
        println!(
            "Profile updated. Current weight {:.1} kg, target {:.1} kg by {}",
            profile.current_weight, profile.target_weight, profile.target_date
        );
    }
    Ok(())
}

pub(crate) fn cmd_reset(svc: &mut PsmfService, yes: bool, json: bool) -> Result<()> {
    if !yes && !confirm("Delete the profile, today's log and all history?")? {
        if json {
            println!("{}", serde_json::json!({ "reset": false }));
        } else {
            eprintln!("Aborted");
        }
        return Ok(());
    }

    svc.reset_all()?;

    if json {
        println!("{}", serde_json::json!({ "reset": true }));
    } else {
        println!("All data deleted. Run `psmf onboard` to start a new protocol.");
    }
    Ok(())
}
