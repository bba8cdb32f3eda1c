use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Act as this user
    #[arg(long, global = true, env = "ACTIVITY_USER")]
    pub user: Option<String>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new activity (supervisors only)
    ///
    /// Example: activity add "Quarterly review" --assign user1 --date 2025-03-12 --time 09:30
    Add {
        title: String,
        #[arg(long = "assign", value_name = "USER")]
        assigned_user: String,
        #[arg(long = "date", value_name = "YYYY-MM-DD")]
        scheduled_date: String,
        #[arg(long = "time", value_name = "HH:MM")]
        scheduled_time: Option<String>,
        #[arg(long = "unit")]
        assigned_unit: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, default_value = "normal")]
        importance: String,
    },
    /// Edit an activity
    ///
    /// Example: activity edit activity-1 --title "Annual review" --time ""
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long = "assign", value_name = "USER")]
        assigned_user: Option<String>,
        #[arg(long = "unit")]
        assigned_unit: Option<String>,
        #[arg(long = "date", value_name = "YYYY-MM-DD")]
        scheduled_date: Option<String>,
        #[arg(long = "time", value_name = "HH:MM")]
        scheduled_time: Option<String>,
        #[arg(long)]
        importance: Option<String>,
    },
    /// Mark an in-progress activity as completed
    ///
    /// Example: activity done activity-1
    Done { id: String },
    /// Resolve an overdue activity
    ///
    /// Example: activity resolve activity-1
    Resolve { id: String },
    /// Archive an activity (supervisors only)
    Archive { id: String },
    /// Cancel an activity (supervisors only)
    Cancel { id: String },
    /// Delete an activity (supervisors only)
    Delete { id: String },
    /// Show details of an activity
    Show { id: String },
    /// List activities
    ///
    /// Example: activity list today
    /// Example: activity list unit finance
    List {
        #[command(subcommand)]
        list: ListCommand,
    },
    /// Run the overdue check once
    Check,
    /// Show the supervisor restriction and pending overdue activities
    Status,
    /// Show dashboard counters, or a report for a period
    ///
    /// Example: activity stats --period weekly
    Stats {
        #[arg(long)]
        period: Option<String>,
    },
    /// Keep checking for overdue activities until interrupted
    Watch {
        /// Seconds between checks, defaults to the configured interval
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// Activities scheduled for today
    Today,
    /// Activities scheduled after today
    Upcoming,
    /// Archived and cancelled activities
    Archived,
    /// Every visible activity
    All,
    /// Activities of one organizational unit
    Unit { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    ThresholdDays,
    CheckIntervalSecs,
    StoreKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let canonical_field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match canonical_field.as_str() {
        "threshold_days" | "threshold" => ConfigOverrideTarget::ThresholdDays,
        "check_interval_secs" | "check_interval" => ConfigOverrideTarget::CheckIntervalSecs,
        "store_key" => ConfigOverrideTarget::StoreKey,
        other => return Err(format!("unknown config field '{other}'")),
    };

    match target {
        ConfigOverrideTarget::ThresholdDays if value.parse::<u32>().is_err() => {
            Err("threshold_days override must be a non-negative integer".to_string())
        }
        ConfigOverrideTarget::CheckIntervalSecs if value.parse::<u64>().is_err() => {
            Err("check_interval_secs override must be a non-negative integer".to_string())
        }
        ConfigOverrideTarget::StoreKey if value.is_empty() => {
            Err("store_key override cannot be empty".to_string())
        }
        _ => Ok(ParsedConfigOverride { target, value }),
    }
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
