use activity_cli::cli::{
    Cli, Command, ConfigOverrideTarget, ListCommand, parse_config_override,
};
use activity_core::activity_api::{ActivityPatch, ActivityView, DefaultTracker, NewActivity};
use activity_core::config::{Config, ConfigOverrides, load_config_with_fallback, merge_overrides};
use activity_core::error::AppError;
use activity_core::model::{Activity, ActivityStatus, Importance};
use activity_core::monitor::{OverdueMonitor, SharedNotifier};
use activity_core::notify::notifier_from_env;
use activity_core::stats::{ActivityStats, Period, PeriodReport};
use activity_core::suspension::days_pending;
use clap::{CommandFactory, Parser};
use std::io::{self, BufRead};
use std::sync::Arc;
use std::time::Duration;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "ACTIVITY_LOG";

#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "title")]
    title: String,
    #[tabled(rename = "assignee")]
    assignee: String,
    #[tabled(rename = "unit")]
    unit: String,
    #[tabled(rename = "due")]
    due: String,
    #[tabled(rename = "importance")]
    importance: String,
    #[tabled(rename = "status")]
    status: String,
}

fn init_tracing() {
    let filter = std::env::var(LOG_ENV_VAR)
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn due_label(activity: &Activity) -> String {
    let date = activity.scheduled_date.as_deref().unwrap_or("-");
    match activity.scheduled_time.as_deref() {
        Some(time) => format!("{date} {time}"),
        None => date.to_string(),
    }
}

fn status_label(activity: &Activity, now: OffsetDateTime) -> String {
    match (activity.status, days_pending(activity, now)) {
        (ActivityStatus::Overdue, Some(days)) => {
            let unit = if days == 1 { "day" } else { "days" };
            format!("overdue {days} {unit}")
        }
        (status, _) => status.label().to_string(),
    }
}

fn activity_row(activity: &Activity, now: OffsetDateTime) -> ActivityRow {
    ActivityRow {
        id: activity.id.clone(),
        title: activity.title.clone(),
        assignee: activity.assigned_user.clone(),
        unit: activity.assigned_unit.clone(),
        due: due_label(activity),
        importance: activity.importance.label().to_string(),
        status: status_label(activity, now),
    }
}

fn print_activities_plain(activities: &[Activity], now: OffsetDateTime) {
    if activities.is_empty() {
        println!("No activities.");
        return;
    }

    let rows: Vec<ActivityRow> = activities
        .iter()
        .map(|activity| activity_row(activity, now))
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

fn activity_json(activity: &Activity, now: OffsetDateTime) -> Result<serde_json::Value, AppError> {
    let mut value =
        serde_json::to_value(activity).map_err(|err| AppError::invalid_data(err.to_string()))?;
    if let Some(days) = days_pending(activity, now)
        && let Some(fields) = value.as_object_mut()
    {
        fields.insert("days_pending".to_string(), serde_json::json!(days));
    }
    Ok(value)
}

fn activities_json(
    activities: &[Activity],
    now: OffsetDateTime,
) -> Result<serde_json::Value, AppError> {
    let payload = activities
        .iter()
        .map(|activity| activity_json(activity, now))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::Value::Array(payload))
}

fn print_activities_json(activities: &[Activity], now: OffsetDateTime) -> Result<(), AppError> {
    println!("{}", activities_json(activities, now)?);
    Ok(())
}

fn print_activity_json(activity: &Activity, now: OffsetDateTime) -> Result<(), AppError> {
    println!("{}", activity_json(activity, now)?);
    Ok(())
}

fn print_activity_details(activity: &Activity, now: OffsetDateTime) {
    println!("id:         {}", activity.id);
    println!("title:      {}", activity.title);
    if let Some(notes) = activity.notes.as_deref() {
        println!("notes:      {notes}");
    }
    println!("assignee:   {}", activity.assigned_user);
    println!("unit:       {}", activity.assigned_unit);
    println!("due:        {}", due_label(activity));
    println!("importance: {}", activity.importance.label());
    println!("status:     {}", status_label(activity, now));
    if let Some(pending_since) = activity.pending_since.as_deref() {
        println!("pending:    since {pending_since}");
    }
    if let Some(resolved_at) = activity.resolved_at.as_deref() {
        println!("resolved:   {resolved_at}");
    }
    if let Some(created_by) = activity.created_by.as_deref() {
        println!("created by: {created_by}");
    }
    if let Some(created_at) = activity.created_at.as_deref() {
        println!("created at: {created_at}");
    }
    if let Some(updated_at) = activity.updated_at.as_deref() {
        println!("updated at: {updated_at}");
    }
}

fn print_stats_plain(stats: &ActivityStats) {
    println!("total:    {}", stats.total);
    println!("today:    {}", stats.today);
    println!("upcoming: {}", stats.upcoming);
    println!("archived: {}", stats.archived);
    for (status, count) in &stats.by_status {
        println!("  {status}: {count}");
    }
    for (importance, count) in &stats.by_importance {
        println!("  {importance}: {count}");
    }
    if !stats.units.is_empty() {
        println!("units:    {}", stats.units.join(", "));
    }
}

fn print_report_plain(report: &PeriodReport) {
    println!("generated:       {}", report.generated_at);
    println!("total:           {}", report.total);
    println!("completed:       {}", report.completed);
    println!("in progress:     {}", report.in_progress);
    println!("overdue:         {}", report.overdue);
    println!("completion rate: {}%", report.completion_rate);
}

fn not_found(id: &str) -> AppError {
    AppError::invalid_input(format!("activity '{}' not found", id.trim()))
}

fn parse_importance(raw: &str) -> Result<Importance, AppError> {
    Importance::parse(raw)
        .ok_or_else(|| AppError::invalid_input("importance must be urgent, medium or normal"))
}

fn resolve_config(base: &Config, raw_overrides: &[String]) -> Result<Config, AppError> {
    let mut overrides = ConfigOverrides::default();
    for raw in raw_overrides {
        let parsed = parse_config_override(raw).map_err(AppError::invalid_input)?;
        match parsed.target {
            ConfigOverrideTarget::ThresholdDays => {
                overrides.threshold_days = Some(parsed.value.parse().map_err(|_| {
                    AppError::invalid_input("threshold_days must be a non-negative integer")
                })?);
            }
            ConfigOverrideTarget::CheckIntervalSecs => {
                overrides.check_interval_secs = Some(parsed.value.parse().map_err(|_| {
                    AppError::invalid_input("check_interval_secs must be a non-negative integer")
                })?);
            }
            ConfigOverrideTarget::StoreKey => overrides.store_key = Some(parsed.value),
        }
    }
    Ok(merge_overrides(base, &overrides))
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            quoted = true;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() || quoted {
                args.push(std::mem::take(&mut current));
                quoted = false;
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }

    if !current.is_empty() || quoted {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn run_command(cli: Cli, base: &Config) -> Result<(), AppError> {
    let config = resolve_config(base, &cli.config_override)?;
    let tracker = DefaultTracker::from_config(&config)?;
    let actor = cli.user.as_deref().unwrap_or("");

    match cli.command {
        Command::Add {
            title,
            assigned_user,
            scheduled_date,
            scheduled_time,
            assigned_unit,
            notes,
            importance,
        } => {
            let activity = tracker.add_activity(
                actor,
                NewActivity {
                    title,
                    notes,
                    assigned_unit,
                    assigned_user,
                    scheduled_date,
                    scheduled_time,
                    importance: parse_importance(&importance)?,
                },
            )?;
            if cli.json {
                print_activity_json(&activity, tracker.now())?;
            } else {
                println!("Added activity: {} ({})", activity.title, activity.id);
            }
        }
        Command::Edit {
            id,
            title,
            notes,
            assigned_user,
            assigned_unit,
            scheduled_date,
            scheduled_time,
            importance,
        } => {
            let patch = ActivityPatch {
                title,
                notes,
                assigned_unit,
                assigned_user,
                scheduled_date,
                scheduled_time,
                importance: importance.as_deref().map(parse_importance).transpose()?,
            };
            let activity = tracker
                .update_activity(actor, &id, patch)?
                .ok_or_else(|| not_found(&id))?;
            if cli.json {
                print_activity_json(&activity, tracker.now())?;
            } else {
                println!("Updated activity: {} ({})", activity.title, activity.id);
            }
        }
        Command::Done { id } => {
            let activity = tracker
                .complete_activity(actor, &id)?
                .ok_or_else(|| not_found(&id))?;
            if cli.json {
                print_activity_json(&activity, tracker.now())?;
            } else {
                println!("Completed activity: {} ({})", activity.title, activity.id);
            }
        }
        Command::Resolve { id } => {
            if !tracker.resolve_activity(actor, &id)? {
                return Err(AppError::invalid_input(format!(
                    "activity '{}' is not overdue or does not exist",
                    id.trim()
                )));
            }
            let activity = tracker
                .get_activity(actor, &id)?
                .ok_or_else(|| not_found(&id))?;
            let restriction = tracker.restriction()?;
            if cli.json {
                let mut payload = activity_json(&activity, tracker.now())?;
                if let Some(fields) = payload.as_object_mut() {
                    fields.insert(
                        "creation_blocked".to_string(),
                        serde_json::json!(restriction.blocked),
                    );
                }
                println!("{payload}");
            } else {
                println!("Resolved activity: {} ({})", activity.title, activity.id);
                if !restriction.blocked {
                    println!("Supervisors may add activities again.");
                }
            }
        }
        Command::Archive { id } => {
            let activity = tracker
                .archive_activity(actor, &id)?
                .ok_or_else(|| not_found(&id))?;
            if cli.json {
                print_activity_json(&activity, tracker.now())?;
            } else {
                println!("Archived activity: {} ({})", activity.title, activity.id);
            }
        }
        Command::Cancel { id } => {
            let activity = tracker
                .cancel_activity(actor, &id)?
                .ok_or_else(|| not_found(&id))?;
            if cli.json {
                print_activity_json(&activity, tracker.now())?;
            } else {
                println!("Cancelled activity: {} ({})", activity.title, activity.id);
            }
        }
        Command::Delete { id } => {
            let activity = tracker
                .delete_activity(actor, &id)?
                .ok_or_else(|| not_found(&id))?;
            if cli.json {
                print_activity_json(&activity, tracker.now())?;
            } else {
                println!("Deleted activity: {} ({})", activity.title, activity.id);
            }
        }
        Command::Show { id } => {
            let activity = tracker
                .get_activity(actor, &id)?
                .ok_or_else(|| not_found(&id))?;
            if cli.json {
                print_activity_json(&activity, tracker.now())?;
            } else {
                print_activity_details(&activity, tracker.now());
            }
        }
        Command::List { list } => {
            let view = match list {
                ListCommand::Today => ActivityView::Today,
                ListCommand::Upcoming => ActivityView::Upcoming,
                ListCommand::Archived => ActivityView::Archived,
                ListCommand::All => ActivityView::All,
                ListCommand::Unit { name } => ActivityView::Unit(name),
            };
            let activities = tracker.list(actor, &view)?;
            if cli.json {
                print_activities_json(&activities, tracker.now())?;
            } else {
                print_activities_plain(&activities, tracker.now());
            }
        }
        Command::Check => {
            let transitioned = tracker.check_overdue()?;
            if cli.json {
                print_activities_json(&transitioned, tracker.now())?;
            } else {
                println!("Marked {} activities overdue.", transitioned.len());
                if !transitioned.is_empty() {
                    print_activities_plain(&transitioned, tracker.now());
                }
            }
        }
        Command::Status => {
            let now = tracker.now();
            let restriction = tracker.restriction()?;
            let stats = tracker.suspension_stats()?;
            let threshold_days = tracker.engine().threshold_days();
            if cli.json {
                let escalated: Vec<&str> = restriction
                    .escalated
                    .iter()
                    .map(|activity| activity.id.as_str())
                    .collect();
                let payload = serde_json::json!({
                    "creation_blocked": restriction.blocked,
                    "threshold_days": threshold_days,
                    "escalated": escalated,
                    "total_pending": stats.total_pending,
                    "total_resolved": stats.total_resolved,
                    "exceeded_threshold": stats.exceeded_threshold,
                    "pending": activities_json(&stats.pending, now)?,
                });
                println!("{payload}");
            } else {
                if restriction.blocked {
                    println!(
                        "Creation blocked: {} activities overdue for {threshold_days}+ days.",
                        restriction.escalated.len()
                    );
                } else {
                    println!("Creation allowed.");
                }
                println!(
                    "Pending: {}, resolved: {}, over threshold: {}",
                    stats.total_pending, stats.total_resolved, stats.exceeded_threshold
                );
                if !stats.pending.is_empty() {
                    print_activities_plain(&stats.pending, now);
                }
            }
        }
        Command::Stats { period } => match period {
            None => {
                let stats = tracker.stats(actor)?;
                if cli.json {
                    let payload = serde_json::to_value(&stats)
                        .map_err(|err| AppError::invalid_data(err.to_string()))?;
                    println!("{payload}");
                } else {
                    print_stats_plain(&stats);
                }
            }
            Some(raw) => {
                let report = tracker.report(actor, raw.parse::<Period>()?)?;
                if cli.json {
                    let payload = serde_json::to_value(&report)
                        .map_err(|err| AppError::invalid_data(err.to_string()))?;
                    println!("{payload}");
                } else {
                    print_report_plain(&report);
                }
            }
        },
        Command::Watch { interval } => {
            let period = interval
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or_else(|| config.check_interval());
            let alert_restriction = tracker
                .policy()
                .principal(actor)
                .is_some_and(|user| tracker.policy().can_create(user));
            run_watch(Arc::new(tracker), period, alert_restriction, cli.json)?;
        }
    }

    Ok(())
}

fn run_watch(
    tracker: Arc<DefaultTracker>,
    period: Duration,
    alert_restriction: bool,
    json: bool,
) -> Result<(), AppError> {
    let notifier: SharedNotifier = Arc::from(notifier_from_env()?);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::io(err.to_string()))?;

    runtime.block_on(async move {
        let handle = OverdueMonitor::spawn(tracker, notifier, period, alert_restriction);
        if !json {
            println!(
                "Watching for overdue activities every {}s. Press Ctrl-C to stop.",
                period.as_secs()
            );
        }

        let interrupted = tokio::signal::ctrl_c().await;
        let last = handle.latest();
        handle.shutdown().await;
        interrupted.map_err(|err| AppError::io(err.to_string()))?;

        if json {
            println!(
                "{}",
                serde_json::json!({
                    "transitioned": last.transitioned,
                    "escalated": last.escalated,
                })
            );
        } else {
            println!("Stopped watching.");
        }
        Ok::<(), AppError>(())
    })
}

fn run_interactive(base: &Config) -> Result<(), AppError> {
    let mut input = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();

    loop {
        input.clear();
        let bytes = stdin_lock
            .read_line(&mut input)
            .map_err(|err| AppError::io(err.to_string()))?;

        if bytes == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("activity".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if let Err(err) = run_command(cli, base) {
            eprintln!("ERROR: {}", err);
        }
    }

    Ok(())
}

fn main() {
    init_tracing();

    let loaded = load_config_with_fallback();
    if let Some(err) = loaded.error.as_ref() {
        tracing::warn!(error = %err, "falling back to default configuration");
    }
    let config = loaded.config;

    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        if let Err(err) = run_interactive(&config) {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(cli, &config) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
