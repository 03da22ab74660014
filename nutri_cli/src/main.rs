use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use nutri_core::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "nutri")]
#[command(about = "Personal nutrition assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate daily calories from biometrics
    Estimate {
        /// Body weight in kilograms
        #[arg(long)]
        weight: Option<String>,

        /// Height in centimeters
        #[arg(long)]
        height: Option<String>,

        /// Age in whole years
        #[arg(long)]
        age: Option<String>,

        /// male or female
        #[arg(long)]
        sex: Option<String>,

        /// sedentary, light, moderate, active or very_active
        #[arg(long)]
        activity: Option<String>,

        /// Print the estimate as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the stored profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Log a food or meal to the intake journal
    Log {
        #[arg(long)]
        name: String,

        /// Energy in kcal
        #[arg(long)]
        calories: f64,

        #[arg(long, default_value_t = 0.0)]
        protein: f64,

        #[arg(long, default_value_t = 0.0)]
        carbs: f64,

        #[arg(long, default_value_t = 0.0)]
        fat: f64,
    },

    /// Summarize recent intake against the daily target
    Insights {
        /// Window in days (defaults to config)
        #[arg(long)]
        days: Option<u32>,

        #[arg(long)]
        json: bool,
    },

    /// Manage the pantry inventory
    Inventory {
        #[command(subcommand)]
        command: InventoryCommands,
    },

    /// Roll up the intake journal to CSV
    Rollup {
        /// Clean up processed journal files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Create the profile
    Init {
        #[arg(long)]
        name: String,

        #[command(flatten)]
        fields: ProfileFields,

        /// Replace an existing profile
        #[arg(long)]
        force: bool,
    },

    /// Show the profile and its daily calories
    Show {
        #[arg(long)]
        json: bool,
    },

    /// Change profile fields and recompute daily calories
    Update {
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        fields: ProfileFields,
    },

    /// Delete the profile
    Delete,
}

#[derive(Subcommand)]
enum InventoryCommands {
    /// Add an item to the pantry
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        quantity: f64,

        #[arg(long, default_value = "pcs")]
        unit: String,

        #[arg(long, default_value = "other")]
        category: String,

        #[command(flatten)]
        expiry: ExpiryArgs,

        /// Alert when quantity falls to this level (defaults to config)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// List pantry items, newest first
    List {
        #[arg(long)]
        json: bool,
    },

    /// Change an item
    Update {
        id: Uuid,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        quantity: Option<f64>,

        #[arg(long)]
        unit: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[command(flatten)]
        expiry: ExpiryArgs,

        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Remove an item
    Remove { id: Uuid },

    /// Show items expiring soon or running low
    Alerts {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ExpiryArgs {
    /// Expiry date (YYYY-MM-DD, end of day UTC)
    #[arg(long, conflicts_with = "expires_in")]
    expires: Option<NaiveDate>,

    /// Expiry as days from now
    #[arg(long)]
    expires_in: Option<u32>,
}

impl ExpiryArgs {
    fn resolve(&self) -> Option<DateTime<Utc>> {
        if let Some(days) = self.expires_in {
            return Some(Utc::now() + Duration::days(i64::from(days)));
        }
        self.expires
            .and_then(|date| date.and_hms_opt(23, 59, 59))
            .map(|at| at.and_utc())
    }
}

#[derive(Args)]
struct ProfileFields {
    /// Age in whole years
    #[arg(long)]
    age: Option<u32>,

    /// Body weight in kilograms
    #[arg(long)]
    weight: Option<f64>,

    /// Height in centimeters
    #[arg(long)]
    height: Option<f64>,

    #[arg(long)]
    sex: Option<Sex>,

    #[arg(long)]
    activity: Option<ActivityLevel>,

    /// Health goal (repeatable)
    #[arg(long = "goal")]
    goals: Vec<String>,

    /// Dietary preference (repeatable)
    #[arg(long = "diet")]
    dietary_preferences: Vec<String>,

    /// Allergy (repeatable)
    #[arg(long = "allergy")]
    allergies: Vec<String>,

    /// Health condition (repeatable)
    #[arg(long = "condition")]
    health_conditions: Vec<String>,
}

fn main() -> ExitCode {
    nutri_core::logging::init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);

    match cli.command {
        Commands::Estimate {
            weight,
            height,
            age,
            sex,
            activity,
            json,
        } => {
            let form = ProfileForm {
                weight_kg: weight,
                height_cm: height,
                age_years: age,
                sex,
                activity_level: activity,
            };
            cmd_estimate(&form, json)
        }
        Commands::Profile { command } => cmd_profile(&data_dir, command, &config),
        Commands::Log {
            name,
            calories,
            protein,
            carbs,
            fat,
        } => cmd_log(
            &data_dir,
            name,
            calories,
            Macros {
                protein_g: protein,
                carbs_g: carbs,
                fat_g: fat,
            },
        ),
        Commands::Insights { days, json } => cmd_insights(&data_dir, days, json, &config),
        Commands::Inventory { command } => cmd_inventory(&data_dir, command, &config),
        Commands::Rollup { cleanup } => cmd_rollup(&data_dir, cleanup),
    }
}

fn report_error(error: &Error) {
    match error {
        Error::InvalidProfile(invalid) => {
            eprintln!("Cannot estimate daily calories. Please correct:");
            for issue in &invalid.issues {
                eprintln!("  - {} {}", issue.field, issue.problem);
            }
        }
        other => eprintln!("Error: {}", other),
    }
}

fn profile_repository(data_dir: &Path) -> ProfileRepository<JsonFileStore> {
    ProfileRepository::new(JsonFileStore::new(data_dir.join("profiles")))
}

fn inventory_repository(data_dir: &Path, config: &Config) -> InventoryRepository<JsonFileStore> {
    InventoryRepository::new(JsonFileStore::new(data_dir.join("pantry")), &config.inventory)
}

fn journal_path(data_dir: &Path) -> PathBuf {
    data_dir.join("journal").join("intake.jsonl")
}

fn csv_path(data_dir: &Path) -> PathBuf {
    data_dir.join("intake.csv")
}

fn cmd_estimate(form: &ProfileForm, json: bool) -> Result<()> {
    let profile = form.parse()?;
    let estimate = estimate(&profile)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
        return Ok(());
    }

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  DAILY CALORIES");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Daily calories: {} kcal/day", estimate.tdee);
    println!("  Resting (BMR):  {} kcal/day", estimate.bmr);
    println!(
        "  Activity level: {} (x{})",
        profile.activity_level,
        profile.activity_level.multiplier()
    );
    println!();

    Ok(())
}

fn cmd_profile(data_dir: &Path, command: ProfileCommands, config: &Config) -> Result<()> {
    let repo = profile_repository(data_dir);

    match command {
        ProfileCommands::Init {
            name,
            fields,
            force,
        } => {
            if !force && repo.get(ACTIVE_PROFILE_KEY)?.is_some() {
                return Err(Error::Other(
                    "A profile already exists. Use `nutri profile update` or pass --force.".into(),
                ));
            }

            let draft = ProfileDraft {
                name,
                age_years: fields.age,
                weight_kg: fields.weight,
                height_cm: fields.height,
                sex: fields.sex,
                activity_level: fields.activity.unwrap_or_default(),
                dietary_preferences: fields.dietary_preferences,
                health_conditions: fields.health_conditions,
                allergies: fields.allergies,
                goals: fields.goals.iter().map(|g| Goal::parse(g)).collect(),
            };

            let profile = repo.create(ACTIVE_PROFILE_KEY, draft)?;
            println!("✓ Profile created for {}", profile.name);
            display_profile(&profile, config);
            Ok(())
        }

        ProfileCommands::Show { json } => {
            let Some(profile) = repo.get(ACTIVE_PROFILE_KEY)? else {
                println!("No profile found. Run `nutri profile init` first.");
                return Ok(());
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                display_profile(&profile, config);
            }
            Ok(())
        }

        ProfileCommands::Update { name, fields } => {
            let non_empty = |values: Vec<String>| (!values.is_empty()).then_some(values);

            let update = ProfileUpdate {
                name,
                age_years: fields.age,
                weight_kg: fields.weight,
                height_cm: fields.height,
                sex: fields.sex,
                activity_level: fields.activity,
                goals: non_empty(fields.goals)
                    .map(|goals| goals.iter().map(|g| Goal::parse(g)).collect()),
                dietary_preferences: non_empty(fields.dietary_preferences),
                health_conditions: non_empty(fields.health_conditions),
                allergies: non_empty(fields.allergies),
            };

            match repo.update(ACTIVE_PROFILE_KEY, update)? {
                Some(profile) => {
                    println!("✓ Profile updated");
                    display_profile(&profile, config);
                    Ok(())
                }
                None => Err(Error::Other(
                    "No profile found. Run `nutri profile init` first.".into(),
                )),
            }
        }

        ProfileCommands::Delete => {
            if repo.delete(ACTIVE_PROFILE_KEY)? {
                println!("✓ Profile deleted");
            } else {
                println!("No profile to delete.");
            }
            Ok(())
        }
    }
}

fn display_profile(profile: &UserProfile, config: &Config) {
    let unset = || "-".to_string();

    println!();
    println!("  {}", profile.name);
    println!(
        "  Age: {}  Weight: {} kg  Height: {} cm  Sex: {}",
        profile.age_years.map(|v| v.to_string()).unwrap_or_else(unset),
        profile.weight_kg.map(|v| v.to_string()).unwrap_or_else(unset),
        profile.height_cm.map(|v| v.to_string()).unwrap_or_else(unset),
        profile.sex.map(|v| v.to_string()).unwrap_or_else(unset),
    );
    println!("  Activity level: {}", profile.activity_level);

    if !profile.goals.is_empty() {
        let goals: Vec<String> = profile.goals.iter().map(|g| g.to_string()).collect();
        println!("  Goals: {}", goals.join(", "));
    }

    match profile.estimate {
        Some(estimate) => {
            println!("  Daily calories: {} kcal/day", estimate.tdee);
            println!("  Resting (BMR):  {} kcal/day", estimate.bmr);
        }
        None => {
            println!(
                "  Daily calories: {} kcal/day (default until age, weight, height and sex are set)",
                profile.daily_target(config.targets.fallback_daily_calories)
            );
        }
    }
    println!();
}

fn cmd_log(data_dir: &Path, name: String, calories: f64, macros: Macros) -> Result<()> {
    let entry = IntakeEntry::new(name, calories, macros)?;

    let mut sink = JsonlSink::new(journal_path(data_dir));
    sink.append(&entry)?;

    println!("✓ Logged {} ({} kcal)", entry.name, entry.calories);
    Ok(())
}

fn cmd_insights(data_dir: &Path, days: Option<u32>, json: bool, config: &Config) -> Result<()> {
    let Some(profile) = profile_repository(data_dir).get(ACTIVE_PROFILE_KEY)? else {
        return Err(Error::Other(
            "No profile found. Run `nutri profile init` first.".into(),
        ));
    };

    let days = days.unwrap_or(config.insights.period_days);
    if days == 0 {
        return Err(Error::Other("--days must be at least 1".into()));
    }

    let entries = load_recent_intake(&journal_path(data_dir), &csv_path(data_dir), days)?;
    let summary = IntakeSummary::from_entries(&entries, days);
    let insights = generate_insights(&profile, &summary, &config.insights);
    let daily_target = profile.daily_target(config.targets.fallback_daily_calories);

    if json {
        let report = serde_json::json!({
            "daily_target": daily_target,
            "summary": summary,
            "insights": insights
                .iter()
                .map(|i| serde_json::json!({ "kind": i, "message": i.message() }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("  Daily target: {} kcal/day", daily_target);
    println!(
        "  Last {} days: {} entries, {} kcal ({:.0} kcal/day)",
        summary.period_days,
        summary.entries,
        summary.total_calories,
        summary.daily_average_calories()
    );
    println!(
        "  Average per entry: protein {} g, carbs {} g, fat {} g",
        summary.avg_protein_g, summary.avg_carbs_g, summary.avg_fat_g
    );
    println!();
    for insight in &insights {
        println!("  → {}", insight.message());
    }
    println!();

    Ok(())
}

fn cmd_inventory(data_dir: &Path, command: InventoryCommands, config: &Config) -> Result<()> {
    let repo = inventory_repository(data_dir, config);

    match command {
        InventoryCommands::Add {
            name,
            quantity,
            unit,
            category,
            expiry,
            threshold,
        } => {
            let Some(expiry) = expiry.resolve() else {
                return Err(Error::InvalidItem(
                    "an expiry is required: pass --expires or --expires-in".into(),
                ));
            };
            let item = repo.add(NewInventoryItem {
                name,
                quantity,
                unit,
                expiry,
                category,
                low_stock_threshold: threshold,
            })?;
            println!("✓ Added {} ({} {})", item.name, item.quantity, item.unit);
            println!("  id: {}", item.id);
            Ok(())
        }

        InventoryCommands::List { json } => {
            let items = repo.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
                return Ok(());
            }
            if items.is_empty() {
                println!("Pantry is empty.");
                return Ok(());
            }

            println!();
            for item in &items {
                println!(
                    "  {}  {} {} {} [{}], expires {}",
                    item.id,
                    item.name,
                    item.quantity,
                    item.unit,
                    item.category,
                    item.expiry.format("%Y-%m-%d")
                );
            }
            println!();
            Ok(())
        }

        InventoryCommands::Update {
            id,
            name,
            quantity,
            unit,
            category,
            expiry,
            threshold,
        } => {
            let update = InventoryUpdate {
                name,
                quantity,
                unit,
                expiry: expiry.resolve(),
                category,
                low_stock_threshold: threshold,
            };
            match repo.update(id, update)? {
                Some(item) => {
                    println!("✓ Updated {} ({} {})", item.name, item.quantity, item.unit);
                    Ok(())
                }
                None => Err(Error::Other(format!("No inventory item with id {}", id))),
            }
        }

        InventoryCommands::Remove { id } => {
            if repo.remove(id)? {
                println!("✓ Removed {}", id);
                Ok(())
            } else {
                Err(Error::Other(format!("No inventory item with id {}", id)))
            }
        }

        InventoryCommands::Alerts { json } => {
            let items = repo.list()?;
            let alerts = inventory_alerts(&items, Utc::now(), &config.inventory);

            if json {
                println!("{}", serde_json::to_string_pretty(&alerts)?);
                return Ok(());
            }
            if alerts.is_empty() {
                println!("No pantry alerts.");
                return Ok(());
            }

            println!();
            for alert in &alerts.expiring {
                let label = match alert.level {
                    AlertLevel::Urgent => "URGENT",
                    AlertLevel::Warning => "warning",
                };
                println!(
                    "  [{}] {} expires in {} day(s)",
                    label, alert.item.name, alert.days_until_expiry
                );
            }
            for alert in &alerts.low_stock {
                println!(
                    "  [low] {}: {} {} left (threshold {})",
                    alert.item.name, alert.current_quantity, alert.item.unit, alert.threshold
                );
            }
            println!();
            Ok(())
        }
    }
}

fn cmd_rollup(data_dir: &Path, cleanup: bool) -> Result<()> {
    let journal_path = journal_path(data_dir);
    let csv_path = csv_path(data_dir);

    if !journal_path.exists() {
        println!("No journal found - nothing to roll up.");
        return Ok(());
    }

    let count = nutri_core::rollup::journal_to_csv_and_archive(&journal_path, &csv_path)?;

    println!("✓ Rolled up {} entries to CSV", count);
    println!("  CSV: {}", csv_path.display());

    if cleanup {
        let journal_dir = journal_path.parent().unwrap_or(data_dir);
        let cleaned = nutri_core::rollup::cleanup_processed_journals(journal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed journal files", cleaned);
        }
    }

    Ok(())
}
