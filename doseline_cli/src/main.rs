use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use doseline_core::csv_io::{export_rows, import_rows};
use doseline_core::curve::{CurveEngine, CurveInput};
use doseline_core::share::{encode_token, fragment_of, share_url};
use doseline_core::store::serialize_local;
use doseline_core::timeline::accumulate_intervals;
use doseline_core::*;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "doseline")]
#[command(about = "Dosing-regimen timeline editor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Load the regimen from a share link (or its fragment)
    #[arg(long, global = true)]
    link: Option<String>,

    /// Override how multidose times are read
    #[arg(long, global = true, value_enum)]
    time_mode: Option<TimeModeArg>,

    /// Override the colour scheme for this run
    #[arg(long, global = true, value_enum)]
    color_scheme: Option<ColorSchemeArg>,

    /// Show or hide the menstrual cycle overlay
    #[arg(long, global = true)]
    cycle_overlay: Option<bool>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum TimeModeArg {
    Absolute,
    Interval,
}

impl From<TimeModeArg> for TimeMode {
    fn from(arg: TimeModeArg) -> Self {
        match arg {
            TimeModeArg::Absolute => TimeMode::Absolute,
            TimeModeArg::Interval => TimeMode::Interval,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorSchemeArg {
    Day,
    Night,
}

impl From<ColorSchemeArg> for ColorScheme {
    fn from(arg: ColorSchemeArg) -> Self {
        match arg {
            ColorSchemeArg::Day => ColorScheme::Day,
            ColorSchemeArg::Night => ColorScheme::Night,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show both tables and the curve input (default)
    Show,

    /// Add an entry in place of the trailing scratch row
    Add {
        /// Day offset, interval or calendar date (YYYY-MM-DD)
        time: String,

        /// Dose in mg (mg/day for patches)
        dose: String,

        /// Delivery method; partial names such as "een" are accepted
        method: Option<String>,

        /// Add to the steady-state table
        #[arg(long)]
        steady: bool,
    },

    /// Edit fields of an existing row (1-based)
    Edit {
        row: usize,

        #[arg(long)]
        time: Option<String>,

        #[arg(long)]
        dose: Option<String>,

        #[arg(long)]
        method: Option<String>,

        /// Show or hide the curve
        #[arg(long)]
        visible: Option<bool>,

        /// Show or hide the uncertainty band
        #[arg(long)]
        uncertainty: Option<bool>,

        #[arg(long)]
        steady: bool,
    },

    /// Remove a row (1-based)
    Remove {
        row: usize,

        #[arg(long)]
        steady: bool,
    },

    /// Clear a table, leaving one empty row
    Clear {
        #[arg(long)]
        steady: bool,
    },

    /// Predict the next multidose entry
    Autofill,

    /// Replace the multidose table with rows from a CSV file
    Import { file: PathBuf },

    /// Write the multidose table as CSV (stdout by default)
    Export { file: Option<PathBuf> },

    /// Print a shareable link
    Share {
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Load a named preset
    Preset { name: String },

    /// List presets
    Presets,

    /// List delivery methods
    Methods,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    doseline_core::logging::init(cli.verbose);

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let mut store = FileStore::new(data_dir.join("store"));

    let fragment = cli.link.as_deref().map(fragment_of);
    let (mut state, source) = load_initial(fragment, &store, config.options());

    if source == RestoreSource::DefaultPreset && config.presets.startup != "default" {
        match presets::find(&config.presets.startup) {
            Some(preset) => state = reduce(&state, Event::ApplyPreset(preset)),
            None => tracing::warn!("Unknown startup preset {}", config.presets.startup),
        }
    }
    if let Some(mode) = cli.time_mode {
        state = reduce(&state, Event::SetTimeMode(mode.into()));
    }
    if let Some(scheme) = cli.color_scheme {
        state = reduce(&state, Event::SetColorScheme(scheme.into()));
    }
    if let Some(on) = cli.cycle_overlay {
        state = reduce(&state, Event::SetCycleOverlay(on));
    }

    let ctx = Ctx {
        source,
        now: Utc::now(),
        base_url: config.share.base_url.clone(),
    };

    match cli.command {
        Some(Commands::Add {
            time,
            dose,
            method,
            steady,
        }) => {
            let state = cmd_add(state, table_kind(steady), time, dose, method)?;
            save_and_show(&mut store, &state, &ctx)
        }
        Some(Commands::Edit {
            row,
            time,
            dose,
            method,
            visible,
            uncertainty,
            steady,
        }) => {
            let kind = table_kind(steady);
            let id = row_id(&state, kind, row)?;
            let mut edits = Vec::new();
            if let Some(time) = time {
                edits.push(FieldEdit::Time(time));
            }
            if let Some(dose) = dose {
                edits.push(FieldEdit::Dose(dose));
            }
            if let Some(method) = method {
                edits.push(FieldEdit::Method(parse_method(&method)?));
            }
            if let Some(visible) = visible {
                edits.push(FieldEdit::CurveVisible(visible));
            }
            if let Some(visible) = uncertainty {
                edits.push(FieldEdit::UncertaintyVisible(visible));
            }

            let before = state.clone();
            for edit in edits {
                state = reduce(&state, Event::Edit { table: kind, id, edit });
            }
            if !needs_recompute(&before, &state) {
                println!("Curve unchanged.");
            }
            save_and_show(&mut store, &state, &ctx)
        }
        Some(Commands::Remove { row, steady }) => {
            let kind = table_kind(steady);
            let id = row_id(&state, kind, row)?;
            let state = reduce(&state, Event::Remove { table: kind, id });
            save_and_show(&mut store, &state, &ctx)
        }
        Some(Commands::Clear { steady }) => {
            let state = reduce(&state, Event::Clear { table: table_kind(steady) });
            save_and_show(&mut store, &state, &ctx)
        }
        Some(Commands::Autofill) => {
            let state = reduce(&state, Event::Autofill);
            print_notice(&state);
            save_and_show(&mut store, &state, &ctx)
        }
        Some(Commands::Import { file }) => {
            let report = import_rows(File::open(&file)?)?;
            for rejected in &report.rejected {
                println!("  line {}: {}", rejected.line, rejected.reason);
            }
            let skipped = report.skipped();
            let state = reduce(
                &state,
                Event::Import {
                    drafts: report.drafts,
                    skipped,
                },
            );
            print_notice(&state);
            save_and_show(&mut store, &state, &ctx)
        }
        Some(Commands::Export { file }) => cmd_export(&state, file),
        Some(Commands::Share { base_url }) => {
            let token = encode_token(&snapshot(&state))?;
            let base = base_url.unwrap_or(ctx.base_url);
            println!("{}", share_url(&base, &token));
            Ok(())
        }
        Some(Commands::Preset { name }) => {
            let preset = presets::find(&name).ok_or_else(|| {
                Error::Other(format!(
                    "Unknown preset '{}'. Run `doseline presets` to list them.",
                    name
                ))
            })?;
            let state = reduce(&state, Event::ApplyPreset(preset));
            save_and_show(&mut store, &state, &ctx)
        }
        Some(Commands::Presets) => {
            for preset in presets::all() {
                println!("  {:<12} {}", preset.name, preset.description);
            }
            Ok(())
        }
        Some(Commands::Methods) => {
            for info in &get_default_catalog().methods {
                println!("  {:<11} {}", info.key, info.description);
            }
            Ok(())
        }
        Some(Commands::Show) | None => {
            display_state(&state, &ctx)
        }
    }
}

struct Ctx {
    source: RestoreSource,
    now: DateTime<Utc>,
    base_url: String,
}

fn table_kind(steady: bool) -> TableKind {
    if steady {
        TableKind::SteadyState
    } else {
        TableKind::Multidose
    }
}

fn row_id(state: &RegimenState, kind: TableKind, row: usize) -> Result<EntryId> {
    let entries = state.table(kind).entries();
    row.checked_sub(1)
        .and_then(|i| entries.get(i))
        .map(|e| e.id)
        .ok_or_else(|| Error::Other(format!("No row {} (table has {} rows)", row, entries.len())))
}

fn parse_method(token: &str) -> Result<DeliveryMethod> {
    get_default_catalog()
        .find_intersecting(token)
        .ok_or_else(|| Error::Other(format!("Unknown delivery method '{}'", token)))
}

/// Type the fields into the scratch row, the way an editor would
fn cmd_add(
    mut state: RegimenState,
    kind: TableKind,
    time: String,
    dose: String,
    method: Option<String>,
) -> Result<RegimenState> {
    let id = match state.table(kind).scratch_id() {
        Some(id) => id,
        None => {
            state = reduce(&state, Event::Add { table: kind, draft: None });
            state
                .table(kind)
                .scratch_id()
                .ok_or_else(|| Error::Other("No scratch row available".into()))?
        }
    };

    let mut edits = Vec::new();
    if let Some(method) = method {
        edits.push(FieldEdit::Method(parse_method(&method)?));
    }
    edits.push(FieldEdit::Time(time));
    edits.push(FieldEdit::Dose(dose));

    for edit in edits {
        state = reduce(&state, Event::Edit { table: kind, id, edit });
    }

    if state.table(kind).get(id).is_some_and(|e| !e.valid) {
        println!("Entry kept as a draft: it needs a number or date and a dose above zero.");
    }
    Ok(state)
}

fn cmd_export(state: &RegimenState, file: Option<PathBuf>) -> Result<()> {
    match file {
        Some(path) => {
            let count = export_rows(&state.multidose, File::create(&path)?)?;
            println!("✓ Exported {} rows to {}", count, path.display());
        }
        None => {
            let stdout = io::stdout();
            export_rows(&state.multidose, stdout.lock())?;
        }
    }
    Ok(())
}

fn save_and_show(store: &mut FileStore, state: &RegimenState, ctx: &Ctx) -> Result<()> {
    serialize_local(store, &snapshot(state))?;
    display_state(state, ctx)
}

fn print_notice(state: &RegimenState) {
    match &state.notice {
        Some(Notice::InferenceUnavailable) => {
            println!("No pattern to extend: autofill needs two matching entries.")
        }
        Some(Notice::Imported { accepted, skipped }) => {
            println!("✓ Imported {} entries, skipped {}", accepted, skipped)
        }
        Some(Notice::RestoreMissed) => println!("Nothing to restore."),
        None => {}
    }
}

fn display_state(state: &RegimenState, ctx: &Ctx) -> Result<()> {
    let source = match ctx.source {
        RestoreSource::SharedLink => "share link",
        RestoreSource::LocalStore => "local store",
        RestoreSource::DefaultPreset => "default preset",
    };
    println!("Source: {}", source);

    display_table("Multidose", &state.multidose);
    display_table("Steady state", &state.steady_state);

    let input = build_curve_input(state, ctx.now);
    let mut stdout = io::stdout().lock();
    write!(stdout, "{}", TextTimeline.render(&input))?;
    stdout.flush()?;
    Ok(())
}

fn display_table(title: &str, table: &RegimenTable) {
    println!();
    println!("{}", title);
    println!("  {:>3}  {:<20} {:>8}  {:<11}", "#", "time", "dose", "method");
    for (i, entry) in table.entries().iter().enumerate() {
        let marker = if entry.valid {
            ""
        } else if entry.is_blank() {
            "  (empty)"
        } else {
            "  (draft)"
        };
        println!(
            "  {:>3}  {:<20} {:>8}  {:<11}{}",
            i + 1,
            entry.time,
            entry.dose,
            entry.method.key(),
            marker
        );
    }
}

/// Plain-text rendering of the curve input
struct TextTimeline;

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

impl CurveEngine for TextTimeline {
    type Artifact = String;

    fn render(&self, input: &CurveInput) -> String {
        let mut out = String::new();
        let options = &input.options;
        let unit = if options.concentration_unit_scale == 1.0 {
            "pg/mL"
        } else {
            "pmol/L"
        };

        out.push_str(&format!(
            "\nTimeline ({}, {:?} scheme{})\n",
            unit,
            options.color_scheme,
            if options.show_cycle_overlay {
                ", menstrual cycle overlay"
            } else {
                ""
            }
        ));

        let multidose = &input.multidose;
        out.push_str(&format!(
            "  multidose: curve {}, uncertainty {}\n",
            on_off(multidose.curve_visible),
            on_off(multidose.uncertainty_visible)
        ));
        if multidose.events.is_empty() {
            out.push_str("    (no entries)\n");
        } else {
            let offsets: Vec<f64> = multidose.events.iter().map(|e| e.day_offset).collect();
            let days = if options.display_as_intervals {
                accumulate_intervals(&offsets)
            } else {
                offsets
            };
            for (event, day) in multidose.events.iter().zip(days) {
                out.push_str(&format!(
                    "    day {:>7.2}  {:>8} mg  {}\n",
                    day, event.dose, event.method
                ));
            }
        }

        for steady in &input.steady_states {
            out.push_str(&format!(
                "  steady state: {} mg {} every {} days (curve {}, uncertainty {})\n",
                steady.event.dose,
                steady.event.method,
                steady.event.day_offset,
                on_off(steady.curve_visible),
                on_off(steady.uncertainty_visible)
            ));
        }

        out
    }
}
