//! lamina: apply, export and replay layered filter pipelines.
//!
//! Drives an [`EditSession`] the way an interactive editor would: each
//! `--filter` is selected, previewed and committed as its own layer,
//! layers can be hidden, and the visible result is saved along with an
//! optional script that reproduces it.
//!
//! # Usage
//!
//! ```text
//! lamina apply photo.png --filter grayscale --filter blur=7 --out out.png --script edit.lamina
//! lamina replay edit.lamina --input other.png --output other_edited.png
//! lamina filters
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

#![allow(clippy::print_stdout)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use lamina_export::{ExportOptions, Recipe, ScriptDialect, ScriptError, export};
use lamina_pipeline::{
    CpuOps, EditSession, FilterKind, FilterSpec, Image, OpsError, ParamSchema, SessionConfig,
    SessionError, codec, describe,
};

/// Non-destructive layered image filters from the command line.
#[derive(Parser)]
#[command(name = "lamina", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply filters to an image, one layer per filter.
    Apply(ApplyArgs),
    /// Replay a native lamina script.
    Replay(ReplayArgs),
    /// Print the filter catalog as JSON.
    Filters,
}

#[derive(Args)]
struct ApplyArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    /// Filter to commit, as `name` or `name=value` (e.g. `blur=7`,
    /// `edge_detect=120`, `contrast=1.4`). Repeat to stack layers.
    #[arg(long = "filter", value_parser = parse_filter)]
    filters: Vec<FilterSpec>,

    /// Filters as a JSON array of specs, e.g.
    /// `[{"filter":"blur","kernel_size":5}]`.
    #[arg(long, conflicts_with = "filters")]
    filters_json: Option<String>,

    /// Layer indices to hide after committing (1 is the first filter).
    #[arg(long = "hide")]
    hidden: Vec<usize>,

    /// Where to save the visible result.
    #[arg(long, default_value = lamina_export::script::DEFAULT_OUTPUT_PATH)]
    out: PathBuf,

    /// Also write a script that reproduces the result.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Script language for `--script`.
    #[arg(long, value_enum, default_value_t = Dialect::Native)]
    dialect: Dialect,

    /// Maximum undo steps kept by the session.
    #[arg(long, default_value_t = SessionConfig::DEFAULT_MAX_HISTORY)]
    max_history: usize,

    /// Full session config as a JSON string.
    ///
    /// When provided, `--max-history` is ignored.
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Args)]
struct ReplayArgs {
    /// Native script to run.
    script: PathBuf,

    /// Image to load instead of the script's `load` path.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Where to save instead of the script's `save` path.
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Script language selection.
#[derive(Clone, Copy, ValueEnum)]
enum Dialect {
    /// lamina script, replayable with `lamina replay`.
    Native,
    /// Python with OpenCV.
    Opencv,
}

impl From<Dialect> for ScriptDialect {
    fn from(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Native => Self::Native,
            Dialect::Opencv => Self::OpenCv,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot save image to {}: {source}", path.display())]
    Save {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("invalid {what}: {source}")]
    Json {
        what: &'static str,
        source: serde_json::Error,
    },

    #[error("{}: {source}", path.display())]
    Script { path: PathBuf, source: ScriptError },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Ops(#[from] OpsError),
}

/// Parse a `--filter` argument: a catalog name, optionally followed by
/// `=value` for the filter's single parameter.
fn parse_filter(arg: &str) -> Result<FilterSpec, String> {
    let (name, value) = match arg.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (arg, None),
    };
    let kind: FilterKind = name.parse().map_err(|e: OpsError| e.to_string())?;
    let Some(value) = value else {
        return Ok(kind.default_spec());
    };

    Ok(match kind {
        FilterKind::Grayscale | FilterKind::Sepia => {
            return Err(format!("{kind} takes no value, got {value:?}"));
        }
        FilterKind::Blur => FilterSpec::Blur {
            kernel_size: parse_value(kind, value)?,
        },
        FilterKind::EdgeDetect => FilterSpec::EdgeDetect {
            threshold: parse_value(kind, value)?,
        },
        FilterKind::Brightness => FilterSpec::Brightness {
            delta: parse_value(kind, value)?,
        },
        FilterKind::Contrast => FilterSpec::Contrast {
            scale: parse_value(kind, value)?,
        },
    })
}

fn parse_value<T: FromStr>(kind: FilterKind, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("invalid value {value:?} for {kind}"))
}

fn session_config(args: &ApplyArgs) -> Result<SessionConfig, CliError> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|source| CliError::Json {
            what: "--config-json",
            source,
        });
    }
    Ok(SessionConfig {
        max_history: args.max_history,
    })
}

fn filter_specs(args: &ApplyArgs) -> Result<Vec<FilterSpec>, CliError> {
    match args.filters_json {
        Some(ref json) => serde_json::from_str(json).map_err(|source| CliError::Json {
            what: "--filters-json",
            source,
        }),
        None => Ok(args.filters.clone()),
    }
}

fn read(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_owned(),
        source,
    })
}

fn save(image: &Image, path: &Path) -> Result<(), CliError> {
    image.pixels().save(path).map_err(|source| CliError::Save {
        path: path.to_owned(),
        source,
    })?;
    tracing::info!(path = %path.display(), dimensions = %image.dimensions(), "saved image");
    Ok(())
}

fn apply(args: &ApplyArgs) -> Result<(), CliError> {
    let config = session_config(args)?;
    let specs = filter_specs(args)?;
    let bytes = read(&args.image)?;

    let source = args.image.to_string_lossy();
    let mut session = EditSession::new(config);
    let dimensions = session.load(&bytes, Some(&*source))?.dimensions();
    tracing::info!(path = %args.image.display(), %dimensions, "loaded image");

    for spec in &specs {
        session.select_filter(Some(*spec))?;
        let index = session.commit()?;
        tracing::info!(index, layer = %spec.validated().label(), "committed layer");
    }
    for &index in &args.hidden {
        session.set_layer_visibility(index, false)?;
        tracing::info!(index, "hid layer");
    }

    let composite = session.composite().ok_or(SessionError::NoImage)?;
    save(&composite, &args.out)?;

    if let Some(ref script_path) = args.script {
        let options = ExportOptions {
            dialect: args.dialect.into(),
            output_path: args.out.to_string_lossy().into_owned(),
        };
        let script = export(&session, &options);
        for advisory in &script.advisories {
            tracing::warn!("{advisory}");
        }
        std::fs::write(script_path, &script.text).map_err(|source| CliError::Write {
            path: script_path.clone(),
            source,
        })?;
        tracing::info!(path = %script_path.display(), "wrote script");
    }

    println!("{:016x}", composite.fingerprint());
    Ok(())
}

fn replay(args: &ReplayArgs) -> Result<(), CliError> {
    let text = read(&args.script)?;
    let text = String::from_utf8_lossy(&text);
    let recipe = Recipe::parse(&text).map_err(|source| CliError::Script {
        path: args.script.clone(),
        source,
    })?;

    let input = args
        .input
        .clone()
        .unwrap_or_else(|| PathBuf::from(&recipe.source));
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&recipe.output));

    let image = codec::decode(&read(&input)?)?;
    tracing::info!(path = %input.display(), steps = recipe.steps.len(), "replaying script");
    let result = recipe.run(&CpuOps, &image)?;
    save(&result, &output)?;

    println!("{:016x}", result.fingerprint());
    Ok(())
}

#[derive(Serialize)]
struct CatalogEntry {
    filter: FilterKind,
    label: &'static str,
    default: FilterSpec,
    params: &'static [ParamSchema],
}

fn filters() -> Result<(), CliError> {
    let catalog: Vec<CatalogEntry> = FilterKind::ALL
        .into_iter()
        .map(|kind| CatalogEntry {
            filter: kind,
            label: kind.label(),
            default: kind.default_spec(),
            params: describe(kind),
        })
        .collect();
    let json = serde_json::to_string_pretty(&catalog).map_err(|source| CliError::Json {
        what: "catalog",
        source,
    })?;
    println!("{json}");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Apply(ref args) => apply(args),
        Command::Replay(ref args) => replay(args),
        Command::Filters => filters(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
