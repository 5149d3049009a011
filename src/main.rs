//! annocfg - command-line front end
//!
//! Imports Anno 1800 `.cfg` families into a scene, exports them back and
//! drives the external asset converters.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use annocfg::commands;
use annocfg::config::AppConfig;
use annocfg_core::ConversionKind;

#[derive(Parser, Debug)]
#[command(name = "annocfg")]
#[command(about = "Map Anno 1800 object configs to a scene graph and back")]
struct Cli {
    /// Folder holding default.toml and user.toml
    #[arg(long, env = "ANNOCFG_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a .cfg with its companions and export it unchanged
    Roundtrip {
        cfg: PathBuf,
        /// Write the exported documents here instead of only comparing
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the scene tree of a .cfg family
    Inspect { cfg: PathBuf },
    /// Turn a compact feedback .xml into a .cf7
    Transcode {
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        /// FeedbackLoops value of every generated config
        #[arg(long)]
        loop_mode: Option<i64>,
    },
    /// Run one asset converter, e.g. `rdm-glb` or `png-dds`
    Convert { kind: ConversionKind, input: PathBuf },
    /// Canonical path ↔ file under the configured roots
    Resolve { path: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config_dir)
        .with_context(|| format!("Failed to load config from {}", cli.config_dir.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level)).init();
    log::debug!("Loaded config from {}", cli.config_dir.display());

    match cli.command {
        Command::Roundtrip { cfg, out } => {
            let summary = commands::roundtrip(&config, &cfg, out.as_deref())?;
            for warning in &summary.warnings {
                log::warn!("{}", warning);
            }
            for path in &summary.written {
                println!("wrote {}", path.display());
            }
            if summary.changed.is_empty() {
                println!("{} document(s) identical", summary.documents);
            } else {
                for path in &summary.changed {
                    println!("differs: {}", path.display());
                }
            }
        }
        Command::Inspect { cfg } => {
            print!("{}", commands::inspect(&config, &cfg)?);
        }
        Command::Transcode { input, out, loop_mode } => {
            let loop_mode = loop_mode.unwrap_or(config.export.feedback_loop_mode);
            let (written, warnings) = commands::transcode_file(&input, out.as_deref(), loop_mode, &config.guid_names())?;
            for warning in &warnings {
                log::warn!("{}", warning);
            }
            println!("wrote {}", written.display());
        }
        Command::Convert { kind, input } => {
            let output = commands::convert(&config, kind, &input)?;
            println!("{}", output.display());
        }
        Command::Resolve { path } => {
            println!("{}", commands::resolve(&config, &path)?);
        }
    }

    Ok(())
}
