use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use monster_forge_lib::forge::ForgeState;
use monster_forge_lib::lightbox::CloseTrigger;
use monster_forge_lib::settings::{load_settings_from_dir, save_settings_to_dir};
use monster_forge_lib::utils::ensure_data_dir;
use monster_forge_lib::{startup, MonsterForm};

#[derive(Debug, Parser)]
#[command(
    name = "monster-forge",
    version,
    about = "Build a creature prompt and render it with Leonardo.ai"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a monster from a base type and features
    Generate {
        #[arg(long = "base", default_value = "dragon")]
        base_type: String,
        /// Repeat for each feature, e.g. --feature "glowing eyes"
        #[arg(long = "feature")]
        features: Vec<String>,
        /// Save the image once it is ready
        #[arg(long)]
        download: bool,
    },
    /// List past generations, newest first
    History,
    /// Open the lightbox on one history entry
    Show { index: usize },
    /// Save one history entry's image
    Download {
        index: usize,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Show or change settings
    Settings(SettingsArgs),
    /// Launch the desktop window
    #[cfg(feature = "desktop")]
    Desktop,
}

#[derive(Debug, Args)]
struct SettingsArgs {
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    model_id: Option<String>,
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    #[arg(long)]
    poll_max_attempts: Option<u32>,
    #[arg(long)]
    download_dir: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "desktop")]
    if matches!(cli.command, Command::Desktop) {
        monster_forge_lib::desktop::run();
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new().context("start tokio runtime")?;
    rt.block_on(run(cli.command))
}

fn print_preview(state: &ForgeState) {
    println!("{}", state.status);
    if state.preview.visible {
        if let Some(src) = &state.preview.src {
            println!("image: {src}");
        }
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Generate {
            base_type,
            features,
            download,
        } => generate(MonsterForm::new(base_type, features), download).await,
        Command::History => {
            let app = startup().await?;
            println!("{}", app.forge.snapshot().gallery);
            Ok(())
        }
        Command::Show { index } => {
            let app = startup().await?;
            let Some(lightbox) = app.forge.open_thumbnail(index) else {
                bail!("no history entry {index}");
            };
            println!("{}", lightbox.caption());
            if let Some(src) = lightbox.image_src() {
                println!("{src}");
            }
            app.forge.close_lightbox(CloseTrigger::Button);
            Ok(())
        }
        Command::Download { index, dir } => {
            let app = startup().await?;
            let dir = dir.unwrap_or_else(|| app.download_dir());
            match app.forge.download_entry(index, &dir).await {
                Ok(path) => {
                    println!("saved {}", path.display());
                    Ok(())
                }
                Err(e) => {
                    eprintln!("{}", e.status_message());
                    bail!(e)
                }
            }
        }
        Command::Settings(args) => settings(args),
        #[cfg(feature = "desktop")]
        Command::Desktop => bail!("the desktop window must be started outside the CLI runtime"),
    }
}

async fn generate(form: MonsterForm, download: bool) -> Result<()> {
    let app = startup().await?;
    let submission = match app.forge.submit(&form).await {
        Ok(submission) => submission,
        Err(e) => {
            println!("{}", e.status_message());
            bail!(e);
        }
    };

    print_preview(&app.forge.snapshot());
    if submission.preview.is_err() {
        println!("image url: {}", submission.job.image_url);
    }
    if download {
        match app.forge.download(&app.download_dir()).await {
            Ok(path) => println!("saved {}", path.display()),
            Err(e) => eprintln!("{}", e.status_message()),
        }
    }
    println!();
    println!("{}", app.forge.snapshot().gallery);
    Ok(())
}

fn replace<T>(slot: &mut Option<T>, value: Option<T>) -> bool {
    match value {
        Some(v) => {
            *slot = Some(v);
            true
        }
        None => false,
    }
}

fn settings(args: SettingsArgs) -> Result<()> {
    let data_dir = ensure_data_dir()?;
    let mut s = load_settings_from_dir(&data_dir);
    let changed = [
        replace(&mut s.leonardo_api_key, args.api_key),
        replace(&mut s.leonardo_base_url, args.base_url),
        replace(&mut s.model_id, args.model_id),
        replace(&mut s.poll_interval_ms, args.poll_interval_ms),
        replace(&mut s.poll_max_attempts, args.poll_max_attempts),
        replace(&mut s.download_dir, args.download_dir),
    ]
    .contains(&true);

    if changed {
        save_settings_to_dir(&data_dir, &s)?;
    }

    let mut shown = s.clone();
    if shown.leonardo_api_key.is_some() {
        shown.leonardo_api_key = Some("********".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}
