use anyhow::Result;
use clap::Parser;
use colored::*;
use std::path::PathBuf;

use rusty_jewels::config::AppConfig;

/// Validate the catalog and report which jewelry images and models are on disk.
#[derive(Parser, Debug)]
#[command(about)]
struct CheckArgs {
    #[arg(long, default_value = AppConfig::DEFAULT_PATH)]
    config: PathBuf,

    #[arg(long)]
    assets: Option<PathBuf>,

    /// Also decode every image found
    #[arg(long)]
    decode: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = CheckArgs::parse();

    let mut config = AppConfig::load(&args.config)?;
    if let Some(dir) = args.assets {
        config.assets_dir = dir;
    }
    let catalog = config.build_catalog()?;
    println!("Assets: {}", config.assets_dir.display().to_string().bold());

    let mut missing = 0;
    for (_, category) in catalog.iter() {
        println!("\n{} ({:?}, {} items)", category.name.bold(), category.slot, category.count);
        for i in 0..category.count {
            let path = category.item_path(&config.assets_dir, i);
            if !path.exists() {
                missing += 1;
                println!("  {} {}", "MISSING".red(), path.display());
                continue;
            }
            if args.decode {
                match image::open(&path) {
                    Ok(img) => println!("  {} {} ({}x{})", "OK".green(), path.display(), img.width(), img.height()),
                    Err(e) => {
                        missing += 1;
                        println!("  {} {}: {}", "BROKEN".red(), path.display(), e);
                    }
                }
            } else {
                println!("  {} {}", "OK".green(), path.display());
            }
        }
    }

    println!("\n{}", "--- Models ---".bold());
    for path in [&config.models.face_detection, &config.models.face_mesh, &config.models.hand_landmark] {
        let status = if path.exists() { "OK".green() } else { "MISSING".yellow() };
        println!("  {} {}", status, path.display());
    }

    if missing > 0 {
        anyhow::bail!("{} jewelry images missing or unreadable", missing);
    }
    println!("\n{}", "All jewelry images present.".green());
    Ok(())
}
