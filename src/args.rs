use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera Index (default 0)
    #[arg(short, long, default_value_t = 0)]
    pub cam_index: u32,

    /// Configuration file (created with defaults if missing)
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Override the jewelry asset directory from the config
    #[arg(long)]
    pub assets: Option<PathBuf>,

    /// Category to activate at startup (e.g. gold_earrings)
    #[arg(long)]
    pub category: Option<String>,

    /// Show the camera unmirrored
    #[arg(long, default_value_t = false)]
    pub no_mirror: bool,

    /// List available cameras
    #[arg(long)]
    pub list: bool,
}
