// CLI definitions using clap

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sidewinderd")]
#[command(author, version, about = "SideWinder X6 macro-key driver")]
pub struct Cli {
    /// User whose profile directory is used and whose identity macros run with
    #[arg(long, default_value = "root")]
    pub user: String,

    /// Override the profile root (default: <user home>/.sidewinderx6)
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
