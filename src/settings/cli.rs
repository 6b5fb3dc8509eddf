use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "streakboard", about = "Group and invite-code backend for habit streaks")]
pub struct Cli {
    /// Settings file, defaults to settings/dev.toml (debug) or settings/release.toml.
    #[arg(long)]
    pub settings: Option<String>,
}
