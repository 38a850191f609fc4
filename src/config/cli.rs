use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    Integrations,
    Archives,
    All,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "lake-relay")]
#[command(about = "Moves tabular data between configured data lakes and audits each transfer")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "integration.toml")]
    pub config: String,

    /// What to run from the configuration
    #[arg(long, value_enum, default_value = "integrations")]
    pub mode: RunMode,

    /// Keep going after a failed transfer instead of aborting the run
    #[arg(long)]
    pub continue_on_error: bool,

    /// Show resolved lakes and transfer plans without touching any store
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["lake-relay"]);
        assert_eq!(args.config, "integration.toml");
        assert_eq!(args.mode, RunMode::Integrations);
        assert!(!args.continue_on_error);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_archive_mode() {
        let args = CliArgs::parse_from(["lake-relay", "-c", "run.toml", "--mode", "archives", "--continue-on-error"]);
        assert_eq!(args.config, "run.toml");
        assert_eq!(args.mode, RunMode::Archives);
        assert!(args.continue_on_error);
    }
}
