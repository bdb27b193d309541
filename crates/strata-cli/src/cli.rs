use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Strata: inspect indexed object database files",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the header and object table of a database file
    Header(HeaderArgs),
    /// List a database manifest and check every file's stored id
    Manifest(ManifestArgs),
    /// Print the file id stored in a database file
    FileId(FileIdArgs),
}

#[derive(Args)]
pub struct HeaderArgs {
    /// Database file to read
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ManifestArgs {
    /// Database root directory
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// TOML configuration overriding the defaults (its root is replaced by DIR)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct FileIdArgs {
    /// Database file to read
    pub file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["strata", "--format", "json", "file-id", "a.sdb"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Command::FileId(ref args) if args.file == PathBuf::from("a.sdb")));

        let cli = Cli::try_parse_from(["strata", "manifest"]).unwrap();
        assert!(matches!(cli.command, Command::Manifest(ref args) if args.dir == PathBuf::from(".")));
    }
}
