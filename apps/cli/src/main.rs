//! rccli: command-line access to Rosetta Code tasks.
//!
//! Lists the languages and code of a task or category, exports them as JSON,
//! or writes every code sample to its own file.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn target_is_required_and_exclusive() {
        assert!(Cli::try_parse_from(["rccli", "list"]).is_err());
        assert!(
            Cli::try_parse_from(["rccli", "list", "--task", "A", "--category", "B"]).is_err()
        );
        assert!(Cli::try_parse_from(["rccli", "list", "--task", "100_doors", "--count"]).is_ok());
    }

    #[test]
    fn dump_layout_parses() {
        let cli = Cli::try_parse_from([
            "rccli", "dump", "--category", "Puzzles", "--dir", "code", "--layout", "riscos",
        ])
        .unwrap();
        match cli.command {
            commands::Command::Dump { layout, .. } => {
                assert_eq!(layout, rosetta_core::Layout::RiscOs)
            }
            _ => panic!("expected dump"),
        }
        assert!(
            Cli::try_parse_from(["rccli", "dump", "--task", "A", "--dir", "d", "--layout", "dos"])
                .is_err()
        );
    }

    #[test]
    fn cache_clear_names_at_most_one_page() {
        assert!(Cli::try_parse_from(["rccli", "cache", "clear"]).is_ok());
        assert!(Cli::try_parse_from(["rccli", "cache", "clear", "--task", "100_doors"]).is_ok());
        assert!(
            Cli::try_parse_from(["rccli", "cache", "clear", "--task", "A", "--category", "B"])
                .is_err()
        );
    }

    #[test]
    fn offline_conflicts_with_no_cache() {
        assert!(
            Cli::try_parse_from(["rccli", "--offline", "--no-cache", "cache", "stats"]).is_err()
        );
    }
}
