//! Command-line definition.

use clap::{Args, Parser, Subcommand, ValueEnum};
use indexscope_core::IndexingDepth;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "indexscope")]
#[command(about = "Manage Windows Search indexing scope rules and extension depth")]
#[command(version)]
pub struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Append registration audit records to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub audit_log: Option<PathBuf>,

    #[command(flatten)]
    pub repair: RepairFlags,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags that control how a missing registration is repaired.
///
/// They are declared here for help output and validation; the core parses
/// them again from the raw argument list.
#[derive(Args, Debug, Default)]
pub struct RepairFlags {
    /// Repair a missing registration without asking
    #[arg(long, global = true, conflicts_with = "no_register")]
    pub auto_register: bool,

    /// Never repair a missing registration
    #[arg(long, global = true)]
    pub no_register: bool,

    /// Run the repair tool without dialogs
    #[arg(long, global = true)]
    pub silent: bool,

    /// Seconds to wait for the repair tool (1-60)
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u32>,

    /// Register this binary instead of the one on record
    #[arg(long, global = true, value_name = "PATH")]
    pub binary_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show whether the search manager access point is usable
    Status,

    /// Repair the search manager registration
    Register,

    /// Manage crawl scope rules
    #[command(subcommand)]
    Rules(RulesCommand),

    /// Manage per-extension indexing depth
    #[command(subcommand)]
    Extensions(ExtensionsCommand),

    /// Export, import and validate configuration documents
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List scope rules
    List {
        /// Include rules shipped with the system
        #[arg(long)]
        include_system: bool,
    },

    /// Add a scope rule
    Add(RuleArgs),

    /// Remove the scope rule for a path
    Remove { path: String },

    /// Replace the scope rule for a path
    Modify(RuleArgs),
}

#[derive(Args, Debug)]
pub struct RuleArgs {
    pub path: String,

    /// Whether the path is included in or excluded from the index
    #[arg(long, value_enum, default_value_t = RuleKind::Include)]
    pub kind: RuleKind,

    /// Apply only to the folder itself, not its children
    #[arg(long)]
    pub no_recursive: bool,

    /// File pattern to include (repeatable), e.g. `*.docx`
    #[arg(long = "include-pattern", value_name = "PATTERN")]
    pub include_patterns: Vec<String>,

    /// File pattern to exclude (repeatable), e.g. `~*`
    #[arg(long = "exclude-pattern", value_name = "PATTERN")]
    pub exclude_patterns: Vec<String>,

    /// Subfolder to exclude (repeatable)
    #[arg(long = "exclude-subfolder", value_name = "NAME")]
    pub excluded_subfolders: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuleKind {
    Include,
    Exclude,
}

#[derive(Subcommand, Debug)]
pub enum ExtensionsCommand {
    /// List every extension setting
    List,

    /// Find extensions matching a `*`/`?` pattern
    Search { pattern: String },

    /// Show the setting for one extension
    Get { extension: String },

    /// Set the indexing depth for an extension
    Set {
        extension: String,
        #[arg(value_parser = parse_depth)]
        depth: IndexingDepth,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write the current configuration to a file
    Export {
        path: PathBuf,

        /// Include rules shipped with the system
        #[arg(long)]
        include_defaults: bool,

        /// Leave extension settings out of the document
        #[arg(long)]
        no_extensions: bool,
    },

    /// Apply a configuration document
    Import {
        path: PathBuf,

        /// Remove existing user rules first instead of merging
        #[arg(long)]
        replace: bool,

        /// Stop at the first failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// Check a configuration document without applying it
    Validate { path: PathBuf },
}

fn parse_depth(raw: &str) -> Result<IndexingDepth, String> {
    IndexingDepth::parse(raw).ok_or_else(|| {
        format!(
            "unknown depth {:?} (expected notIndexed, propertiesOnly or propertiesAndContents)",
            raw
        )
    })
}

impl Command {
    /// Commands that talk to the indexing subsystem need a usable access point.
    pub fn needs_access_point(&self) -> bool {
        !matches!(
            self,
            Command::Status | Command::Register | Command::Config(ConfigCommand::Validate { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_rule_add() {
        let cli = Cli::try_parse_from([
            "indexscope",
            "rules",
            "add",
            r"D:\Work",
            "--kind",
            "exclude",
            "--include-pattern",
            "*.md",
            "--exclude-subfolder",
            "target",
            "--json",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Command::Rules(RulesCommand::Add(args)) => {
                assert_eq!(args.kind, RuleKind::Exclude);
                assert_eq!(args.include_patterns, vec!["*.md"]);
                assert_eq!(args.excluded_subfolders, vec!["target"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_repair_flags_conflict() {
        let result = Cli::try_parse_from(["indexscope", "status", "--auto-register", "--no-register"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_depth_argument() {
        let cli = Cli::try_parse_from(["indexscope", "extensions", "set", "txt", "properties-only"]).unwrap();
        match cli.command {
            Command::Extensions(ExtensionsCommand::Set { extension, depth }) => {
                assert_eq!(extension, "txt");
                assert_eq!(depth, IndexingDepth::PropertiesOnly);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["indexscope", "extensions", "set", "txt", "deep"]).is_err());
    }

    #[test]
    fn test_validate_skips_registration_check() {
        let cli = Cli::try_parse_from(["indexscope", "config", "validate", "x.json"]).unwrap();
        assert!(!cli.command.needs_access_point());
        let cli = Cli::try_parse_from(["indexscope", "rules", "list"]).unwrap();
        assert!(cli.command.needs_access_point());
    }
}
