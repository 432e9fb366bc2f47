//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// depscan -- software composition analysis for directories, git history and container images.
///
/// Use `depscan <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "depscan", version, about, long_about = None)]
pub struct Cli {
    /// Path to the depscan.toml configuration file.
    #[arg(short, long, global = true, default_value = "depscan.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a target and report discovered packages.
    Scan(ScanArgs),

    /// List the analyzers available for a scan mode.
    Analyzers(AnalyzersArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- scan ----

/// Scan a directory, git repository, image archive, image or container.
#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(subcommand)]
    pub target: ScanTarget,
}

#[derive(Subcommand, Debug)]
pub enum ScanTarget {
    /// Scan a local directory tree.
    Fs {
        /// Directory to scan.
        #[arg(default_value = ".")]
        path: PathBuf,
        #[command(flatten)]
        options: ScanOptions,
    },
    /// Scan every blob reachable from any commit of a git repository.
    Git {
        /// Repository path.
        #[arg(default_value = ".")]
        path: PathBuf,
        #[command(flatten)]
        options: ScanOptions,
    },
    /// Scan an image tarball produced by `docker save`.
    ImageFile {
        /// Path to the tar archive.
        archive: PathBuf,
        #[command(flatten)]
        options: ScanOptions,
    },
    /// Scan an image through the docker daemon.
    Image {
        /// Image name or ID.
        image: String,
        #[command(flatten)]
        options: ScanOptions,
    },
    /// Scan a container filesystem through the docker daemon.
    Container {
        /// Container name or ID.
        container: String,
        #[command(flatten)]
        options: ScanOptions,
    },
}

impl ScanTarget {
    pub fn options(&self) -> &ScanOptions {
        match self {
            Self::Fs { options, .. }
            | Self::Git { options, .. }
            | Self::ImageFile { options, .. }
            | Self::Image { options, .. }
            | Self::Container { options, .. } => options,
        }
    }
}

/// Flags shared by every scan target. Unset flags fall back to the `[scan]` config section.
#[derive(Args, Debug, Default, Clone)]
pub struct ScanOptions {
    /// Number of analysis workers.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Scan mode (all, pkg, language; combine with `|`).
    #[arg(long)]
    pub mode: Option<String>,

    /// Analyzer tag to use in addition to the mode (repeatable).
    #[arg(long = "analyzer")]
    pub analyzers: Vec<String>,

    /// Analyzer tag to disable (repeatable).
    #[arg(long = "disable")]
    pub disabled: Vec<String>,

    /// Docker daemon endpoint (unix socket path or tcp:// URL).
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Abort the scan when a strict analyzer fails to parse a file.
    #[arg(long)]
    pub strict: bool,

    /// Write an SBOM document to this file.
    #[arg(long)]
    pub sbom: Option<PathBuf>,

    /// SBOM format (cyclonedx, spdx).
    #[arg(long)]
    pub sbom_format: Option<String>,
}

// ---- analyzers ----

/// List registered analyzers.
#[derive(Args, Debug)]
pub struct AnalyzersArgs {
    /// Only list analyzers selected by this scan mode.
    #[arg(long)]
    pub mode: Option<String>,
}

// ---- config ----

/// Manage depscan configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, scan).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse succeeded")
    }

    #[test]
    fn test_cli_parse_scan_fs_defaults() {
        let cli = parse(&["depscan", "scan", "fs"]);
        match cli.command {
            Commands::Scan(ScanArgs {
                target: ScanTarget::Fs { path, options },
            }) => {
                assert_eq!(path, PathBuf::from("."));
                assert!(options.workers.is_none());
                assert!(options.analyzers.is_empty());
                assert!(!options.strict);
                assert!(options.sbom.is_none());
            }
            _ => panic!("expected scan fs"),
        }
    }

    #[test]
    fn test_cli_parse_scan_flags() {
        let cli = parse(&[
            "depscan",
            "scan",
            "fs",
            "/srv/app",
            "--workers",
            "8",
            "--mode",
            "pkg|language",
            "--analyzer",
            "go-mod",
            "--analyzer",
            "node-npm",
            "--disable",
            "java-jar",
            "--strict",
            "--sbom",
            "out.json",
            "--sbom-format",
            "spdx",
        ]);
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan command");
        };
        let options = args.target.options();
        assert_eq!(options.workers, Some(8));
        assert_eq!(options.mode.as_deref(), Some("pkg|language"));
        assert_eq!(options.analyzers, vec!["go-mod", "node-npm"]);
        assert_eq!(options.disabled, vec!["java-jar"]);
        assert!(options.strict);
        assert_eq!(options.sbom, Some(PathBuf::from("out.json")));
        assert_eq!(options.sbom_format.as_deref(), Some("spdx"));
    }

    #[test]
    fn test_cli_parse_scan_targets() {
        let cli = parse(&["depscan", "scan", "image-file", "alpine.tar"]);
        assert!(matches!(
            cli.command,
            Commands::Scan(ScanArgs {
                target: ScanTarget::ImageFile { .. }
            })
        ));

        let cli = parse(&["depscan", "scan", "image", "debian:12", "--endpoint", "/run/docker.sock"]);
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan command");
        };
        assert_eq!(args.target.options().endpoint.as_deref(), Some("/run/docker.sock"));

        let cli = parse(&["depscan", "scan", "container", "web-1"]);
        assert!(matches!(
            cli.command,
            Commands::Scan(ScanArgs {
                target: ScanTarget::Container { .. }
            })
        ));

        let cli = parse(&["depscan", "scan", "git"]);
        assert!(matches!(
            cli.command,
            Commands::Scan(ScanArgs {
                target: ScanTarget::Git { .. }
            })
        ));
    }

    #[test]
    fn test_cli_parse_image_file_requires_archive() {
        assert!(Cli::try_parse_from(["depscan", "scan", "image-file"]).is_err());
    }

    #[test]
    fn test_cli_parse_analyzers() {
        let cli = parse(&["depscan", "analyzers", "--mode", "pkg"]);
        match cli.command {
            Commands::Analyzers(args) => assert_eq!(args.mode.as_deref(), Some("pkg")),
            _ => panic!("expected analyzers command"),
        }
    }

    #[test]
    fn test_cli_parse_config_actions() {
        let cli = parse(&["depscan", "config", "validate"]);
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigArgs {
                action: ConfigAction::Validate
            })
        ));

        let cli = parse(&["depscan", "config", "show", "--section", "scan"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("scan")),
            _ => panic!("expected config show"),
        }
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = parse(&[
            "depscan",
            "scan",
            "fs",
            "--config",
            "/etc/depscan.toml",
            "--log-level",
            "debug",
            "--output",
            "json",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/depscan.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.output, OutputFormat::Json));
    }

    #[test]
    fn test_cli_parse_missing_command_fails() {
        assert!(Cli::try_parse_from(["depscan"]).is_err());
        assert!(Cli::try_parse_from(["depscan", "start"]).is_err());
    }

    #[test]
    fn test_cli_verify_command_structure() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_name(), "depscan");
        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        assert_eq!(subcommands, vec!["scan", "analyzers", "config"]);
        cmd.debug_assert();
    }
}
