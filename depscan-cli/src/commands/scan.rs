//! `depscan scan` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use depscan_core::config::{DepscanConfig, ScanConfig};
use depscan_scanner::{ScanReport, ScannerBuilder, ScannerConfig};

use crate::cli::{ScanArgs, ScanOptions, ScanTarget};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `scan` command.
pub async fn execute(
    args: ScanArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = DepscanConfig::load_or_default(config_path).await?;
    let options = args.target.options().clone();

    let mut scan_config = config.scan;
    apply_overrides(&mut scan_config, &options);
    scan_config.validate()?;
    let scanner_config = ScannerConfig::from_core(&scan_config)?;

    let cancel = CancellationToken::new();
    let scanner = ScannerBuilder::new()
        .config(scanner_config)
        .cancel_token(cancel.clone())
        .build()?;

    let signal_token = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling scan");
            signal_token.cancel();
        }
    });

    let result = match &args.target {
        ScanTarget::Fs { path, .. } => scanner.scan_filesystem(path).await,
        ScanTarget::Git { path, .. } => scanner.scan_git(path).await,
        ScanTarget::ImageFile { archive, .. } => scanner.scan_image_file(archive).await,
        ScanTarget::Image { image, .. } => scanner.scan_image(image).await,
        ScanTarget::Container { container, .. } => scanner.scan_container(container).await,
    };
    signal.abort();
    let report = result?;

    let sbom = match &options.sbom {
        Some(path) => {
            let document = scanner.generate_sbom(&report)?;
            tokio::fs::write(path, &document.content).await?;
            info!(
                path = %path.display(),
                format = %document.format,
                components = document.component_count,
                "sbom written"
            );
            Some(SbomSummary {
                path: path.display().to_string(),
                format: document.format.to_string(),
                components: document.component_count,
            })
        }
        None => None,
    };

    writer.render(&ScanOutput::from_report(&report, sbom))?;
    Ok(())
}

/// Apply command-line flags on top of the `[scan]` section.
///
/// Repeated `--analyzer`/`--disable` flags replace the configured lists.
fn apply_overrides(scan: &mut ScanConfig, options: &ScanOptions) {
    if let Some(workers) = options.workers {
        scan.num_workers = workers;
    }
    if let Some(ref mode) = options.mode {
        scan.scan_mode = mode.clone();
    }
    if !options.analyzers.is_empty() {
        scan.used_analyzers = options.analyzers.clone();
    }
    if !options.disabled.is_empty() {
        scan.disable_languages = options.disabled.clone();
    }
    if let Some(ref endpoint) = options.endpoint {
        scan.endpoint = endpoint.clone();
    }
    if options.strict {
        scan.strict = true;
    }
    if let Some(ref format) = options.sbom_format {
        scan.sbom_format = format.clone();
    }
}

/// Scan result payload.
#[derive(Serialize)]
pub struct ScanOutput {
    pub source: String,
    pub target: String,
    pub package_count: usize,
    pub links: usize,
    pub merged: usize,
    pub split: usize,
    pub packages: Vec<PackageEntry>,
    pub errors: Vec<ErrorEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sbom: Option<SbomSummary>,
}

#[derive(Serialize)]
pub struct PackageEntry {
    pub name: String,
    pub version: String,
    pub purl: String,
    pub indirect: bool,
    pub potential: bool,
    pub files: Vec<String>,
    pub analyzers: Vec<String>,
    pub depends_on: Vec<String>,
}

#[derive(Serialize)]
pub struct ErrorEntry {
    pub path: String,
    pub analyzer: String,
    pub error: String,
}

#[derive(Serialize)]
pub struct SbomSummary {
    pub path: String,
    pub format: String,
    pub components: usize,
}

impl ScanOutput {
    fn from_report(report: &ScanReport, sbom: Option<SbomSummary>) -> Self {
        let graph = &report.graph;
        let mut packages: Vec<PackageEntry> = graph
            .iter()
            .map(|(id, pkg)| {
                let mut depends_on: Vec<String> = graph
                    .upstream(id)
                    .filter_map(|dep| graph.get(dep))
                    .map(|dep| format!("{}@{}", dep.name, dep.version))
                    .collect();
                depends_on.sort();
                PackageEntry {
                    name: pkg.name.clone(),
                    version: pkg.version.clone(),
                    purl: pkg.purl(),
                    indirect: pkg.indirect,
                    potential: pkg.potential,
                    files: pkg.from_file.clone(),
                    analyzers: pkg.from_analyzer.iter().map(|a| a.to_string()).collect(),
                    depends_on,
                }
            })
            .collect();
        packages.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));

        Self {
            source: report.source.to_string(),
            target: report.target.clone(),
            package_count: report.package_count(),
            links: report.links,
            merged: report.merge.merged,
            split: report.merge.split,
            packages,
            errors: report
                .errors
                .iter()
                .map(|e| ErrorEntry {
                    path: e.path.clone(),
                    analyzer: e.analyzer.to_string(),
                    error: e.error.clone(),
                })
                .collect(),
            sbom,
        }
    }
}

impl Render for ScanOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Scan: {} ({})", self.target.bold(), self.source)?;
        writeln!(
            w,
            "Packages: {}  Links: {}  Merged: {}  Split: {}",
            self.package_count.to_string().bold(),
            self.links,
            self.merged,
            self.split
        )?;
        writeln!(w)?;

        if self.packages.is_empty() {
            writeln!(w, "{}", "No packages found.".yellow())?;
        } else {
            writeln!(
                w,
                "{:<40} {:<24} {:<18} Deps",
                "Name", "Version", "Analyzer"
            )?;
            writeln!(w, "{}", "-".repeat(90))?;
            for p in &self.packages {
                let name = if p.potential {
                    p.name.dimmed()
                } else if p.indirect {
                    p.name.normal()
                } else {
                    p.name.bold()
                };
                writeln!(
                    w,
                    "{:<40} {:<24} {:<18} {}",
                    name,
                    p.version,
                    p.analyzers.join(","),
                    p.depends_on.len()
                )?;
            }
        }

        if !self.errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", format!("{} file(s) failed:", self.errors.len()).red())?;
            for e in &self.errors {
                writeln!(w, "  {} [{}]: {}", e.path, e.analyzer, e.error.red())?;
            }
        }

        if let Some(ref sbom) = self.sbom {
            writeln!(w)?;
            writeln!(
                w,
                "SBOM: {} ({}, {} components)",
                sbom.path.green(),
                sbom.format,
                sbom.components
            )?;
        }

        Ok(())
    }
}
