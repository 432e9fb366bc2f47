//! `depscan analyzers` command handler

use std::io::Write;

use serde::Serialize;

use depscan_scanner::ScanMode;
use depscan_scanner::analyzer::registry::global_registry;

use crate::cli::AnalyzersArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `analyzers` command.
pub fn execute(args: AnalyzersArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let mode = match args.mode.as_deref() {
        Some(s) => ScanMode::parse(s).ok_or_else(|| {
            CliError::Config(format!(
                "invalid scan mode: {} (expected: all, pkg, language)",
                s
            ))
        })?,
        None => ScanMode::ALL,
    };

    writer.render(&build_report(mode))?;
    Ok(())
}

fn build_report(mode: ScanMode) -> AnalyzerListReport {
    let mut analyzers: Vec<AnalyzerEntry> = global_registry()
        .filter(mode, &[], &[])
        .iter()
        .map(|a| {
            let kind = a.analyzer_type();
            AnalyzerEntry {
                tag: kind.to_string(),
                mode: a.scan_mode().to_string(),
                purl_type: kind.purl_type().to_owned(),
                strict: a.strict_errors(),
            }
        })
        .collect();
    analyzers.sort_by(|a, b| a.tag.cmp(&b.tag));

    AnalyzerListReport {
        mode: mode.to_string(),
        total: analyzers.len(),
        analyzers,
    }
}

/// Analyzer list payload.
#[derive(Serialize)]
pub struct AnalyzerListReport {
    pub mode: String,
    pub total: usize,
    pub analyzers: Vec<AnalyzerEntry>,
}

#[derive(Serialize)]
pub struct AnalyzerEntry {
    pub tag: String,
    pub mode: String,
    pub purl_type: String,
    pub strict: bool,
}

impl Render for AnalyzerListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Analyzers for mode {} ({} total)",
            self.mode.bold(),
            self.total
        )?;
        writeln!(w)?;
        writeln!(w, "{:<20} {:<10} {:<10} Strict", "Tag", "Mode", "PURL")?;
        writeln!(w, "{}", "-".repeat(50))?;
        for a in &self.analyzers {
            let strict = if a.strict { "yes".yellow() } else { "no".normal() };
            writeln!(
                w,
                "{:<20} {:<10} {:<10} {}",
                a.tag, a.mode, a.purl_type, strict
            )?;
        }
        Ok(())
    }
}
