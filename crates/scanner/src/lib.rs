#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`ScannerError`)
//! - [`config`]: Scanner configuration (`ScannerConfig`, builder)
//! - [`types`]: Analyzer tags, scan modes, SBOM formats (`AnalyzerType`, `ScanMode`, `SbomFormat`)
//! - [`package`]: Package data model (`Package`, `DependsOn`)
//! - [`graph`]: Arena dependency graph, linking and merging (`PackageGraph`)
//! - [`parser`]: Ecosystem manifest parsers (`ManifestParser`)
//! - [`analyzer`]: File matching, registry and concurrent analysis (`Analyzer`, `AnalyzerGroup`)
//! - [`source`]: Scan sources (filesystem, git history, image tar, docker daemon)
//! - [`sbom`]: SBOM document generation (`SbomGenerator`, CycloneDX, SPDX)
//! - [`scanner`]: Orchestrator (`Scanner`, `ScannerBuilder`)
//!
//! # Architecture
//!
//! ```text
//! source walker --> AnalyzerGroup::append --> matches() --> FileInfo
//!                                                             |
//!                          AnalyzerGroup::analyze (worker pool) --> ManifestParser
//!                                                             |
//!                                                        Vec<Package>
//!                                                             |
//!                               PackageGraph --> link_packages --> merge_packages
//!                                                             |
//!                                          ScanReport --> SbomGenerator --> SbomDocument
//! ```

pub mod analyzer;
pub mod config;
pub mod error;
pub mod graph;
pub mod package;
pub mod parser;
pub mod sbom;
pub mod scanner;
pub mod source;
pub mod types;

// --- Public API Re-exports ---

// Scanner (orchestrator)
pub use scanner::{Scanner, ScannerBuilder};

// Configuration
pub use config::{ScannerConfig, ScannerConfigBuilder};

// Error
pub use error::ScannerError;

// Types
pub use package::{DependsOn, Package};
pub use types::{AnalyzerType, SbomDocument, SbomFormat, ScanMode};

// Graph
pub use graph::{MergeSummary, PackageGraph, PackageId, can_merge, link_packages, merge_packages};

// Analyzers
pub use analyzer::{
    Analyzer, AnalyzerGroup, AnalyzerRegistry, CustomAnalyzer, CustomPackage, FileError,
    filter_analyzers, register_analyzer,
};

// Sources
pub use source::{
    ScanReport, SourceKind, scan_docker_container_from_context, scan_docker_image_from_context,
    scan_docker_image_from_file, scan_git_repo, scan_local_filesystem,
};

// SBOM Generator
pub use sbom::SbomGenerator;
