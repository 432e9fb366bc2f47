//! OS 패키지 관리자 분석기 (apk, dpkg, rpm)

use crate::parser::apk::ApkDbParser;
use crate::parser::dpkg::DpkgStatusParser;
use crate::parser::rpm::RpmManifestParser;
use crate::types::AnalyzerType;

use super::{ParserAnalyzer, file_name};

const APK_DB: &str = "lib/apk/db/installed";
const DPKG_STATUS: &str = "var/lib/dpkg/status";
const DPKG_STATUS_DIR: &str = "var/lib/dpkg/status.d/";
const RPM_MANIFEST: &str = "var/lib/rpmmanifest/container-manifest-2";

/// Alpine 설치 DB 분석기
pub fn apk_analyzer() -> ParserAnalyzer<ApkDbParser> {
    ParserAnalyzer::new(AnalyzerType::Apk, is_apk_db, ApkDbParser)
}

/// Debian status 분석기
///
/// distroless 이미지의 `status.d/` 개별 파일도 읽습니다.
pub fn dpkg_analyzer() -> ParserAnalyzer<DpkgStatusParser> {
    ParserAnalyzer::new(AnalyzerType::Dpkg, is_dpkg_status, DpkgStatusParser)
}

/// RPM 컨테이너 매니페스트 분석기
pub fn rpm_analyzer() -> ParserAnalyzer<RpmManifestParser> {
    ParserAnalyzer::new(AnalyzerType::Rpm, is_rpm_manifest, RpmManifestParser)
}

fn is_apk_db(path: &str) -> bool {
    path.ends_with(APK_DB)
}

fn is_dpkg_status(path: &str) -> bool {
    if path.ends_with(DPKG_STATUS) {
        return true;
    }
    path.contains(DPKG_STATUS_DIR) && !file_name(path).ends_with(".md5sums")
}

fn is_rpm_manifest(path: &str) -> bool {
    path.ends_with(RPM_MANIFEST)
}
