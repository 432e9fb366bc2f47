//! 메트릭 상수 및 설명 등록
//!
//! 스캐너가 기록하는 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! 레코더가 설치되지 않은 경우 모든 기록은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `depscan_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(depscan_core::metrics::FILES_MATCHED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 분석기 태그 레이블 키 (dpkg, go-mod, node-npm, ...)
pub const LABEL_ANALYZER: &str = "analyzer";

/// 스캔 소스 레이블 키 (filesystem, git, image, container)
pub const LABEL_SOURCE: &str = "source";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── 스캐너 메트릭 ──────────────────────────────────────────────────

/// 분석기에 매칭된 파일 수 (counter, label: analyzer)
pub const FILES_MATCHED_TOTAL: &str = "depscan_files_matched_total";

/// 분석 실패 수 (counter, label: analyzer)
pub const ANALYZE_ERRORS_TOTAL: &str = "depscan_analyze_errors_total";

/// 발견된 패키지 수 (counter, label: source)
pub const PACKAGES_DISCOVERED_TOTAL: &str = "depscan_packages_discovered_total";

/// 완료된 스캔 수 (counter, labels: source, result)
pub const SCANS_COMPLETED_TOTAL: &str = "depscan_scans_completed_total";

/// 스캔 소요 시간 (histogram, 초, label: source)
pub const SCAN_DURATION_SECONDS: &str = "depscan_scan_duration_seconds";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 스캔 소요 시간 히스토그램 버킷 (초)
///
/// 100ms ~ 300s 범위 (이미지 스캔은 레이어 압축 해제 포함)
pub const SCAN_DURATION_BUCKETS: [f64; 9] = [0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        FILES_MATCHED_TOTAL,
        "Total number of candidate files matched by an analyzer"
    );
    describe_counter!(
        ANALYZE_ERRORS_TOTAL,
        "Total number of matched files whose analysis failed"
    );
    describe_counter!(
        PACKAGES_DISCOVERED_TOTAL,
        "Total number of packages in merged scan results"
    );
    describe_counter!(SCANS_COMPLETED_TOTAL, "Total number of scans completed");
    describe_histogram!(
        SCAN_DURATION_SECONDS,
        "Time to complete a single scan in seconds"
    );
}
