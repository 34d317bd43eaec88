//! 수집 통계.

/// 한 수집 사이클의 피드별 결과 집계.
#[derive(Debug, Default, Clone)]
pub struct RefreshStats {
    /// 시도한 피드 수
    pub attempted: usize,
    /// 새 스냅샷을 저장한 피드 수
    pub stored: usize,
    /// 변경 없어 생략한 피드 수
    pub skipped: usize,
    /// 수집 또는 저장에 실패한 피드 수
    pub failed: usize,
}

impl RefreshStats {
    /// 요약 로그 출력.
    pub fn log_summary(&self, label: &str) {
        tracing::info!(
            attempted = self.attempted,
            stored = self.stored,
            skipped = self.skipped,
            failed = self.failed,
            "{} 완료",
            label
        );
    }
}
