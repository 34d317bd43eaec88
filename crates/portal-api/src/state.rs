//! 애플리케이션 공유 상태.

use std::sync::Arc;

use portal_provider::{BrokerageChartClient, FeedClient};
use portal_store::{FetchGate, MemorySnapshotRepository, SnapshotRepository};

/// 서버 공유 상태.
///
/// 저장소와 수집 클라이언트는 트레이트/Option 뒤에 숨겨 DB나
/// 증권사 자격증명 없이도 기동할 수 있게 합니다.
pub struct AppState {
    /// 스냅샷 저장소
    pub repository: Arc<dyn SnapshotRepository>,
    /// 피드 수집 클라이언트 (업스트림 URL 미설정 시 None)
    pub feed_client: Option<Arc<FeedClient>>,
    /// 증권사 차트 클라이언트 (자격증명 미설정 시 None)
    pub chart_client: Option<Arc<BrokerageChartClient>>,
    /// 피드 수집 쿨다운 게이트
    pub gate: Arc<FetchGate>,
}

impl AppState {
    pub fn new(repository: Arc<dyn SnapshotRepository>) -> Self {
        Self {
            repository,
            feed_client: None,
            chart_client: None,
            gate: Arc::new(FetchGate::new()),
        }
    }

    pub fn with_feed_client(mut self, client: FeedClient) -> Self {
        self.feed_client = Some(Arc::new(client));
        self
    }

    pub fn with_chart_client(mut self, client: BrokerageChartClient) -> Self {
        self.chart_client = Some(Arc::new(client));
        self
    }
}

/// 인메모리 저장소만 연결된 테스트용 상태.
pub fn create_test_state() -> AppState {
    AppState::new(Arc::new(MemorySnapshotRepository::new()))
}

/// 인메모리 저장소를 공유 참조로 돌려주는 테스트용 상태.
pub fn create_test_state_with_repo() -> (AppState, Arc<MemorySnapshotRepository>) {
    let repo = Arc::new(MemorySnapshotRepository::new());
    (AppState::new(repo.clone()), repo)
}
