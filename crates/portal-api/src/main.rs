//! 주식 정보 포털 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 피드 스냅샷, 차트 프록시, 히스토리 조회 엔드포인트를 제공합니다.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{http::StatusCode, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use portal_api::{routes::create_api_router, state::AppState};
use portal_provider::{BrokerageChartClient, ChartClientConfig, FeedClient, MemoryTokenCache};
use portal_store::{MemorySnapshotRepository, PostgresSnapshotRepository, SnapshotRepository};

/// 서버 설정 구조체.
struct ServerConfig {
    /// 바인딩할 호스트 주소
    host: String,
    /// 바인딩할 포트
    port: u16,
}

impl ServerConfig {
    /// 환경 변수에서 설정 로드.
    fn from_env() -> Self {
        let host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("API_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        Self { host, port }
    }

    /// 소켓 주소 반환.
    ///
    /// # Errors
    /// `host:port` 형식이 유효하지 않으면 `AddrParseError`를 반환합니다.
    fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// 저장소 초기화.
///
/// DATABASE_URL이 없거나 연결에 실패하면 인메모리 저장소로
/// 폴백합니다 (재시작 시 데이터 소실).
async fn create_repository() -> Arc<dyn SnapshotRepository> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        warn!("DATABASE_URL not set, using in-memory snapshot store");
        return Arc::new(MemorySnapshotRepository::new());
    };

    match PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await
    {
        Ok(pool) => {
            let repository = PostgresSnapshotRepository::new(pool);
            if let Err(e) = repository.ensure_schema().await {
                error!(error = %e, "스냅샷 스키마 생성 실패, 인메모리 저장소로 폴백");
                return Arc::new(MemorySnapshotRepository::new());
            }
            info!("Connected to PostgreSQL snapshot store");
            Arc::new(repository)
        }
        Err(e) => {
            error!(error = %e, "데이터베이스 연결 실패, 인메모리 저장소로 폴백");
            Arc::new(MemorySnapshotRepository::new())
        }
    }
}

/// AppState 초기화.
async fn create_app_state() -> AppState {
    let repository = create_repository().await;
    let mut state = AppState::new(repository);

    // 피드 수집 클라이언트 (FEED_BASE_URL 환경변수에서)
    if let Ok(base_url) = std::env::var("FEED_BASE_URL") {
        match FeedClient::new(base_url, 15) {
            Ok(client) => {
                info!("Feed client initialized");
                state = state.with_feed_client(client);
            }
            Err(e) => error!(error = %e, "피드 클라이언트 생성 실패"),
        }
    } else {
        warn!("FEED_BASE_URL not set, feed refresh will be disabled");
    }

    // 증권사 차트 클라이언트 (BROKER_* 환경변수에서)
    match ChartClientConfig::from_env() {
        Ok(config) => match BrokerageChartClient::new(config, Arc::new(MemoryTokenCache::new())) {
            Ok(client) => {
                info!("Brokerage chart client initialized");
                state = state.with_chart_client(client);
            }
            Err(e) => error!(error = %e, "차트 클라이언트 생성 실패"),
        },
        Err(e) => {
            warn!(error = %e, "증권사 자격증명 미설정, 차트 프록시 비활성화");
        }
    }

    state
}

/// CORS 미들웨어 구성.
///
/// CORS_ORIGINS 환경변수가 설정되어 있으면 해당 origin만 허용합니다.
/// 설정되지 않으면 개발 모드로 간주하여 모든 origin을 허용합니다.
///
/// # 환경변수
///
/// - `CORS_ORIGINS`: 쉼표로 구분된 허용 origin 목록
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600))
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>) -> Router {
    create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    // tracing 초기화
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_api=info,tower_http=debug".into()),
        )
        .init();

    info!("Starting stock portal API server...");

    let config = ServerConfig::from_env();
    let addr = config.socket_addr().map_err(|e| {
        error!(
            host = %config.host,
            port = config.port,
            error = %e,
            "소켓 주소 설정이 유효하지 않습니다. API_HOST, API_PORT 환경변수를 확인하세요."
        );
        e
    })?;

    let state = Arc::new(create_app_state().await);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
