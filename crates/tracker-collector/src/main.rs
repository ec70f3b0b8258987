//! Short-data collector CLI.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracker_collector::{modules, Collector, CollectorConfig};
use tracker_core::{init_logging, LogConfig};
use tracker_data::{InMemoryStore, MetricStore, PgStore, SymbolStore};

#[derive(Parser)]
#[command(name = "tracker-collector")]
#[command(about = "Short-data ingestion and reconciliation collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 기본 추적 심볼 등록
    SeedSymbols,

    /// 수집 패스 1회 실행
    RunOnce {
        /// 특정 심볼만 수집 (쉼표로 구분, 예: "GME,AMC")
        #[arg(long, value_delimiter = ',')]
        symbols: Option<Vec<String>>,

        /// DB 대신 메모리 저장소 사용
        #[arg(long)]
        dry_run: bool,
    },

    /// 데몬 모드: 주기적으로 수집 패스 실행
    Daemon {
        /// DB 대신 메모리 저장소 사용
        #[arg(long)]
        dry_run: bool,
    },
}

/// 실행에 필요한 저장소 쌍
struct Stores {
    metrics: Arc<dyn MetricStore>,
    symbols: Arc<dyn SymbolStore>,
    pg: Option<PgStore>,
}

async fn open_stores(config: &CollectorConfig, dry_run: bool) -> tracker_collector::Result<Stores> {
    if dry_run {
        tracing::warn!("dry-run 모드: 메모리 저장소 사용, 결과는 저장되지 않습니다");
        let store = Arc::new(InMemoryStore::new());
        return Ok(Stores {
            metrics: store.clone(),
            symbols: store,
            pg: None,
        });
    }

    let store = PgStore::connect(
        config.require_database_url()?,
        config.database_max_connections,
    )
    .await?;
    tracing::info!("데이터베이스 연결 성공");
    store.ensure_schema().await?;

    Ok(Stores {
        metrics: Arc::new(store.clone()),
        symbols: Arc::new(store.clone()),
        pg: Some(store),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화
    init_logging(LogConfig::new(cli.log_level.clone()).with_env_format())?;

    tracing::info!("Short-data Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(scheduler = ?config.scheduler, "설정 로드 완료");

    // 종료 신호 → 취소 토큰
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("종료 신호 수신");
                cancel.cancel();
            }
        });
    }

    let dry_run = match &cli.command {
        Commands::SeedSymbols => false,
        Commands::RunOnce { dry_run, .. } | Commands::Daemon { dry_run } => *dry_run,
    };
    let stores = open_stores(&config, dry_run).await?;

    // 명령 실행
    match cli.command {
        Commands::SeedSymbols => {
            modules::seed_default_symbols(stores.symbols.as_ref()).await?;
        }
        Commands::RunOnce { symbols, .. } => {
            let registry =
                modules::build_registry(&config.providers, &config.scheduler.metrics, &cancel)?;
            let collector = Collector::new(
                registry,
                stores.metrics.clone(),
                stores.symbols.clone(),
                config.scheduler.clone(),
            );

            let stats = collector.run_pass(symbols.as_deref(), &cancel).await?;
            stats.log_summary("수집 패스");
        }
        Commands::Daemon { .. } => {
            let registry =
                modules::build_registry(&config.providers, &config.scheduler.metrics, &cancel)?;
            let collector = Collector::new(
                registry,
                stores.metrics.clone(),
                stores.symbols.clone(),
                config.scheduler.clone(),
            );

            collector.run_daemon(cancel.clone()).await?;
        }
    }

    if let Some(pg) = stores.pg {
        pg.close().await;
    }
    tracing::info!("Short-data Collector 종료");

    Ok(())
}
