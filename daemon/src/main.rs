use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use log::{info, LevelFilter};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use emm_attach::attach::AttachEngine;
use emm_attach::identity::RandomMTmsiAllocator;
use emm_attach::identity_provider::StaticIdentityProvider;
use emm_attach::util::EngineMetadata;

use emm_attach_daemon::config::{parse_args, parse_config, Config};
use emm_attach_daemon::demo::{AcceptingEsmSap, LoggingAsSap, LoggingRegSink};
use emm_attach_daemon::engine_actor::{run_engine_actor, EngineCommand};
use emm_attach_daemon::error::DaemonError;
use emm_attach_daemon::server::{get_status, ServerState, StatusSnapshot};

type AppRouter = Router<Arc<ServerState>>;

fn get_router() -> AppRouter {
    Router::new().route("/api/status", get(get_status))
}

fn init_logging(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new().filter_level(filter).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), DaemonError> {
    let args = parse_args();
    let config = parse_config(&args.config_path).await?;
    init_logging(&config.log_level);

    run_with_config(config).await
}

async fn run_with_config(config: Config) -> Result<(), DaemonError> {
    let task_tracker = TaskTracker::new();
    info!("starting emm-attach-daemon on port {}", config.port);

    let shutdown_token = CancellationToken::new();
    let _shutdown_guard = shutdown_token.clone().drop_guard();

    let (timer_tx, timer_rx) = mpsc::channel(64);
    let (cmd_tx, cmd_rx) = mpsc::channel::<EngineCommand>(64);

    let identity_provider = Arc::new(StaticIdentityProvider::new(
        config.engine.gummei.into(),
        config.engine.gummei.tac,
        config.engine.gummei.n_tacs,
        Arc::new(RandomMTmsiAllocator),
    ));
    let engine = AttachEngine::new(
        config.engine,
        timer_tx,
        identity_provider,
        Arc::new(LoggingAsSap::default()),
        Arc::new(AcceptingEsmSap),
        Arc::new(LoggingRegSink),
    );

    let status = Arc::new(RwLock::new(StatusSnapshot::default()));

    run_engine_actor(
        &task_tracker,
        engine,
        cmd_rx,
        timer_rx,
        status.clone(),
        shutdown_token.clone(),
    );

    // kept alive so a future AS-layer bridge can be wired in without
    // restructuring the actor; unused in this demo deployment otherwise.
    let _cmd_tx = cmd_tx;

    let state = Arc::new(ServerState {
        status,
        metadata: EngineMetadata::default(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(DaemonError::BindError)?;
    let app = get_router().with_state(state);

    let server_shutdown = shutdown_token.clone();
    task_tracker.spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(server_shutdown.cancelled_owned())
            .await
            .unwrap();
    });

    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    shutdown_token.cancel();

    task_tracker.close();
    task_tracker.wait().await;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_get_router() {
        let _ = get_router();
    }
}
