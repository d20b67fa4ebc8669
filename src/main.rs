use color_eyre::{eyre::eyre, Result};
use streaminput::config::Config;
use streaminput::controller::collector::CollectorHandle;
use streaminput::controller::{ControllerState, InputHandle, StreamInput, WatchTransport};
use streaminput::session::log_backend::LogBackend;
use streaminput::session::{SessionBackend, SessionError, StreamSession};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = Config::default_path()?;
    let config = Config::load_or_create(&config_path).await?;

    if config.input.motion_enabled {
        debug!("No motion sensor source on this host, motion input stays idle");
    }

    let cancel = CancellationToken::new();

    info!("Initializing stream input");
    let (transport, state_receiver) = WatchTransport::new();
    let input = StreamInput::new(&config.input, config.input.display_rotation)
        .with_listener(transport);
    let input_handle = InputHandle::spawn(input, cancel.clone());

    let collector = match CollectorHandle::spawn(
        config.collector.clone(),
        input_handle.sender(),
        cancel.clone(),
    ) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Continuing without gamepad: {}", e);
            None
        }
    };

    let host = config.session.host.clone();
    let verbose = config.session.log_verbose;
    let mut session = StreamSession::new(move || {
        Ok::<_, SessionError>(LogBackend::new(host.clone(), verbose))
    });
    let mut stream_state = session.state();
    tokio::spawn(async move {
        while stream_state.changed().await.is_ok() {
            info!("Stream state: {:?}", *stream_state.borrow_and_update());
        }
    });
    session.resume();
    if !session.is_active() {
        cancel.cancel();
        return Err(eyre!(
            "Failed to start session: {:?}",
            session.current_state()
        ));
    }

    let forward_cancel = cancel.clone();
    let forwarder = tokio::spawn(async move {
        forward_states(&mut session, state_receiver, forward_cancel).await;
        session.shutdown();
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to listen for ctrl-c: {}", e))?;
    info!("Shutting down");
    cancel.cancel();

    if let Some(collector) = collector {
        collector.join().await;
    }
    input_handle
        .shutdown()
        .await
        .map_err(|e| eyre!("Failed to stop input pump: {}", e))?;
    forwarder
        .await
        .map_err(|e| eyre!("Session task failed: {}", e))?;

    Ok(())
}

/// Feeds controller states to the session and engine events back into it
async fn forward_states<B, F>(
    session: &mut StreamSession<B, F>,
    mut receiver: watch::Receiver<ControllerState>,
    cancel: CancellationToken,
) where
    B: SessionBackend,
    F: FnMut() -> Result<B, SessionError>,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(event) = session.next_event() => {
                session.handle_event(event);
            }
            changed = receiver.changed() => {
                if changed.is_err() {
                    debug!("Controller state channel closed");
                    break;
                }
                let state = receiver.borrow_and_update().clone();
                session.set_controller_state(&state);
            }
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
