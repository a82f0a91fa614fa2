//! # Speech Gateway - Main Application Entry Point
//!
//! This is the main entry point for the speech-gateway web server.
//! It sets up an Actix-web HTTP server in front of two inference backends:
//! a whisper speech-to-text service and an Ollama language-model service.
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: The entire application is asynchronous for better performance
//! - **modules**: Code is organized into separate modules (mod statements)
//! - **Result<T, E>**: Error handling using Rust's Result type
//! - **static**: Global variables that live for the entire program duration
//!
//! ## Application Architecture:
//! - **config**: Handles application configuration (TOML files + environment variables)
//! - **state**: Shared application state and metrics
//! - **health**: Liveness and metrics endpoints
//! - **middleware**: Request metrics
//! - **handlers**: HTTP request handlers for API endpoints
//! - **audio**: Upload decoding, scratch files, ffmpeg normalization
//! - **backend**: HTTP clients for the whisper and Ollama services
//! - **transcription**: The upload → convert → transcribe pipeline
//! - **error**: Custom error types and HTTP error responses

mod audio; // Ingestion, scratch files, transcoding (audio/ directory)
mod backend; // Whisper + Ollama clients (backend/ directory)
mod config; // Configuration management (config.rs)
mod error; // Error handling types (error.rs)
mod handlers; // HTTP request handlers (handlers/ directory)
mod health; // Health check endpoints (health.rs)
mod middleware; // Custom middleware (middleware/ directory)
mod state; // Application state management (state.rs)
mod transcription; // Transcription pipeline (transcription/ directory)

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set once SIGINT or SIGTERM arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from `.env`, `config.toml` and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Creates shared application state**: backend client and transcription pipeline
/// 4. **Configures the HTTP server** with CORS, request tracing, metrics and routes
/// 5. **Handles graceful shutdown** when receiving system signals
#[actix_web::main]
async fn main() -> Result<()> {
    // It's fine if there's no .env file
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = crate::config::AppConfig::load().context("Failed to load configuration")?;
    config.validate()?;

    info!("Starting speech-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let app_state = AppState::new(config.clone())?;

    let transcoder = app_state.pipeline.transcoder();
    if transcoder.is_available().await {
        info!(ffmpeg = transcoder.ffmpeg_path(), "FFmpeg available");
    } else {
        warn!(
            ffmpeg = transcoder.ffmpeg_path(),
            "FFmpeg not found; /transcribe will fail until it is installed"
        );
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers()?;

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Middleware runs outermost-last: CORS sees the request first
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::MetricsMiddleware)
            .wrap(TracingLogger::default())
            .wrap(cors)
            .configure(handlers::configure(&config))
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Whichever finishes first: the server itself, or a shutdown signal
    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "speech_gateway=trace")
/// - If not set, defaults to "speech_gateway=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "speech_gateway=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Set up signal handlers for graceful shutdown.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C); either one sets the global shutdown
/// flag. Handlers are installed before returning so a failure surfaces at startup.
fn setup_signal_handlers() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });

    Ok(())
}

/// Wait for the shutdown flag, polling every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
