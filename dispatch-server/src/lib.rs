//! Dispatch Server - order lifecycle and rider dispatch
//!
//! # Modules
//!
//! ```text
//! dispatch-server/src/
//! ├── core/          # config, state, server, errors
//! ├── auth/          # JWT validation, CurrentUser extractor
//! ├── orders/        # store, state machine, assignment, DispatchManager
//! ├── live/          # DispatchHub (rider queues + status broadcast)
//! ├── riders/        # rider directory (redb)
//! ├── services/      # payment gateway, proof storage
//! ├── api/           # HTTP + WebSocket routes
//! └── utils/         # logger, error re-exports
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod live;
pub mod orders;
pub mod riders;
pub mod services;
pub mod utils;

pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use live::DispatchHub;
pub use orders::{DispatchManager, OrderStorage};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

pub use utils::logger::{init_logger, init_logger_with_file};

// Security logging macro
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// Load `.env`, then install the logger from `LOG_LEVEL` / `LOG_JSON` / `WORK_DIR`
pub fn setup_environment() -> Result<(), Box<dyn std::error::Error>> {
    // Missing .env is fine
    let _ = dotenv::dotenv();

    let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".to_string());
    let log_dir = std::path::Path::new(&work_dir).join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let json = std::env::var("LOG_JSON")
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false);

    init_logger_with_file(Some(&level), Some(json), log_dir.to_str());
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
     ___  _                _       _
    |   \(_)____ __  __ _| |_ __| |_
    | |) | (_-< '_ \/ _` |  _/ _| ' \
    |___/|_/__/ .__/\__,_|\__\__|_||_|
              |_|
    "#
    );
}
