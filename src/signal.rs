//! Ctrl+C handling.
//!
//! A single `Arc<AtomicBool>` is handed to every long-running component
//! ([`crate::scanner::DirectoryScanner`], [`crate::scanner::Fingerprinter`],
//! [`crate::hierarchy::HierarchyMigrator`], [`crate::catalog::Catalog`]).
//! They poll it between items, commit what they have and return early.
//!
//! ```rust,no_run
//! use dupecat::signal::install_handler;
//!
//! let handler = install_handler();
//! let flag = handler.get_flag();
//! // pass `flag` to with_shutdown_flag(...) builders
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// A handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Set the flag as if Ctrl+C had been pressed.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clone of the flag for `with_shutdown_flag` builders.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler.
///
/// The first call registers with the OS. Later calls (several `run_app`
/// invocations in one test process) get the same handler back with the
/// flag cleared. If registration fails, a warning is logged and an
/// unregistered handler is returned, so the run proceeds without
/// interruption support.
pub fn install_handler() -> ShutdownHandler {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return handler.clone();
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();
    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "\nInterrupted. Committing current batch...");
        let _ = stderr.flush();
        log::info!("Shutdown signal received");
    });

    match installed {
        Ok(()) => GLOBAL_HANDLER.get_or_init(|| handler).clone(),
        Err(e) => {
            log::warn!("Ctrl+C handler not installed: {}", e);
            handler
        }
    }
}
