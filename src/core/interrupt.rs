//! Ctrl-C handling for corpus passes.
//!
//! The handler only raises a flag. Passes check it between documents, so a
//! rewrite in progress completes and the corpus lock is released on return.
//! A second Ctrl-C exits immediately.

use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exit status after a run stopped on Ctrl-C.
pub const EXIT_INTERRUPTED: i32 = 130;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INSTALL: Once = Once::new();

/// Installs the process-wide handler. Later calls are no-ops.
pub fn install() {
    INSTALL.call_once(|| {
        let result = ctrlc::set_handler(|| {
            if INTERRUPTED.swap(true, Ordering::SeqCst) {
                std::process::exit(EXIT_INTERRUPTED);
            }
        });
        if let Err(err) = result {
            tracing::warn!(error = %err, "could not install interrupt handler");
        }
    });
}

/// The flag the handler raises.
pub fn flag() -> &'static AtomicBool {
    &INTERRUPTED
}

pub fn is_set(flag: &AtomicBool) -> bool {
    flag.load(Ordering::SeqCst)
}
