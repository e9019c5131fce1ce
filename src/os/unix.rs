//! Unix shutdown signals via a blocked signal mask.

use nix::sys::signal::{SigSet, Signal};
use std::io;

/// SIGINT/SIGTERM waiter
///
/// Must be installed on the main thread before any other thread is spawned,
/// so every thread inherits the blocked mask and the signals are only ever
/// consumed by [`ShutdownSignal::wait`].
#[derive(Debug)]
pub struct ShutdownSignal {
    mask: SigSet,
}

impl ShutdownSignal {
    pub fn install() -> io::Result<Self> {
        let mut mask = SigSet::empty();
        mask.add(Signal::SIGINT);
        mask.add(Signal::SIGTERM);
        mask.thread_block()?;
        Ok(Self { mask })
    }

    /// Block until a shutdown signal arrives; returns its name
    pub fn wait(&self) -> io::Result<&'static str> {
        let signal = self.mask.wait()?;
        Ok(signal.as_str())
    }
}
