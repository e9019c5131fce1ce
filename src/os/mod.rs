//! Platform-specific shutdown signal handling.

#[cfg(windows)]
mod windows;

#[cfg(unix)]
mod unix;

#[cfg(windows)]
pub use windows::ShutdownSignal;

#[cfg(unix)]
pub use unix::ShutdownSignal;
