//! Windows shutdown signals via a console control handler.

use std::io;
use std::sync::{Condvar, Mutex, OnceLock, PoisonError};
use winapi::shared::minwindef::{BOOL, DWORD, FALSE, TRUE};
use winapi::um::consoleapi::SetConsoleCtrlHandler;
use winapi::um::wincon::{CTRL_BREAK_EVENT, CTRL_C_EVENT};

static RECEIVED: OnceLock<(Mutex<Option<&'static str>>, Condvar)> = OnceLock::new();

fn received() -> &'static (Mutex<Option<&'static str>>, Condvar) {
    RECEIVED.get_or_init(|| (Mutex::new(None), Condvar::new()))
}

// Console close is not handled: the process is killed as soon as the
// handler returns, which would cut the drain short.
unsafe extern "system" fn console_handler(ctrl_type: DWORD) -> BOOL {
    let name = match ctrl_type {
        CTRL_C_EVENT => "CTRL_C",
        CTRL_BREAK_EVENT => "CTRL_BREAK",
        _ => return FALSE,
    };

    let (lock, cvar) = received();
    *lock.lock().unwrap_or_else(PoisonError::into_inner) = Some(name);
    cvar.notify_all();
    TRUE
}

/// Ctrl+C / Ctrl+Break waiter
#[derive(Debug)]
pub struct ShutdownSignal;

impl ShutdownSignal {
    pub fn install() -> io::Result<Self> {
        received();
        let ok = unsafe { SetConsoleCtrlHandler(Some(console_handler), TRUE) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self)
    }

    /// Block until a console control event arrives; returns its name
    pub fn wait(&self) -> io::Result<&'static str> {
        let (lock, cvar) = received();
        let mut guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(name) = *guard {
                return Ok(name);
            }
            guard = cvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }
}
