/// Waits for a signal that requests a graceful shutdown, like SIGTERM or SIGINT.
#[cfg(unix)]
async fn wait_for_signal_impl() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut signal_terminate = signal(SignalKind::terminate()).expect("register SIGTERM handler");
    let mut signal_interrupt = signal(SignalKind::interrupt()).expect("register SIGINT handler");

    tokio::select! {
        _ = signal_terminate.recv() => "SIGTERM",
        _ = signal_interrupt.recv() => "SIGINT",
    }
}

/// Waits for a signal that requests a graceful shutdown, Ctrl-C (SIGINT).
#[cfg(windows)]
async fn wait_for_signal_impl() -> &'static str {
    use tokio::signal::windows;

    let mut signal_c = windows::ctrl_c().expect("register CTRL_C handler");
    let mut signal_break = windows::ctrl_break().expect("register CTRL_BREAK handler");
    let mut signal_close = windows::ctrl_close().expect("register CTRL_CLOSE handler");
    let mut signal_shutdown = windows::ctrl_shutdown().expect("register CTRL_SHUTDOWN handler");

    tokio::select! {
        _ = signal_c.recv() => "CTRL_C",
        _ = signal_break.recv() => "CTRL_BREAK",
        _ = signal_close.recv() => "CTRL_CLOSE",
        _ = signal_shutdown.recv() => "CTRL_SHUTDOWN",
    }
}

/// Registers signal handlers and waits for a signal that
/// indicates a shutdown request.
pub async fn wait_for_stop_signal() -> &'static str {
    wait_for_signal_impl().await
}
