// Ctrl+C handling for blocking code.
//
// A background thread drives a small tokio runtime that waits on
// `tokio::signal::ctrl_c()` and forwards every press over a channel. Once
// the listener is installed the default "terminate" behaviour is gone, so
// whoever owns the listener decides what an interrupt means.

use anyhow::{Context, Result};
use std::future::{poll_fn, Future};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::task::Poll;
use std::thread;
use std::time::Duration;

pub struct Interrupts {
    rx: Receiver<()>,
    seen: Arc<AtomicBool>,
}

impl Interrupts {
    /// Install the Ctrl+C listener. Returns once the handler is registered
    /// with the OS, so a press right after this call is already caught.
    pub fn listen() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build signal runtime")?;
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let seen = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&seen);

        thread::Builder::new()
            .name("ctrl-c".into())
            .spawn(move || {
                runtime.block_on(async move {
                    let forward = || {
                        flag.store(true, Ordering::SeqCst);
                        tx.send(()).is_ok()
                    };

                    // `ctrl_c()` registers its handler on first poll.
                    let mut press = Box::pin(tokio::signal::ctrl_c());
                    let first = poll_fn(|cx| Poll::Ready(press.as_mut().poll(cx))).await;
                    let _ = ready_tx.send(());
                    if let Poll::Ready(res) = first {
                        if res.is_err() || !forward() {
                            return;
                        }
                        press = Box::pin(tokio::signal::ctrl_c());
                    }

                    while (&mut press).await.is_ok() && forward() {
                        press = Box::pin(tokio::signal::ctrl_c());
                    }
                })
            })
            .context("Failed to start signal thread")?;

        ready_rx
            .recv()
            .context("Signal thread stopped before installing the handler")?;
        Ok(Interrupts { rx, seen })
    }

    /// Whether Ctrl+C has been pressed since the listener was installed.
    pub fn triggered(&self) -> bool {
        self.seen.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless interrupted first. Returns `true` when
    /// the wait ended because of Ctrl+C.
    pub fn wait(&self, duration: Duration) -> bool {
        if self.triggered() {
            return true;
        }
        match self.rx.recv_timeout(duration) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => self.triggered(),
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(duration);
                self.triggered()
            }
        }
    }
}

/// Something the daemon loop can sleep on. Split out so tests can run the
/// loop without real signals or real time.
pub trait Waiter {
    /// Returns `true` if the wait was cut short by an interrupt.
    fn wait(&self, duration: Duration) -> bool;
    fn interrupted(&self) -> bool;
}

impl Waiter for Interrupts {
    fn wait(&self, duration: Duration) -> bool {
        Interrupts::wait(self, duration)
    }

    fn interrupted(&self) -> bool {
        self.triggered()
    }
}
