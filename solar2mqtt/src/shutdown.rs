use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Requests termination of the poll loop. Cheap to clone.
#[derive(Clone)]
pub struct ShutdownTrigger {
    sender: Sender<()>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // the receiving side may already be gone during process exit
        let _ = self.sender.send(());
    }
}

/// Interruptible sleep used between poll iterations.
pub struct Shutdown {
    receiver: Receiver<()>,
}

impl Shutdown {
    /// Sleeps up to `timeout`. Returns true as soon as shutdown was requested
    /// or every trigger was dropped, false once the timeout elapsed.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (sender, receiver) = mpsc::channel();
    (ShutdownTrigger { sender }, Shutdown { receiver })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn times_out_without_trigger() {
        let (_trigger, shutdown) = channel();
        assert!(!shutdown.wait(Duration::from_millis(20)));
    }

    #[test]
    fn pending_trigger_returns_immediately() {
        let (trigger, shutdown) = channel();
        trigger.trigger();

        let started = Instant::now();
        assert!(shutdown.wait(Duration::from_secs(60)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn trigger_interrupts_wait() {
        let (trigger, shutdown) = channel();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            trigger.trigger();
        });

        let started = Instant::now();
        assert!(shutdown.wait(Duration::from_secs(60)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn dropped_triggers_count_as_shutdown() {
        let (trigger, shutdown) = channel();
        drop(trigger);
        assert!(shutdown.wait(Duration::from_secs(60)));
    }
}
