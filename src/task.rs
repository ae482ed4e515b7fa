//! Background jobs whose newest request wins.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// One slot for a background job. Spawning again drops the receiver of the
/// previous job, so a stale result can never be observed.
pub struct Latest<T> {
    rx: Option<Receiver<T>>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self { rx: None }
    }
}

pub enum Poll<T> {
    Idle,
    Pending,
    Ready(T),
    /// The worker went away without answering (it panicked).
    Lost,
}

impl<T: Send + 'static> Latest<T> {
    /// `wake` runs on the worker after the result is sent, e.g. to request a repaint.
    pub fn spawn<F, W>(&mut self, job: F, wake: W)
    where
        F: FnOnce() -> T + Send + 'static,
        W: FnOnce() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.rx = Some(rx);
        thread::spawn(move || {
            // a send error only means this job was superseded
            if tx.send(job()).is_ok() {
                wake();
            }
        });
    }

    pub fn is_pending(&self) -> bool {
        self.rx.is_some()
    }

    pub fn poll(&mut self) -> Poll<T> {
        let Some(rx) = &self.rx else {
            return Poll::Idle;
        };
        match rx.try_recv() {
            Ok(value) => {
                self.rx = None;
                Poll::Ready(value)
            }
            Err(TryRecvError::Empty) => Poll::Pending,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                Poll::Lost
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::{Duration, Instant};

    fn wait<T: Send + 'static>(slot: &mut Latest<T>) -> Option<T> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            match slot.poll() {
                Poll::Ready(v) => return Some(v),
                Poll::Pending => thread::sleep(Duration::from_millis(5)),
                Poll::Idle | Poll::Lost => return None,
            }
        }
        None
    }

    #[test]
    fn newer_job_supersedes_older() {
        let mut slot = Latest::default();
        let (release_tx, release_rx) = channel::<()>();
        slot.spawn(
            move || {
                let _ = release_rx.recv();
                "stale"
            },
            || {},
        );
        slot.spawn(|| "fresh", || {});
        assert_eq!(wait(&mut slot), Some("fresh"));
        release_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(matches!(slot.poll(), Poll::Idle));
    }

    #[test]
    fn panicking_job_reports_lost() {
        let mut slot: Latest<u32> = Latest::default();
        slot.spawn(|| panic!("boom"), || {});
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match slot.poll() {
                Poll::Lost => break,
                Poll::Pending if Instant::now() < deadline => thread::sleep(Duration::from_millis(5)),
                _ => panic!("expected the job to be reported lost"),
            }
        }
        assert!(!slot.is_pending());
    }

    #[test]
    fn wake_runs_after_delivery() {
        let mut slot = Latest::default();
        let (woke_tx, woke_rx) = channel();
        slot.spawn(|| 7, move || woke_tx.send(()).unwrap());
        woke_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(slot.poll(), Poll::Ready(7)));
    }
}
