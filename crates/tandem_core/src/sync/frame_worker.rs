//! Persistent worker thread signalled once per frame.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{CoreError, CoreResult};
use crate::frame::FrameDescriptor;

type Job<T> = (Box<T>, FrameDescriptor);
type Done<T, E> = (Box<T>, Result<(), E>);

/// A single long-lived thread that runs one job per frame on state it is
/// handed.
///
/// ```text
/// fork(state, frame) ──> [worker: job(&mut state, frame)] ──> join() -> state
/// ```
///
/// At most one frame is in flight. The state is owned by exactly one thread
/// at any moment.
pub struct FrameWorker<T: Send + 'static, E: Send + 'static> {
    jobs: Option<Sender<Job<T>>>,
    done: Receiver<Done<T, E>>,
    handle: Option<JoinHandle<()>>,
    in_flight: bool,
}

impl<T: Send + 'static, E: Send + 'static> FrameWorker<T, E> {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// [`CoreError::WorkerSpawn`] if the OS refuses to create the thread.
    pub fn spawn<F>(name: &str, mut job: F) -> CoreResult<Self>
    where
        F: FnMut(&mut T, FrameDescriptor) -> Result<(), E> + Send + 'static,
    {
        // Capacity 1 in each direction: the protocol never has more than
        // one frame outstanding.
        let (jobs_tx, jobs_rx) = bounded::<Job<T>>(1);
        let (done_tx, done_rx) = bounded::<Done<T, E>>(1);

        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                while let Ok((mut state, frame)) = jobs_rx.recv() {
                    let result = job(&mut *state, frame);
                    if done_tx.send((state, result)).is_err() {
                        break;
                    }
                }
                tracing::debug!("frame worker exiting");
            })?;

        Ok(Self {
            jobs: Some(jobs_tx),
            done: done_rx,
            handle: Some(handle),
            in_flight: false,
        })
    }

    /// Whether a frame has been forked and not yet joined.
    #[inline]
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Hands `state` to the worker and starts `frame`.
    ///
    /// # Errors
    ///
    /// [`CoreError::WorkerBusy`] if a frame is already in flight (the state
    /// is dropped), [`CoreError::WorkerLost`] if the worker has exited.
    pub fn fork(&mut self, state: Box<T>, frame: FrameDescriptor) -> CoreResult<()> {
        if self.in_flight {
            return Err(CoreError::WorkerBusy);
        }
        let jobs = self.jobs.as_ref().ok_or(CoreError::WorkerLost)?;
        jobs.send((state, frame)).map_err(|_| CoreError::WorkerLost)?;
        self.in_flight = true;
        Ok(())
    }

    /// Waits for the in-flight frame and takes the state back, together
    /// with the job's own result.
    ///
    /// # Errors
    ///
    /// [`CoreError::WorkerIdle`] with nothing in flight,
    /// [`CoreError::WorkerLost`] if the worker died holding the state.
    pub fn join(&mut self) -> CoreResult<(Box<T>, Result<(), E>)> {
        if !self.in_flight {
            return Err(CoreError::WorkerIdle);
        }
        self.in_flight = false;
        self.done.recv().map_err(|_| CoreError::WorkerLost)
    }
}

impl<T: Send + 'static, E: Send + 'static> Drop for FrameWorker<T, E> {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs.take();
        if self.in_flight {
            let _ = self.done.recv();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("frame worker panicked");
            }
        }
    }
}
