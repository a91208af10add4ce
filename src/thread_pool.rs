use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executes user callbacks (Invocation/Event handlers) off the receive-loop
/// thread, so a slow or blocking handler never stalls the single reader.
pub struct ThreadPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// `size` should be at least 1; callers typically default it to the
    /// number of available hardware threads.
    pub fn new(size: usize) -> ThreadPool {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("xconn-worker-{}", id))
                    .spawn(move || loop {
                        let job = {
                            let receiver = receiver.lock().unwrap();
                            receiver.recv()
                        };
                        match job {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        ThreadPool {
            sender: Some(sender),
            workers,
        }
    }

    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Box::new(job));
        }
    }

    /// A cloneable handle for submitting jobs from threads that don't own
    /// the pool itself (the receive loop dispatches through this rather
    /// than holding the pool, so the pool can live outside `Shared`).
    pub(crate) fn sender(&self) -> Sender<Job> {
        self.sender.as_ref().expect("pool sender available").clone()
    }

    /// Stops accepting new jobs and blocks until every worker has drained
    /// its queue and exited. Idempotent: safe to call before `Drop` runs.
    pub fn join(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.join();
    }
}
