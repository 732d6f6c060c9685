use crate::CoreError;
use corral_schema::StateLocation;
use corral_store::{StoreError, StoreLayout};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use tracing::debug;

/// Exclusive advisory lock on one scenario's state location.
///
/// Held for the whole run so that two processes never drive the same
/// instances. Released on drop.
pub struct ScenarioLock {
    lock_file: File,
}

impl ScenarioLock {
    fn open(location: &StateLocation) -> Result<File, CoreError> {
        std::fs::create_dir_all(location.as_path())?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(StoreLayout::lock_file(location))?;
        Ok(file)
    }

    /// Take the lock or fail with [`StoreError::StateLocked`].
    pub fn try_acquire(location: &StateLocation) -> Result<Self, CoreError> {
        let file = Self::open(location)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("locked state at {location}");
                Ok(Self { lock_file: file })
            }
            Err(_) => Err(StoreError::StateLocked(location.to_string()).into()),
        }
    }
}

impl Drop for ScenarioLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

/// Cooperative interrupt flag shared by every runner of an orchestrator.
///
/// Runners check it between steps; a set flag fails the scenario after the
/// in-flight step returns, and teardown still runs per the destroy policy.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Route Ctrl-C into a fresh [`ShutdownFlag`].
///
/// The first signal sets the flag; a second one exits immediately.
pub fn install_signal_handler() -> ShutdownFlag {
    let flag = ShutdownFlag::new();
    let handler_flag = flag.clone();
    let _ = ctrlc::set_handler(move || {
        if handler_flag.is_requested() {
            std::process::exit(130);
        }
        handler_flag.request();
        eprintln!("\ninterrupt received, finishing current step then tearing down...");
    });
    flag
}

/// Apply `f` to every item using at most `max_workers` threads.
///
/// Results come back in input order regardless of completion order. Workers
/// pull the next unclaimed index, so a slow item never holds up the queue.
pub fn run_bounded<T, R, F>(items: &[T], max_workers: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = max_workers.max(1).min(items.len());
    let next = AtomicUsize::new(0);
    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();

    std::thread::scope(|scope| {
        let (tx, rx) = mpsc::channel();
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            let f = &f;
            scope.spawn(move || loop {
                let i = next.fetch_add(1, Ordering::SeqCst);
                let Some(item) = items.get(i) else {
                    break;
                };
                if tx.send((i, f(item))).is_err() {
                    break;
                }
            });
        }
        drop(tx);
        for (i, result) in rx {
            slots[i] = Some(result);
        }
    });

    slots.into_iter().flatten().collect()
}
