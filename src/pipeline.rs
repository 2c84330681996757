// Producer/consumer pipeline: one parser thread feeding a bounded queue
// drained by a pool of classification workers.
//
// The queue is a bounded crossbeam channel behind a close-once wrapper:
// push blocks while the queue is full, pop blocks while it is empty and
// only reports closure after the queue has drained. The producer runs on
// the calling thread; workers are joined before the pipeline returns, so
// pipelines for consecutive input files never overlap.

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::classify;
use crate::config::Config;
use crate::index::FmIndex;
use crate::io::output::SharedWriter;
use crate::io::read_parser::{ReadItem, ReadParser};
use crate::taxonomy::Taxonomy;

/// Bounded queue capacity between the parser and the workers.
pub const QUEUE_CAPACITY: usize = 500;

/// Bounded FIFO handed between the producer and the worker pool.
///
/// `close` may be called more than once; poppers see every item pushed
/// before the close, then `None`.
pub struct WorkQueue<T> {
    tx: Mutex<Option<Sender<T>>>,
    rx: Receiver<T>,
}

impl<T> WorkQueue<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        WorkQueue {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Enqueue an item, blocking while the queue is full. Items pushed
    /// after `close` are discarded.
    pub fn push(&self, item: T) {
        let guard = self.tx.lock().expect("queue sender poisoned");
        if let Some(tx) = guard.as_ref() {
            // Only fails when every receiver is gone, i.e. during teardown.
            tx.send(item).ok();
        }
    }

    /// Dequeue an item, blocking while the queue is empty. Returns `None`
    /// once the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Close the queue. Idempotent.
    pub fn close(&self) {
        self.tx.lock().expect("queue sender poisoned").take();
    }
}

fn worker_loop(
    queue: Arc<WorkQueue<ReadItem>>,
    config: Arc<Config>,
    index: Arc<FmIndex>,
    taxonomy: Arc<Taxonomy>,
    output: SharedWriter,
    fatal: Arc<AtomicBool>,
) {
    while let Some(item) = queue.pop() {
        let classified = catch_unwind(AssertUnwindSafe(|| {
            classify::classify_read(&item, &config, &index, &taxonomy)
        }));
        match classified {
            Ok(c) => {
                let line = classify::format_line(&item.name, &c);
                if let Err(e) = output.write_line(&line) {
                    log::error!("writing output for read {}: {}", item.name, e);
                    fatal.store(true, Ordering::Relaxed);
                    // Keep draining so a producer blocked on a full queue
                    // always wakes up to see the fatal flag.
                    while queue.pop().is_some() {}
                    break;
                }
            }
            Err(_) => {
                // Should be unreachable; keep draining either way.
                log::error!("classification failed for read {}", item.name);
            }
        }
    }
}

/// Classify one input file (or file pair) with `num_threads` workers.
///
/// Returns `Ok(true)` when every worker finished cleanly, `Ok(false)`
/// when a worker reported a fatal error, and `Err` for fatal stream
/// errors on the producer side. Workers drain the queue even when the
/// producer stops early, and the output stream is flushed before return.
pub fn run_pipeline(
    config: &Arc<Config>,
    index: &Arc<FmIndex>,
    taxonomy: &Arc<Taxonomy>,
    num_threads: usize,
    input1: &str,
    input2: Option<&str>,
    output: &SharedWriter,
) -> io::Result<bool> {
    let mut parser = ReadParser::open(input1, input2)?;

    let queue = Arc::new(WorkQueue::with_capacity(QUEUE_CAPACITY));
    let fatal = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::with_capacity(num_threads);
    for _ in 0..num_threads.max(1) {
        let queue = Arc::clone(&queue);
        let config = Arc::clone(config);
        let index = Arc::clone(index);
        let taxonomy = Arc::clone(taxonomy);
        let output = output.clone();
        let fatal = Arc::clone(&fatal);
        handles.push(thread::spawn(move || {
            worker_loop(queue, config, index, taxonomy, output, fatal)
        }));
    }

    let mut read_count: u64 = 0;
    let mut parse_result: io::Result<()> = Ok(());
    loop {
        if fatal.load(Ordering::Relaxed) {
            log::warn!("stopping input after worker error");
            break;
        }
        match parser.next_item() {
            Ok(Some(item)) => {
                read_count += 1;
                queue.push(item);
            }
            Ok(None) => break,
            Err(e) => {
                parse_result = Err(e);
                break;
            }
        }
    }

    queue.close();
    for handle in handles {
        if handle.join().is_err() {
            log::error!("worker thread panicked");
            fatal.store(true, Ordering::Relaxed);
        }
    }
    output.flush()?;

    parse_result?;
    log::info!("Processed {} reads from {}", read_count, input1);
    Ok(!fatal.load(Ordering::Relaxed))
}
