use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::core::{ChannelStats, FifoChannel, FifoConfig};
use crate::reader::FifoReader;
use crate::writer::FifoWriter;

mod rendezvous_tests;

static LOG_INIT: Lazy<()> = Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub(crate) fn init_logs() {
    Lazy::force(&LOG_INIT);
}

pub(crate) fn test_config(capacity: usize, max_transfer: usize) -> FifoConfig {
    FifoConfig {
        capacity,
        max_transfer,
    }
}

/// Opens one endpoint of each role, resolving the rendezvous with a helper
/// thread for the consumer side.
pub(crate) fn open_pair(fifo: &FifoChannel) -> (FifoWriter, FifoReader) {
    let chan = fifo.clone();
    let consumer = thread::spawn(move || FifoReader::open(&chan).expect("consumer open"));
    let writer = FifoWriter::open(fifo).expect("producer open");
    (writer, consumer.join().expect("join consumer open"))
}

/// Polls the channel stats until the predicate holds. Panics after five
/// seconds so a broken wakeup fails the test instead of hanging it.
pub(crate) fn wait_for_stats<F>(fifo: &FifoChannel, what: &str, pred: F)
where
    F: Fn(&ChannelStats) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if pred(&fifo.stats()) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}
