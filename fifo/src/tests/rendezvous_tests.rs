use std::thread;
use std::time::{Duration, Instant};

use super::{init_logs, open_pair, test_config, wait_for_stats};
use crate::core::{ChannelStats, FifoChannel, FifoConfig};
use crate::errors::FifoError;
use crate::reader::FifoReader;
use crate::writer::FifoWriter;

#[test]
fn open_blocks_until_the_peer_arrives() {
    init_logs();
    let fifo = FifoChannel::new(FifoConfig::default()).unwrap();

    let chan = fifo.clone();
    let started = Instant::now();
    let consumer = thread::spawn(move || {
        let reader = FifoReader::open(&chan).expect("consumer open");
        (reader, started.elapsed())
    });

    wait_for_stats(&fifo, "consumer parked in open", |s| {
        s.consumers_waiting_open == 1
    });
    // the waiting consumer already counts as present
    assert_eq!(fifo.stats().consumers, 1);
    assert_eq!(fifo.stats().producers, 0);

    thread::sleep(Duration::from_millis(100));
    assert_eq!(fifo.stats().consumers_waiting_open, 1);

    let writer = FifoWriter::open(&fifo).expect("producer open");
    let (reader, blocked_for) = consumer.join().expect("join consumer");
    assert!(blocked_for >= Duration::from_millis(100));

    let stats = fifo.stats();
    assert_eq!(stats.producers, 1);
    assert_eq!(stats.consumers, 1);
    assert_eq!(stats.consumers_waiting_open, 0);

    drop(writer);
    drop(reader);
    assert_eq!(fifo.stats(), ChannelStats::default());
}

#[test]
fn open_returns_at_once_when_the_peer_is_present() {
    let fifo = FifoChannel::new(FifoConfig::default()).unwrap();
    let (writer, reader) = open_pair(&fifo);

    // single-threaded: would deadlock if this blocked
    let second = FifoWriter::open(&fifo).expect("second producer");
    let stats = fifo.stats();
    assert_eq!(stats.producers, 2);
    assert_eq!(stats.consumers, 1);

    drop(second);
    drop(writer);
    drop(reader);
    assert_eq!(fifo.stats(), ChannelStats::default());
}

#[test]
fn last_consumer_close_breaks_a_blocked_write() {
    init_logs();
    let fifo = FifoChannel::new(test_config(8, 8)).unwrap();
    let (writer, reader) = open_pair(&fifo);
    writer.write(b"12345678").unwrap();

    let blocked = thread::spawn(move || writer.write(b"x"));
    wait_for_stats(&fifo, "producer parked in write", |s| {
        s.producers_waiting_write == 1
    });

    reader.close();
    assert_eq!(
        blocked.join().expect("join producer").unwrap_err(),
        FifoError::BrokenPipe
    );
    assert_eq!(fifo.stats(), ChannelStats::default());
}

#[test]
fn last_producer_close_ends_a_blocked_read() {
    init_logs();
    let fifo = FifoChannel::new(FifoConfig::default()).unwrap();
    let (writer, reader) = open_pair(&fifo);

    let blocked = thread::spawn(move || reader.read(5));
    wait_for_stats(&fifo, "consumer parked in read", |s| {
        s.consumers_waiting_read == 1
    });

    writer.close();
    assert_eq!(blocked.join().expect("join consumer").unwrap(), b"");
}

#[test]
fn buffer_is_discarded_once_both_sides_are_gone() {
    let fifo = FifoChannel::new(FifoConfig::default()).unwrap();
    let (writer, reader) = open_pair(&fifo);
    writer.write(b"stale").unwrap();
    assert_eq!(fifo.stats().buffered, 5);

    writer.close();
    // one side still open keeps the bytes
    assert_eq!(fifo.stats().buffered, 5);
    reader.close();
    assert_eq!(fifo.stats().buffered, 0);

    // a fresh pair starts from an empty buffer
    let (writer, reader) = open_pair(&fifo);
    writer.write(b"fresh").unwrap();
    assert_eq!(reader.read(5).unwrap(), b"fresh");
}

#[test]
fn cancelled_open_never_strands_the_peer() {
    init_logs();
    let fifo = FifoChannel::new(FifoConfig::default()).unwrap();
    let token = fifo.cancel_token();

    let chan = fifo.clone();
    let tok = token.clone();
    let producer = thread::spawn(move || FifoWriter::open_with(&chan, tok));
    wait_for_stats(&fifo, "producer parked in open", |s| {
        s.producers_waiting_open == 1
    });

    // rendezvous completes against the optimistic producer count
    let reader = FifoReader::open(&fifo).expect("consumer open");
    let consumer = thread::spawn(move || reader.read(1));
    wait_for_stats(&fifo, "consumer parked in read", |s| {
        s.consumers_waiting_read == 1
    });

    token.cancel();
    match producer.join().expect("join producer") {
        // the cancel raced the wake and the open went through
        Ok(writer) => writer.close(),
        Err(e) => assert_eq!(e, FifoError::Interrupted),
    }
    // either way the consumer sees end of stream instead of hanging
    assert_eq!(consumer.join().expect("join consumer").unwrap(), b"");
    assert_eq!(fifo.stats().producers, 0);
}
