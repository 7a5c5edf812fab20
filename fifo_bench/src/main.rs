use std::error::Error;
use std::io;
use std::process;
use std::thread;
use std::time::Instant;

use clap::Parser;
use log::warn;
use serde_derive::{Deserialize, Serialize};
use signal_hook::iterator::Signals;

use fifo::reader::FifoReader;
use fifo::writer::FifoWriter;
use fifo::{CancelToken, FifoChannel, FifoConfig, FifoError};

#[derive(clap::Parser)]
#[clap()]
struct Opts {
    #[clap(short = 'c', long = "config", default_value = "fifo-bench.toml")]
    config: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct BenchConfig {
    fifo: FifoConfig,
    producers: usize,
    consumers: usize,
    payload: usize,
    ops_per_producer: u64,
}

impl Default for BenchConfig {
    fn default() -> BenchConfig {
        BenchConfig {
            fifo: FifoConfig::default(),
            producers: 2,
            consumers: 2,
            payload: 50,
            ops_per_producer: 200_000,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let opts: Opts = Opts::parse();
    let cfg: BenchConfig = confy::load_path(&opts.config)?;
    if cfg.producers == 0 || cfg.consumers == 0 {
        return Err("at least one producer and one consumer are required".into());
    }
    // whole payloads only: keeping every transfer the same size means the
    // buffer always holds complete payloads and the final drain cannot
    // strand a partial one
    if cfg.payload == 0 || cfg.payload > cfg.fifo.max_transfer {
        return Err(format!(
            "payload must be between 1 and max_transfer ({})",
            cfg.fifo.max_transfer
        )
        .into());
    }
    let fifo = FifoChannel::new(cfg.fifo.clone())?;
    run(&fifo, &cfg)
}

fn run(fifo: &FifoChannel, cfg: &BenchConfig) -> Result<(), Box<dyn Error>> {
    let consumer_tokens: Vec<CancelToken> =
        (0..cfg.consumers).map(|_| fifo.cancel_token()).collect();
    let producer_tokens: Vec<CancelToken> =
        (0..cfg.producers).map(|_| fifo.cancel_token()).collect();
    let mut all_tokens = consumer_tokens.clone();
    all_tokens.extend(producer_tokens.iter().cloned());
    spawn_signal_listener(all_tokens)?;

    let start = Instant::now();

    let mut consumers = Vec::with_capacity(cfg.consumers);
    for token in consumer_tokens {
        let chan = fifo.clone();
        let payload = cfg.payload;
        consumers.push(thread::spawn(move || -> Result<u64, FifoError> {
            let reader = FifoReader::open_with(&chan, token)?;
            let mut received = 0u64;
            loop {
                match reader.read(payload) {
                    Ok(bytes) if bytes.is_empty() => break,
                    Ok(bytes) => received += bytes.len() as u64,
                    Err(FifoError::Interrupted) => break,
                    Err(e) => return Err(e),
                }
            }
            Ok(received)
        }));
    }

    let mut producers = Vec::with_capacity(cfg.producers);
    for (id, token) in producer_tokens.into_iter().enumerate() {
        let chan = fifo.clone();
        let payload = vec![b'a' + (id % 26) as u8; cfg.payload];
        let ops = cfg.ops_per_producer;
        producers.push(thread::spawn(move || -> Result<u64, FifoError> {
            let writer = FifoWriter::open_with(&chan, token)?;
            let mut written = 0u64;
            for op in 0..ops {
                match writer.write(&payload) {
                    Ok(_) => written += 1,
                    Err(FifoError::BrokenPipe) | Err(FifoError::Interrupted) => break,
                    Err(e) => return Err(e),
                }
                if id == 0 && op % 100_000 == 0 {
                    eprint!("\rTotal {} ops", op);
                }
            }
            Ok(written)
        }));
    }

    let mut total_ops = 0u64;
    for producer in producers {
        total_ops += producer.join().expect("producer thread panicked")?;
    }
    // every writer is gone; the consumers drain what is left and stop
    let mut total_bytes = 0u64;
    for consumer in consumers {
        total_bytes += consumer.join().expect("consumer thread panicked")?;
    }

    let duration = start.elapsed();
    let iops = ((total_ops as f64) / (duration.as_millis() as f64)) * 1_000f64;
    println!(
        "\n{:#?}K ops/s, {} bytes moved. Total time: {:#?}",
        (iops / 1000f64) as u64,
        total_bytes,
        duration
    );
    Ok(())
}

fn spawn_signal_listener(tokens: Vec<CancelToken>) -> Result<(), io::Error> {
    let mut signals = Signals::new([libc::SIGHUP, libc::SIGINT, libc::SIGQUIT, libc::SIGTERM])?;
    thread::spawn(move || {
        let mut cancelled = false;
        for signal in signals.forever() {
            if cancelled {
                process::exit(130);
            }
            cancelled = true;
            warn!("received signal {}, cancelling the bench", signal);
            for token in &tokens {
                token.cancel();
            }
        }
    });
    Ok(())
}
