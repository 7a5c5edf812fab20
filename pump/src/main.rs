use std::error::Error;
use std::io::{self, Read, Write};
use std::process;
use std::thread;

use clap::Parser;
use log::{debug, info, warn};
use serde_derive::{Deserialize, Serialize};
use signal_hook::iterator::Signals;

use fifo::reader::FifoReader;
use fifo::writer::FifoWriter;
use fifo::{CancelToken, FifoChannel, FifoConfig, FifoError};

#[derive(clap::Parser)]
#[clap()]
struct Opts {
    #[clap(short = 'c', long = "config", default_value = "fifo-pump.toml")]
    config: String,
}

#[derive(Default, Debug, Serialize, Deserialize)]
struct PumpConfig {
    fifo: FifoConfig,
}

/// Pipes stdin through the channel to stdout: the main thread produces,
/// one spawned thread consumes. A signal cancels both sides.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let opts: Opts = Opts::parse();
    let cfg: PumpConfig = confy::load_path(&opts.config)?;
    debug!("{:?}", &cfg.fifo);

    let fifo = FifoChannel::new(cfg.fifo)?;
    let producer_token = fifo.cancel_token();
    let consumer_token = fifo.cancel_token();
    spawn_signal_listener(vec![producer_token.clone(), consumer_token.clone()])?;

    let chunk = fifo.max_transfer();
    let chan = fifo.clone();
    let consumer = thread::spawn(move || -> Result<u64, FifoError> {
        let reader = FifoReader::open_with(&chan, consumer_token)?;
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let mut received = 0u64;
        loop {
            // ask for what is known to be buffered so a trailing partial
            // chunk cannot leave the read waiting forever; one byte when
            // idle parks us until data or end of stream
            let want = chan.stats().buffered.clamp(1, chunk);
            let bytes = match reader.read(want) {
                Ok(bytes) => bytes,
                Err(FifoError::Interrupted) => break,
                Err(e) => return Err(e),
            };
            if bytes.is_empty() {
                break;
            }
            received += bytes.len() as u64;
            if out.write_all(&bytes).is_err() {
                break;
            }
        }
        let _ = out.flush();
        Ok(received)
    });

    let writer = FifoWriter::open_with(&fifo, producer_token)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut buf = vec![0u8; chunk];
    let mut sent = 0u64;
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        match writer.write(&buf[..n]) {
            Ok(written) => sent += written as u64,
            Err(FifoError::BrokenPipe) | Err(FifoError::Interrupted) => break,
            Err(e) => return Err(e.into()),
        }
    }
    // end of stream for the consumer once the last producer is gone
    writer.close();

    let received = consumer.join().expect("consumer thread panicked")?;
    info!("pumped {} bytes in, {} bytes out", sent, received);
    Ok(())
}

fn spawn_signal_listener(tokens: Vec<CancelToken>) -> Result<(), io::Error> {
    let mut signals = Signals::new([libc::SIGHUP, libc::SIGINT, libc::SIGQUIT, libc::SIGTERM])?;
    thread::spawn(move || {
        let mut cancelled = false;
        for signal in signals.forever() {
            if cancelled {
                // a second signal stops waiting for clean drains
                process::exit(130);
            }
            cancelled = true;
            warn!("received signal {}, cancelling the transfer", signal);
            for token in &tokens {
                token.cancel();
            }
        }
    });
    Ok(())
}
