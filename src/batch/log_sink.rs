//! Single-consumer sink serializing status lines from concurrent jobs.

use std::io::{self, Write};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};

use crate::error::{SimError, SimResult, panic_message};

const SINK_THREAD: &str = "log-sink";

/// How [`LogSink::stop`] treats lines still queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Write every line sent before the stop request, then exit.
    Drain,
    /// Exit without writing queued lines.
    Immediate,
}

/// Cloneable producer side of a [`LogSink`].
///
/// Sending never blocks; lines sent after the sink stopped are dropped.
#[derive(Debug, Clone)]
pub struct LogHandle {
    tx: Sender<String>,
}

impl LogHandle {
    pub fn send(&self, line: impl Into<String>) {
        let _ = self.tx.send(line.into());
    }
}

/// Owns the consumer thread writing status lines to one writer.
///
/// Exactly one consumer exists per sink; producers obtain [`LogHandle`]s.
#[derive(Debug)]
pub struct LogSink {
    tx: Sender<String>,
    control_tx: Sender<StopMode>,
    join: Option<JoinHandle<io::Result<usize>>>,
}

impl LogSink {
    /// Spawns the consumer thread writing to `writer`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Io` if the thread cannot be spawned.
    pub fn start<W: Write + Send + 'static>(writer: W) -> SimResult<Self> {
        let (tx, rx) = unbounded::<String>();
        let (control_tx, control_rx) = bounded::<StopMode>(1);
        let join = thread::Builder::new()
            .name(SINK_THREAD.to_string())
            .spawn(move || consume(writer, rx, control_rx))
            .map_err(|e| SimError::io(SINK_THREAD, e))?;
        Ok(Self {
            tx,
            control_tx,
            join: Some(join),
        })
    }

    pub fn handle(&self) -> LogHandle {
        LogHandle {
            tx: self.tx.clone(),
        }
    }

    /// Stops the consumer and returns the number of lines written.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Io` if writing failed and `SimError::Panicked` if
    /// the consumer thread panicked.
    pub fn stop(mut self, mode: StopMode) -> SimResult<usize> {
        self.shutdown(mode)
    }

    fn shutdown(&mut self, mode: StopMode) -> SimResult<usize> {
        let Some(join) = self.join.take() else {
            return Ok(0);
        };
        // The consumer may already have exited after a write error.
        let _ = self.control_tx.send(mode);
        match join.join() {
            Ok(written) => written.map_err(|e| SimError::io(SINK_THREAD, e)),
            Err(payload) => Err(SimError::Panicked {
                name: SINK_THREAD.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        let _ = self.shutdown(StopMode::Drain);
    }
}

fn consume<W: Write>(
    mut writer: W,
    lines: Receiver<String>,
    control: Receiver<StopMode>,
) -> io::Result<usize> {
    let mut written = 0;
    loop {
        select! {
            recv(lines) -> msg => {
                match msg {
                    Ok(line) => {
                        writeln!(writer, "{line}")?;
                        written += 1;
                    }
                    Err(_) => break,
                }
            }
            recv(control) -> mode => {
                if mode != Ok(StopMode::Immediate) {
                    for line in lines.try_iter() {
                        writeln!(writer, "{line}")?;
                        written += 1;
                    }
                }
                break;
            }
        }
    }
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            self.0
                .lock()
                .map(|b| String::from_utf8_lossy(&b).into_owned())
                .unwrap_or_default()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .map_err(|_| io::Error::other("poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn drain_delivers_every_line_sent_before_stop() {
        let buf = SharedBuf::default();
        let sink = LogSink::start(buf.clone()).expect("start");
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let log = sink.handle();
                thread::spawn(move || {
                    for i in 0..50 {
                        log.send(format!("p{p} line {i}"));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().expect("producer");
        }
        assert_eq!(sink.stop(StopMode::Drain).expect("stop"), 200);
        let text = buf.text();
        assert_eq!(text.lines().count(), 200);
        assert!(text.contains("p3 line 49"));
    }

    #[test]
    fn lines_are_never_interleaved() {
        let buf = SharedBuf::default();
        let sink = LogSink::start(buf.clone()).expect("start");
        let log = sink.handle();
        let worker = thread::spawn(move || {
            for _ in 0..100 {
                log.send("aaaaaaaaaaaaaaaaaaaa");
            }
        });
        for _ in 0..100 {
            sink.handle().send("bbbbbbbbbbbbbbbbbbbb");
        }
        worker.join().expect("worker");
        sink.stop(StopMode::Drain).expect("stop");
        assert!(
            buf.text()
                .lines()
                .all(|l| l == "aaaaaaaaaaaaaaaaaaaa" || l == "bbbbbbbbbbbbbbbbbbbb")
        );
    }

    #[test]
    fn immediate_stop_returns() {
        let sink = LogSink::start(SharedBuf::default()).expect("start");
        sink.handle().send("maybe lost");
        let written = sink.stop(StopMode::Immediate).expect("stop");
        assert!(written <= 1);
    }

    #[test]
    fn send_after_stop_is_ignored() {
        let sink = LogSink::start(SharedBuf::default()).expect("start");
        let log = sink.handle();
        sink.stop(StopMode::Drain).expect("stop");
        log.send("late");
    }

    #[test]
    fn drop_drains() {
        let buf = SharedBuf::default();
        {
            let sink = LogSink::start(buf.clone()).expect("start");
            sink.handle().send("kept");
        }
        assert_eq!(buf.text(), "kept\n");
    }
}
