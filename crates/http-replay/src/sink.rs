// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::io::{self, Write};

use parking_lot::Mutex;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

use crate::telemetry::TelemetryRecord;

/// Append target for telemetry records. Implementations serialize writes so
/// records submitted from concurrent workers never interleave.
pub trait TelemetrySink: Send + Sync + 'static {
    fn submit(&self, record: &TelemetryRecord) -> io::Result<()>;
}

/// Writes one line per record to any [`Write`] target.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterSink<NonBlocking> {
    /// Hands every line to a background thread that owns `writer`, so
    /// workers never block on file or terminal I/O. Lines are never dropped;
    /// submission only waits if the hand-off buffer is full. Pending lines
    /// are written out when the returned guard is dropped.
    pub fn non_blocking<T: Write + Send + 'static>(writer: T) -> (Self, WorkerGuard) {
        let (writer, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .finish(writer);
        (Self::new(writer), guard)
    }
}

impl<W: Write + Send + 'static> TelemetrySink for WriterSink<W> {
    fn submit(&self, record: &TelemetryRecord) -> io::Result<()> {
        let line = format!("{record}\n");
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.flush()
    }
}

/// Keeps records in memory, in submission order.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl TelemetrySink for MemorySink {
    fn submit(&self, record: &TelemetryRecord) -> io::Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Discards everything.
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn submit(&self, _record: &TelemetryRecord) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct SharedBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(url: &str) -> TelemetryRecord {
        TelemetryRecord {
            method: "GET".into(),
            url: url.into(),
            elapsed: Duration::from_millis(5),
            cpu_delta: 0.0,
            mem_delta: 0.0,
            error: None,
        }
    }

    #[test]
    fn non_blocking_sink_writes_everything_once_the_guard_drops() {
        let buffer = SharedBuffer::default();
        let (sink, guard) = WriterSink::non_blocking(buffer.clone());
        for i in 0..100 {
            sink.submit(&record(&format!("/r/{i}"))).unwrap();
        }
        drop(guard);

        let out = String::from_utf8(buffer.0.lock().clone()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 100);
        assert!(lines[99].starts_with("request_method:GET;;request_url:/r/99;;"));
    }

    #[test]
    fn writer_sink_terminates_each_record() {
        let sink = WriterSink::new(Vec::new());
        for url in ["/a", "/b"] {
            sink.submit(&TelemetryRecord {
                method: "GET".into(),
                url: url.into(),
                elapsed: Duration::from_millis(5),
                cpu_delta: 0.0,
                mem_delta: 0.0,
                error: None,
            })
            .unwrap();
        }

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("request_method:GET;;request_url:/a;;"));
        assert!(lines[1].starts_with("request_method:GET;;request_url:/b;;"));
    }
}
