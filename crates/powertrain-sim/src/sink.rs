//! Telemetry sinks and the reporter task feeding them.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::driver::SimulationFrame;
use crate::error::SinkError;
use crate::point::{PointLayout, TelemetryPoint};

/// Destination for telemetry points, e.g. a time-series database writer.
#[async_trait]
pub trait TelemetrySink: Send {
    async fn write(&mut self, point: TelemetryPoint) -> Result<(), SinkError>;

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[async_trait]
impl<S: TelemetrySink + ?Sized> TelemetrySink for Box<S> {
    async fn write(&mut self, point: TelemetryPoint) -> Result<(), SinkError> {
        (**self).write(point).await
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush().await
    }
}

/// Forwards points to an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<TelemetryPoint>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<TelemetryPoint>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end of a channel of `capacity` points.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TelemetryPoint>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl TelemetrySink for ChannelSink {
    async fn write(&mut self, point: TelemetryPoint) -> Result<(), SinkError> {
        self.tx.send(point).await.map_err(|_closed| SinkError::Closed)
    }
}

/// Emits each point as a `debug` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl TelemetrySink for TracingSink {
    async fn write(&mut self, point: TelemetryPoint) -> Result<(), SinkError> {
        debug!(measurement = %point.measurement, point = %point, "Telemetry point");
        Ok(())
    }
}

/// Writes one JSON document per line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> TelemetrySink for JsonLinesSink<W> {
    async fn write(&mut self, point: TelemetryPoint) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&point).map_err(|e| SinkError::Write(e.to_string()))?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .await
            .map_err(|e| SinkError::Write(e.to_string()))
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.writer
            .flush()
            .await
            .map_err(|e| SinkError::Write(e.to_string()))
    }
}

/// Counters reported by the reporter task when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterStats {
    pub points_written: u64,
    pub sink_failures: u64,
}

/// Convert every frame to points per `layout` and write them, until the
/// frame channel closes. Sink failures are logged and counted per point,
/// never fatal.
pub async fn run_reporter<S: TelemetrySink>(
    mut frames: mpsc::Receiver<SimulationFrame>,
    mut sink: S,
    simulation_id: String,
    layout: PointLayout,
) -> ReporterStats {
    let mut stats = ReporterStats::default();

    while let Some(frame) = frames.recv().await {
        for point in layout.points(&frame, &simulation_id) {
            match sink.write(point).await {
                Ok(()) => stats.points_written += 1,
                Err(e) => {
                    stats.sink_failures += 1;
                    warn!(tick = frame.tick, error = %e, "Error writing telemetry point");
                }
            }
        }
    }

    if let Err(e) = sink.flush().await {
        stats.sink_failures += 1;
        warn!(error = %e, "Error flushing telemetry sink");
    }

    debug!(
        written = stats.points_written,
        failures = stats.sink_failures,
        "Reporter stopped"
    );
    stats
}
