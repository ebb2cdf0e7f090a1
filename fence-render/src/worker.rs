//! Background render worker thread

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use fence_core::{Delimiter, Diagnostic};
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use crate::change::ChangeDetector;
use crate::orchestrator::{Orchestrator, RenderedRegion};

/// Buffer snapshot to delimit and render
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub buffer: usize,
    pub draw_number: u64,
    pub lines: Vec<String>,
}

/// Results for one buffer snapshot
#[derive(Debug, Clone)]
pub struct RenderUpdate {
    pub buffer: usize,
    pub draw_number: u64,
    /// Previous artifacts for this buffer should be cleared before drawing these
    pub clear: bool,
    pub results: Vec<RenderedRegion>,
    /// Parse and render problems found in this snapshot
    pub diagnostics: Vec<Diagnostic>,
}

impl RenderUpdate {
    /// Whether a newer draw has already been requested for this buffer
    pub fn is_stale(&self, current_draw: u64) -> bool {
        self.draw_number < current_draw
    }
}

/// Render worker handle
pub struct RenderWorker {
    request_tx: Sender<RenderRequest>,
    update_rx: Receiver<RenderUpdate>,
    _worker_thread: thread::JoinHandle<()>,
}

impl RenderWorker {
    /// Spawn a worker thread that owns `orchestrator`
    pub fn spawn(orchestrator: Orchestrator, delimiter: Delimiter) -> Self {
        let (request_tx, request_rx) = crossbeam_channel::unbounded();
        let (update_tx, update_rx) = crossbeam_channel::unbounded();

        let worker_thread = thread::spawn(move || {
            worker_loop(orchestrator, delimiter, request_rx, update_tx);
        });

        Self {
            request_tx,
            update_rx,
            _worker_thread: worker_thread,
        }
    }

    pub fn request(&self, req: RenderRequest) {
        let _ = self.request_tx.send(req);
    }

    /// Try to receive an update (non-blocking)
    pub fn try_recv_update(&self) -> Option<RenderUpdate> {
        self.update_rx.try_recv().ok()
    }

    pub fn recv_update_timeout(&self, timeout: Duration) -> Option<RenderUpdate> {
        self.update_rx.recv_timeout(timeout).ok()
    }
}

fn worker_loop(
    orchestrator: Orchestrator,
    delimiter: Delimiter,
    request_rx: Receiver<RenderRequest>,
    update_tx: Sender<RenderUpdate>,
) {
    let mut pending: HashMap<usize, RenderRequest> = HashMap::new();
    let mut detectors: HashMap<usize, ChangeDetector> = HashMap::new();
    let mut last_request = Instant::now();
    let coalesce_window = Duration::from_millis(75);

    loop {
        match request_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(req) => {
                // Keep only the newest draw per buffer
                let newer = pending
                    .get(&req.buffer)
                    .map_or(true, |p| req.draw_number >= p.draw_number);
                if newer {
                    pending.insert(req.buffer, req);
                }
                last_request = Instant::now();
            }
            Err(RecvTimeoutError::Timeout) => {
                if pending.is_empty() || last_request.elapsed() < coalesce_window {
                    continue;
                }
                for (buffer, req) in pending.drain() {
                    let detector = detectors.entry(buffer).or_default();
                    let update = process(&orchestrator, &delimiter, detector, req);
                    if update_tx.send(update).is_err() {
                        return;
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn process(
    orchestrator: &Orchestrator,
    delimiter: &Delimiter,
    detector: &mut ChangeDetector,
    req: RenderRequest,
) -> RenderUpdate {
    let delimited = delimiter.delimit(&req.lines);
    let mut diagnostics: Vec<Diagnostic> = delimited
        .errors
        .iter()
        .map(|error| error.diagnostic())
        .collect();
    for diagnostic in &diagnostics {
        diagnostic.log();
    }

    let batch = orchestrator.render_tracked(detector, delimited.regions);
    log::debug!(
        "buffer {} draw {}: {} regions{}",
        req.buffer,
        req.draw_number,
        batch.results.len(),
        if batch.unchanged { " (unchanged)" } else { "" }
    );
    diagnostics.extend(batch.diagnostics());

    RenderUpdate {
        buffer: req.buffer,
        draw_number: req.draw_number,
        clear: !batch.unchanged,
        results: batch.results,
        diagnostics,
    }
}
