use crossbeam_channel::Sender;

/// Discrete progress notifications pushed by a backend while it
/// works. The remote variant emits coarse stages; the local variant
/// emits one `Step` per denoising pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Stage(String),
    Step { current: u32, total: u32 },
}

/// Best-effort sender handed to `ImageBackend::generate`. A dropped
/// receiver must never fail the generation, so sends ignore errors.
#[derive(Clone)]
pub struct ProgressSink {
    tx: Option<Sender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that drops everything, for callers that don't care.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn stage(&self, stage: impl Into<String>) {
        self.send(ProgressEvent::Stage(stage.into()));
    }

    pub fn step(&self, current: u32, total: u32) {
        self.send(ProgressEvent::Step { current, total });
    }
}
