use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{error, warn};
use uuid::Uuid;

use imagegen::{Enhancer, ImageBackend, ProgressEvent, ProgressSink};
use media_io::{assemble_slideshow, SlideshowOptions};
use project::Project;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Generate,
    Assemble,
}

#[derive(Debug, Clone)]
pub enum JobSpec {
    Generate {
        project: Project,
        prompt: String,
    },
    Assemble {
        images: Vec<PathBuf>,
        audio: Option<PathBuf>,
        captions: Option<Vec<String>>,
        output: PathBuf,
    },
}

impl JobSpec {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Generate { .. } => JobKind::Generate,
            Self::Assemble { .. } => JobKind::Assemble,
        }
    }
}

#[derive(Debug, Clone)]
pub enum JobStatus {
    Pending,
    Running,
    /// Coarse phase line ("polling", "encoding", ...).
    Stage(String),
    /// Fractional completion in `[0, 1]`.
    Progress(f32),
    Done(PathBuf),
    Failed(String),
    Canceled,
}

#[derive(Debug, Clone)]
pub struct JobEvent {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
}

#[derive(Clone)]
pub struct JobsHandle {
    tx_submit: Sender<(String, JobSpec)>,
    tx_cancel: Sender<String>,
    pub rx_events: Receiver<JobEvent>,
}

impl JobsHandle {
    pub fn enqueue(&self, spec: JobSpec) -> String {
        let id = Uuid::new_v4().to_string();
        let _ = self.tx_submit.send((id.clone(), spec));
        id
    }

    /// Drops the job if it has not started. An in-flight job runs to
    /// completion; its temp-then-rename writes keep an abandoned task
    /// from surfacing a partial file.
    pub fn cancel(&self, job_id: &str) {
        let _ = self.tx_cancel.send(job_id.to_string());
    }
}

pub struct JobsRuntime;

impl JobsRuntime {
    /// Spawn the single worker. One generation or assembly runs at a
    /// time; the queue serializes anything submitted meanwhile.
    pub fn start(
        backend: Box<dyn ImageBackend>,
        enhancer: Option<Enhancer>,
        slideshow: SlideshowOptions,
    ) -> JobsHandle {
        let (tx_submit, rx_submit) = unbounded::<(String, JobSpec)>();
        let (tx_cancel, rx_cancel) = unbounded::<String>();
        let (tx_events, rx_events) = unbounded::<JobEvent>();

        thread::spawn(move || {
            worker_loop(backend, enhancer, slideshow, rx_submit, rx_cancel, tx_events)
        });

        JobsHandle {
            tx_submit,
            tx_cancel,
            rx_events,
        }
    }
}

fn worker_loop(
    backend: Box<dyn ImageBackend>,
    enhancer: Option<Enhancer>,
    slideshow: SlideshowOptions,
    rx_submit: Receiver<(String, JobSpec)>,
    rx_cancel: Receiver<String>,
    tx_events: Sender<JobEvent>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "jobs worker failed to build runtime");
            return;
        }
    };

    let mut queue: VecDeque<(String, JobSpec)> = VecDeque::new();
    let mut canceled: HashSet<String> = HashSet::new();
    loop {
        crossbeam_channel::select! {
            recv(rx_submit) -> msg => {
                match msg {
                    Ok((id, spec)) => {
                        let _ = tx_events.send(JobEvent {
                            id: id.clone(),
                            kind: spec.kind(),
                            status: JobStatus::Pending,
                        });
                        queue.push_back((id, spec));
                    }
                    Err(_) => break,
                }
            }
            recv(rx_cancel) -> msg => {
                match msg {
                    Ok(id) => { canceled.insert(id); }
                    Err(_) => break,
                }
            }
            default(Duration::from_millis(10)) => {
                // Pick up any cancels that raced the queue pop.
                while let Ok(id) = rx_cancel.try_recv() {
                    canceled.insert(id);
                }
                let Some((id, spec)) = queue.pop_front() else { continue };
                let kind = spec.kind();
                if canceled.remove(&id) {
                    let _ = tx_events.send(JobEvent { id, kind, status: JobStatus::Canceled });
                    continue;
                }
                let _ = tx_events.send(JobEvent {
                    id: id.clone(),
                    kind,
                    status: JobStatus::Running,
                });
                let result = execute_job(
                    &runtime,
                    backend.as_ref(),
                    enhancer.as_ref(),
                    &slideshow,
                    &id,
                    spec,
                    &tx_events,
                );
                let status = match result {
                    Ok(path) => JobStatus::Done(path),
                    Err(e) => {
                        warn!(job = %id, error = %e, "job failed");
                        JobStatus::Failed(e.to_string())
                    }
                };
                let _ = tx_events.send(JobEvent { id, kind, status });
            }
        }
    }
}

fn execute_job(
    runtime: &tokio::runtime::Runtime,
    backend: &dyn ImageBackend,
    enhancer: Option<&Enhancer>,
    slideshow: &SlideshowOptions,
    id: &str,
    spec: JobSpec,
    tx_events: &Sender<JobEvent>,
) -> Result<PathBuf> {
    match spec {
        JobSpec::Generate { project, prompt } => {
            let (tx_progress, rx_progress) = unbounded::<ProgressEvent>();
            let forwarder = spawn_forwarder(id.to_string(), rx_progress, tx_events.clone());

            let path = runtime.block_on(async {
                let prompt = match enhancer {
                    Some(enhancer) => {
                        let improved =
                            enhancer.enhance(&prompt, Some(&project.description)).await;
                        if improved == prompt {
                            send_stage(tx_events, id, "using original prompt");
                        } else {
                            send_stage(tx_events, id, "prompt enhanced");
                        }
                        improved
                    }
                    None => prompt,
                };
                let sink = ProgressSink::new(tx_progress);
                backend.generate(&project, &prompt, &sink).await
            });
            // Sink is dropped, so the forwarder's channel has closed.
            let _ = forwarder.join();
            path.with_context(|| format!("generation with {}", backend.name()))
        }
        JobSpec::Assemble {
            images,
            audio,
            captions,
            output,
        } => {
            send_stage(tx_events, id, "encoding");
            let options = SlideshowOptions {
                captions,
                ..slideshow.clone()
            };
            let path = assemble_slideshow(&images, audio.as_deref(), &output, &options)?;
            Ok(path)
        }
    }
}

fn spawn_forwarder(
    id: String,
    rx_progress: Receiver<ProgressEvent>,
    tx_events: Sender<JobEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for event in rx_progress {
            let status = match event {
                ProgressEvent::Stage(stage) => JobStatus::Stage(stage),
                ProgressEvent::Step { current, total } => {
                    JobStatus::Progress(current as f32 / total.max(1) as f32)
                }
            };
            let _ = tx_events.send(JobEvent {
                id: id.clone(),
                kind: JobKind::Generate,
                status,
            });
        }
    })
}

fn send_stage(tx_events: &Sender<JobEvent>, id: &str, stage: &str) {
    let _ = tx_events.send(JobEvent {
        id: id.to_string(),
        kind: JobKind::Generate,
        status: JobStatus::Stage(stage.to_string()),
    });
}
