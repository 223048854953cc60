use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::backend::Backend;
use ratatui::Terminal;
use tracing::{info, warn};

use jobs::{JobEvent, JobKind, JobSpec, JobStatus, JobsHandle};
use project::{store, AssetStore, Project, ProjectRegistry};

use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Splash,
    Main,
}

/// Modal input/overlay state on the main screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    None,
    /// Typing a generation prompt.
    Prompt,
    /// Typing one caption per selected image before assembly.
    Caption { index: usize, captions: Vec<String> },
    /// Watching the running job.
    Progress,
}

#[derive(Debug, Clone)]
pub struct ActiveJob {
    pub id: String,
    pub kind: JobKind,
    pub stage: String,
    pub progress: Option<f32>,
}

pub struct App {
    registry: ProjectRegistry,
    store: AssetStore,
    jobs: JobsHandle,

    pub screen: Screen,
    pub overlay: Overlay,
    pub current: usize,
    pub images: Vec<PathBuf>,
    pub selected: BTreeSet<usize>,
    pub cursor: usize,
    pub input: String,
    pub status: String,
    pub active_job: Option<ActiveJob>,
    should_quit: bool,
}

impl App {
    pub fn new(
        registry: ProjectRegistry,
        store: AssetStore,
        jobs: JobsHandle,
        with_splash: bool,
    ) -> Self {
        let mut app = Self {
            registry,
            store,
            jobs,
            screen: if with_splash { Screen::Splash } else { Screen::Main },
            overlay: Overlay::None,
            current: 0,
            images: Vec::new(),
            selected: BTreeSet::new(),
            cursor: 0,
            input: String::new(),
            status: "Ready".to_string(),
            active_job: None,
            should_quit: false,
        };
        app.refresh_images();
        app
    }

    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        while !self.should_quit {
            self.poll_jobs();
            terminal.draw(|frame| ui::draw(frame, self))?;
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn project(&self) -> &Project {
        self.registry
            .iter()
            .nth(self.current)
            .expect("current project index in range")
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    pub fn refresh_images(&mut self) {
        let project = self.project().clone();
        self.images = self.store.list_images(&project);
        if self.cursor >= self.images.len() {
            self.cursor = self.images.len().saturating_sub(1);
        }
        self.selected.retain(|i| *i < self.images.len());
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        if self.screen == Screen::Splash {
            if matches!(
                code,
                KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Esc | KeyCode::Char('q')
            ) {
                self.screen = Screen::Main;
            }
            return;
        }

        match &self.overlay {
            Overlay::Prompt => self.handle_prompt_key(code),
            Overlay::Caption { .. } => self.handle_caption_key(code),
            Overlay::Progress => {
                if matches!(code, KeyCode::Esc) {
                    // The job keeps running; the status bar tracks it.
                    self.overlay = Overlay::None;
                }
            }
            Overlay::None => self.handle_main_key(code),
        }
    }

    fn handle_main_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char(c @ '1'..='9') => {
                let index = (c as usize) - ('1' as usize);
                self.switch_project(index);
            }
            KeyCode::Char('g') => {
                self.input.clear();
                self.overlay = Overlay::Prompt;
                self.status = "Enter prompt, then press Enter".to_string();
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1),
            KeyCode::Char('s') => self.toggle_selected(),
            KeyCode::Char('a') => self.select_all(),
            KeyCode::Esc => {
                self.selected.clear();
                self.status = "Selection cleared".to_string();
            }
            KeyCode::Char('d') => self.delete_selected(),
            KeyCode::Char('v') => self.start_assemble(None),
            KeyCode::Char('c') => self.start_captions(),
            KeyCode::Char('o') => self.show_audio_info(),
            KeyCode::Char('b') => self.browse_exports(),
            _ => {}
        }
    }

    fn handle_prompt_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.input.clear();
                self.overlay = Overlay::None;
                self.status = "Ready".to_string();
            }
            KeyCode::Enter => self.submit_generate(),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }

    fn handle_caption_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.input.clear();
                self.overlay = Overlay::None;
                self.status = "Captions canceled".to_string();
            }
            KeyCode::Enter => {
                let Overlay::Caption { index, captions } = &mut self.overlay else {
                    return;
                };
                captions.push(std::mem::take(&mut self.input));
                *index += 1;
                let done = *index >= self.selected.len();
                let position = *index + 1;
                if done {
                    let captions = captions.clone();
                    self.overlay = Overlay::None;
                    self.start_assemble(Some(captions));
                } else {
                    self.status = format!("Caption {position} of {}", self.selected.len());
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }

    fn switch_project(&mut self, index: usize) {
        if index >= self.registry.len() || index == self.current {
            return;
        }
        self.current = index;
        self.selected.clear();
        self.cursor = 0;
        self.refresh_images();
        self.status = format!("Switched to {}", self.project().name);
    }

    fn move_cursor(&mut self, delta: i64) {
        if self.images.is_empty() {
            return;
        }
        let last = self.images.len() as i64 - 1;
        self.cursor = (self.cursor as i64 + delta).clamp(0, last) as usize;
    }

    fn toggle_selected(&mut self) {
        if self.images.is_empty() {
            return;
        }
        if !self.selected.remove(&self.cursor) {
            self.selected.insert(self.cursor);
        }
    }

    fn select_all(&mut self) {
        self.selected = (0..self.images.len()).collect();
        self.status = format!("Selected {} images", self.images.len());
    }

    fn delete_selected(&mut self) {
        if self.selected.is_empty() {
            self.status = "No images selected".to_string();
            return;
        }
        let project = self.project().clone();
        let mut deleted = 0usize;
        for index in self.selected.iter().rev() {
            let Some(path) = self.images.get(*index) else { continue };
            match self.store.delete_image(&project, path) {
                Ok(()) => deleted += 1,
                Err(e) => warn!(error = %e, "delete failed"),
            }
        }
        self.selected.clear();
        self.refresh_images();
        self.status = format!("Deleted {deleted} images");
    }

    fn submit_generate(&mut self) {
        let prompt = self.input.trim().to_string();
        if prompt.is_empty() {
            self.status = "Enter a prompt first".to_string();
            return;
        }
        if self.active_job.is_some() {
            self.status = "A job is already running".to_string();
            return;
        }
        let project = self.project().clone();
        info!(project = %project.slug, "generation requested");
        let id = self.jobs.enqueue(JobSpec::Generate {
            project: project.clone(),
            prompt,
        });
        self.active_job = Some(ActiveJob {
            id,
            kind: JobKind::Generate,
            stage: format!("Generating with {}", project.name),
            progress: None,
        });
        self.input.clear();
        self.overlay = Overlay::Progress;
    }

    fn start_captions(&mut self) {
        if self.selected.is_empty() {
            self.status = "Select images first (press 'a' for all)".to_string();
            return;
        }
        self.input.clear();
        self.overlay = Overlay::Caption {
            index: 0,
            captions: Vec::new(),
        };
        self.status = format!("Caption 1 of {}", self.selected.len());
    }

    fn start_assemble(&mut self, captions: Option<Vec<String>>) {
        if self.selected.is_empty() {
            self.status = "Select images first (press 'a' for all)".to_string();
            return;
        }
        if self.active_job.is_some() {
            self.status = "A job is already running".to_string();
            return;
        }
        let project = self.project().clone();
        if let Err(e) = self.store.ensure_dirs(&project) {
            self.status = format!("Error: {e}");
            return;
        }

        // Gallery order; BTreeSet iteration is already sorted.
        let images: Vec<PathBuf> = self
            .selected
            .iter()
            .filter_map(|i| self.images.get(*i).cloned())
            .collect();
        let audio = self.store.list_audio(&project).into_iter().next();
        let output = self.store.exports_dir(&project).join(store::export_filename());

        info!(project = %project.slug, images = images.len(), "assembly requested");
        let id = self.jobs.enqueue(JobSpec::Assemble {
            images,
            audio,
            captions,
            output,
        });
        self.active_job = Some(ActiveJob {
            id,
            kind: JobKind::Assemble,
            stage: "Creating video".to_string(),
            progress: None,
        });
        self.overlay = Overlay::Progress;
    }

    fn show_audio_info(&mut self) {
        let project = self.project().clone();
        let audio = self.store.list_audio(&project);
        match audio.first() {
            None => {
                self.status = format!("Add audio files to: {}", self.store.audio_dir(&project).display());
            }
            Some(first) => {
                let name = first.file_name().unwrap_or_default().to_string_lossy();
                match media_io::probe_media(first) {
                    Ok(info) => {
                        let secs = info.duration_seconds.unwrap_or(0.0);
                        self.status =
                            format!("{} audio files; next video uses {name} ({secs:.0}s)", audio.len());
                    }
                    Err(_) => {
                        self.status = format!("{} audio files; next video uses {name}", audio.len());
                    }
                }
            }
        }
    }

    fn browse_exports(&mut self) {
        let project = self.project().clone();
        let dir = self.store.exports_dir(&project);
        if let Err(e) = self.store.ensure_dirs(&project) {
            self.status = format!("Error: {e}");
            return;
        }
        match open::that(&dir) {
            Ok(()) => self.status = format!("Opened {}", dir.display()),
            Err(e) => self.status = format!("Error opening folder: {e}"),
        }
    }

    /// Drain job events; called once per UI tick. The gallery list is
    /// only ever mutated here and in key handlers, on this thread.
    pub fn poll_jobs(&mut self) {
        while let Ok(event) = self.jobs.rx_events.try_recv() {
            self.apply_job_event(event);
        }
    }

    fn apply_job_event(&mut self, event: JobEvent) {
        let is_active = self
            .active_job
            .as_ref()
            .map(|j| j.id == event.id)
            .unwrap_or(false);
        match event.status {
            JobStatus::Pending | JobStatus::Running => {}
            JobStatus::Stage(stage) => {
                if let Some(job) = self.active_job.as_mut() {
                    if is_active {
                        job.stage = stage;
                    }
                }
            }
            JobStatus::Progress(fraction) => {
                if let Some(job) = self.active_job.as_mut() {
                    if is_active {
                        job.progress = Some(fraction);
                    }
                }
            }
            JobStatus::Done(path) => {
                if is_active {
                    self.finish_job();
                }
                let name = path.file_name().unwrap_or_default().to_string_lossy();
                self.status = match event.kind {
                    JobKind::Generate => format!("Generated {name}"),
                    JobKind::Assemble => format!("Video saved: {name}"),
                };
                self.refresh_images();
            }
            JobStatus::Failed(message) => {
                if is_active {
                    self.finish_job();
                }
                let mut short = message.replace('\n', " ");
                if short.len() > 120 {
                    short.truncate(120);
                }
                self.status = format!("Error: {short}");
            }
            JobStatus::Canceled => {
                if is_active {
                    self.finish_job();
                }
                self.status = "Job canceled".to_string();
            }
        }
    }

    fn finish_job(&mut self) {
        self.active_job = None;
        if self.overlay == Overlay::Progress {
            self.overlay = Overlay::None;
        }
    }
}
