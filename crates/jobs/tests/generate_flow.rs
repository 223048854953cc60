use std::time::Duration;

use imagegen::backends::LocalBackend;
use jobs::{JobEvent, JobSpec, JobStatus, JobsRuntime};
use media_io::SlideshowOptions;
use project::{AssetStore, Project, ProjectRegistry};

fn test_project() -> Project {
    ProjectRegistry::builtin()
        .get("wedding-vision")
        .unwrap()
        .clone()
}

fn drain_until_settled(
    rx: &crossbeam_channel::Receiver<JobEvent>,
    id: &str,
) -> Vec<JobEvent> {
    let mut events = Vec::new();
    loop {
        let event = rx
            .recv_timeout(Duration::from_secs(30))
            .expect("job did not settle in time");
        let settled = event.id == id
            && matches!(
                event.status,
                JobStatus::Done(_) | JobStatus::Failed(_) | JobStatus::Canceled
            );
        events.push(event);
        if settled {
            return events;
        }
    }
}

#[test]
fn generate_job_emits_progress_then_done() {
    let tmp = tempfile::tempdir().unwrap();
    let store = AssetStore::new(tmp.path());
    let backend = Box::new(LocalBackend::new(3, 7.5, store.clone()));
    let handle = JobsRuntime::start(backend, None, SlideshowOptions::default());

    let project = test_project();
    let id = handle.enqueue(JobSpec::Generate {
        project: project.clone(),
        prompt: "a misty forest".to_string(),
    });

    let events = drain_until_settled(&handle.rx_events, &id);
    assert!(events
        .iter()
        .any(|e| matches!(e.status, JobStatus::Pending)));
    assert!(events
        .iter()
        .any(|e| matches!(e.status, JobStatus::Running)));
    let steps = events
        .iter()
        .filter(|e| matches!(e.status, JobStatus::Progress(_)))
        .count();
    assert_eq!(steps, 3);

    match &events.last().unwrap().status {
        JobStatus::Done(path) => {
            assert!(path.exists());
            assert!(path.starts_with(store.images_dir(&project)));
            assert_eq!(store.list_images(&project).len(), 1);
        }
        other => panic!("expected Done, got {other:?}"),
    }
}

#[test]
fn unreachable_enhancer_does_not_block_generation() {
    let tmp = tempfile::tempdir().unwrap();
    let store = AssetStore::new(tmp.path());
    let backend = Box::new(LocalBackend::new(2, 7.5, store.clone()));
    // Nothing listens on port 9; enhancement fails and falls back.
    let enhancer = imagegen::Enhancer::new("http://127.0.0.1:9", "llama3.2");
    let handle = JobsRuntime::start(backend, Some(enhancer), SlideshowOptions::default());

    let project = test_project();
    let id = handle.enqueue(JobSpec::Generate {
        project: project.clone(),
        prompt: "a quiet harbor".to_string(),
    });

    let events = drain_until_settled(&handle.rx_events, &id);
    assert!(matches!(
        events.last().unwrap().status,
        JobStatus::Done(_)
    ));
    assert!(events.iter().any(|e| matches!(
        &e.status,
        JobStatus::Stage(stage) if stage == "using original prompt"
    )));
    assert_eq!(store.list_images(&project).len(), 1);
}

#[test]
fn assemble_with_no_images_fails_without_output() {
    let tmp = tempfile::tempdir().unwrap();
    let store = AssetStore::new(tmp.path());
    let backend = Box::new(LocalBackend::new(2, 7.5, store));
    let handle = JobsRuntime::start(backend, None, SlideshowOptions::default());

    let output = tmp.path().join("out.mp4");
    let id = handle.enqueue(JobSpec::Assemble {
        images: Vec::new(),
        audio: None,
        captions: None,
        output: output.clone(),
    });

    let events = drain_until_settled(&handle.rx_events, &id);
    match &events.last().unwrap().status {
        JobStatus::Failed(message) => assert!(message.contains("no images")),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(!output.exists());
}

#[test]
fn queued_job_can_be_canceled_before_it_starts() {
    let tmp = tempfile::tempdir().unwrap();
    let store = AssetStore::new(tmp.path());
    let backend = Box::new(LocalBackend::new(10, 7.5, store));
    let handle = JobsRuntime::start(backend, None, SlideshowOptions::default());

    let project = test_project();
    let first = handle.enqueue(JobSpec::Generate {
        project: project.clone(),
        prompt: "first".to_string(),
    });
    let second = handle.enqueue(JobSpec::Generate {
        project,
        prompt: "second".to_string(),
    });
    handle.cancel(&second);

    let events = drain_until_settled(&handle.rx_events, &second);
    assert!(matches!(
        events.last().unwrap().status,
        JobStatus::Canceled
    ));
    assert!(!events
        .iter()
        .any(|e| e.id == second && matches!(e.status, JobStatus::Running)));
    // The first job is unaffected by the cancel.
    assert!(events
        .iter()
        .any(|e| e.id == first && matches!(e.status, JobStatus::Running | JobStatus::Done(_))));
}
