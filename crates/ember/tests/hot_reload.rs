use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use futures::stream;
use tokio::sync::broadcast;
use ember::engine::{ReloadCoordinator, ReloadOutcome, ReloadScheduler};
use ember::serve::{RequestLoop, TextPresenter};
use ember::{JsonModelLoader, ModelWatcher};

const MALE: &str = "3 male 22 1 0 7.25 S";
const FEMALE: &str = "1,female,38,1,0,71.2833,C";

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

struct Session {
    _dir: tempfile::TempDir,
    model: PathBuf,
    coordinator: Arc<ReloadCoordinator<JsonModelLoader>>,
    scheduler: ReloadScheduler,
    watcher: ModelWatcher,
    outcomes: broadcast::Receiver<ReloadOutcome>,
}

impl Session {
    async fn start(initial: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.json");
        fs::copy(fixture(initial), &model).unwrap();

        let coordinator = Arc::new(ReloadCoordinator::load(JsonModelLoader, model.clone()).await.unwrap());
        let outcomes = coordinator.subscribe();
        let scheduler = ReloadScheduler::spawn(coordinator.clone(), Duration::from_millis(100));
        let watcher = ModelWatcher::spawn(&model, scheduler.signal()).unwrap();

        Self { _dir: dir, model, coordinator, scheduler, watcher, outcomes }
    }

    /// Probability of survival the current model assigns to `line`.
    fn survival(&self, line: &str) -> f64 {
        let handle = self.coordinator.current();
        let sample = handle.schema().parse_line(line).unwrap().unwrap();
        handle.evaluate(&sample).unwrap().probabilities[1].probability
    }

    async fn next_outcome(&mut self) -> ReloadOutcome {
        tokio::time::timeout(Duration::from_secs(10), self.outcomes.recv())
            .await
            .expect("no reload within 10s")
            .unwrap()
    }

    async fn stop(self) {
        self.watcher.stop().await;
        self.scheduler.stop().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overwritten_model_is_picked_up() {
    let mut session = Session::start("titanic_logistic.json").await;
    let before = session.survival(MALE);

    fs::write(&session.model, fs::read(fixture("titanic_forest.json")).unwrap()).unwrap();

    let outcome = session.next_outcome().await;
    assert!(outcome.is_reloaded(), "unexpected {outcome:?}");
    assert!(session.coordinator.generation() >= 2);
    assert!((session.survival(MALE) - 0.16).abs() < 1e-9);
    assert!((session.survival(MALE) - before).abs() > 1e-3);

    session.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_model_replaced_by_rename_is_picked_up() {
    let mut session = Session::start("titanic_logistic.json").await;

    let staged = session.model.with_extension("json.tmp");
    fs::copy(fixture("titanic_forest.json"), &staged).unwrap();
    fs::rename(&staged, &session.model).unwrap();

    let outcome = session.next_outcome().await;
    assert!(outcome.is_reloaded(), "unexpected {outcome:?}");
    assert!((session.survival(FEMALE) - 0.85).abs() < 1e-9);

    session.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_corrupt_replacement_keeps_previous_model() {
    let mut session = Session::start("titanic_forest.json").await;
    let generation = session.coordinator.generation();
    let instance = session.coordinator.current().instance();

    fs::write(&session.model, fs::read(fixture("corrupt_model.json")).unwrap()).unwrap();

    match session.next_outcome().await {
        ReloadOutcome::Failed { reason } => assert!(reason.contains("model.json"), "{reason}"),
        other => panic!("expected a failed reload, got {other:?}"),
    }
    assert_eq!(session.coordinator.generation(), generation);
    assert_eq!(session.coordinator.current().instance(), instance);
    assert!((session.survival(MALE) - 0.16).abs() < 1e-9);

    // A good file afterwards is still picked up
    fs::write(&session.model, fs::read(fixture("titanic_logistic.json")).unwrap()).unwrap();
    loop {
        if session.next_outcome().await.is_reloaded() {
            break;
        }
    }
    assert!(session.coordinator.generation() > generation);

    session.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_requests_follow_reloads() {
    let mut session = Session::start("titanic_forest.json").await;
    let mut requests = RequestLoop::new(session.coordinator.clone(), TextPresenter::new(Vec::new()));

    let report = requests.run_batch(stream::iter([Ok(MALE.to_string())])).await.unwrap();
    assert_eq!(report.predictions, 1);

    fs::write(&session.model, fs::read(fixture("titanic_logistic.json")).unwrap()).unwrap();
    assert!(session.next_outcome().await.is_reloaded());

    let report = requests
        .run_interactive(stream::iter([Ok(FEMALE.to_string()), Ok(":exit".to_string())]))
        .await
        .unwrap();
    assert_eq!(report.predictions, 1);

    let output = String::from_utf8(requests.into_presenter().into_inner()).unwrap();
    let (first, second) = output.split_once("=== Sample 2 ===\n").unwrap();
    assert!(first.starts_with("=== Sample 1 ===\n"));
    assert!(first.contains("Model generation: 1\n"));
    assert!(!second.contains("Model generation: 1\n"));
    assert!(second.contains("Predicted class label: survived\n"));

    session.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rewriting_identical_model_changes_nothing() {
    let mut session = Session::start("titanic_forest.json").await;
    let before = (session.survival(MALE), session.survival(FEMALE));
    let instance = session.coordinator.current().instance();

    fs::write(&session.model, fs::read(fixture("titanic_forest.json")).unwrap()).unwrap();

    let outcome = session.next_outcome().await;
    assert!(outcome.is_reloaded(), "unexpected {outcome:?}");
    assert!(session.coordinator.generation() >= 2);
    assert_ne!(session.coordinator.current().instance(), instance);
    assert_eq!((session.survival(MALE), session.survival(FEMALE)), before);

    session.stop().await;
}
