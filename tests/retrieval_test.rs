mod common;

use common::{account, as_account, audio_only, test_config, video, FakeRemote, FakeToolkit};
use secure_camera::app::App;
use secure_camera::download::{session_dir, DownloadError};
use secure_camera::progress::RetrievalProgress;
use secure_camera::reassembly::ReassemblyError;
use secure_camera::remote::{RemoteError, RemoteSession};
use secure_camera::retrieval::RetrievalError;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn manifest(entries: &[(&str, i64)]) -> String {
    let chunks: Vec<String> = entries
        .iter()
        .map(|(name, order)| {
            format!(
                r#"{{"filename":"{name}","download_url":"http://vault.test/chunk/{name}","order":{order}}}"#
            )
        })
        .collect();
    format!(
        r#"{{"session_id":"s1","total_chunks":{},"chunks":[{}]}}"#,
        entries.len(),
        chunks.join(",")
    )
}

fn url(name: &str) -> String {
    format!("http://vault.test/chunk/{}", name)
}

struct Fixture {
    dir: tempfile::TempDir,
    remote: Arc<FakeRemote>,
    toolkit: Arc<FakeToolkit>,
    app: App,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(FakeRemote::new(300.0, 1200.0));
    let toolkit = Arc::new(FakeToolkit::default());
    let app = App::with_parts(
        test_config(dir.path(), "http://vault.test"),
        as_account(&account()),
        remote.clone(),
        toolkit.clone(),
    );
    Fixture {
        dir,
        remote,
        toolkit,
        app,
    }
}

fn recording_progress() -> (Arc<Mutex<Vec<f64>>>, impl Fn(RetrievalProgress) + Send + Sync) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |p: RetrievalProgress| sink.lock().unwrap().push(p.fraction))
}

#[tokio::test]
async fn test_single_chunk_is_copied_byte_for_byte() {
    let f = fixture();
    let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    f.remote.set_manifest(&manifest(&[("only.mov", 1)]));
    f.remote.add_chunk(&url("only.mov"), &bytes);

    let deliverable = f.app.retrieval.retrieve("s1", &|_| {}).await.unwrap();

    assert_eq!(deliverable.chunk_count, 1);
    assert_eq!(deliverable.path.extension().unwrap(), "mov");
    assert_eq!(std::fs::read(&deliverable.path).unwrap(), bytes);
    assert!(f.toolkit.concat_inputs.lock().unwrap().is_empty());
    assert!(!session_dir(&f.app.config.downloads_dir(), "s1").exists());
}

#[tokio::test]
async fn test_two_chunks_follow_manifest_order() {
    let f = fixture();
    // Server lists them out of order; order decides
    f.remote.set_manifest(&manifest(&[("c2.mov", 1), ("c1.mov", 0)]));
    f.remote.add_chunk(&url("c1.mov"), b"first-");
    f.remote.add_chunk(&url("c2.mov"), b"second");

    let (seen, progress) = recording_progress();
    let deliverable = f.app.retrieval.retrieve("s1", &progress).await.unwrap();

    assert_eq!(deliverable.chunk_count, 2);
    assert!((deliverable.duration_secs.unwrap() - 30.0).abs() < 0.01);
    assert_eq!(deliverable.path.extension().unwrap(), "mp4");
    assert_eq!(std::fs::read(&deliverable.path).unwrap(), b"first-second");

    let order: Vec<String> = f
        .toolkit
        .concat_inputs
        .lock()
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(order, vec!["c1.mov", "c2.mov"]);

    let fractions = seen.lock().unwrap().clone();
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(fractions.last().copied(), Some(1.0));
    assert!(fractions.contains(&0.8));

    assert!(!session_dir(&f.app.config.downloads_dir(), "s1").exists());
    let path = f.app.retrieval.deliverable_path("s1").await.unwrap();
    assert_eq!(path, Some(deliverable.path.clone()));
}

#[tokio::test]
async fn test_missing_order_fetches_nothing() {
    let f = fixture();
    f.remote.set_manifest(
        r#"{"chunks":[
            {"filename":"c1.mov","download_url":"http://vault.test/chunk/c1.mov","order":0},
            {"filename":"c2.mov","download_url":"http://vault.test/chunk/c2.mov"}
        ]}"#,
    );
    f.remote.add_chunk(&url("c1.mov"), b"x");
    f.remote.add_chunk(&url("c2.mov"), b"y");

    let err = f.app.retrieval.retrieve("s1", &|_| {}).await.unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::Remote(RemoteError::MalformedManifest(_))
    ));
    assert_eq!(f.remote.chunk_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_chunk_leaves_nothing_behind() {
    let f = fixture();
    f.remote
        .set_manifest(&manifest(&[("c1.mov", 1), ("c2.mov", 2), ("c3.mov", 3)]));
    f.remote.add_chunk(&url("c1.mov"), b"one");
    f.remote.add_chunk(&url("c3.mov"), b"three");

    let err = f.app.retrieval.retrieve("s1", &|_| {}).await.unwrap_err();
    match err {
        RetrievalError::Download(DownloadError::Chunk { filename, source }) => {
            assert_eq!(filename, "c2.mov");
            assert!(matches!(source, RemoteError::Server { status: 404, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(!session_dir(&f.app.config.downloads_dir(), "s1").exists());
    assert_eq!(f.app.retrieval.deliverable_path("s1").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_chunk_times_out() {
    let f = fixture();
    f.remote.set_manifest(&manifest(&[("c1.mov", 1), ("c2.mov", 2)]));
    f.remote.add_chunk(&url("c1.mov"), b"one");
    f.remote.add_chunk(&url("c2.mov"), b"two");
    f.remote
        .slow_chunks
        .lock()
        .unwrap()
        .insert(url("c2.mov"), Duration::from_secs(60));

    let err = f.app.retrieval.retrieve("s1", &|_| {}).await.unwrap_err();
    match err {
        RetrievalError::Download(DownloadError::ChunkTimeout { filename }) => {
            assert_eq!(filename, "c2.mov");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(!session_dir(&f.app.config.downloads_dir(), "s1").exists());
    assert_eq!(f.app.retrieval.deliverable_path("s1").await.unwrap(), None);
    assert!(f.toolkit.concat_inputs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_chunks_without_video_are_skipped() {
    let f = fixture();
    f.remote
        .set_manifest(&manifest(&[("c1.mov", 1), ("c2.mov", 2), ("c3.mov", 3)]));
    for name in ["c1.mov", "c2.mov", "c3.mov"] {
        f.remote.add_chunk(&url(name), name.as_bytes());
    }
    f.toolkit.set_probe("c1.mov", video(15.0));
    f.toolkit.set_probe("c2.mov", audio_only(15.0));
    f.toolkit.set_probe("c3.mov", video(12.5));

    let deliverable = f.app.retrieval.retrieve("s1", &|_| {}).await.unwrap();
    assert_eq!(deliverable.chunk_count, 2);
    assert!((deliverable.duration_secs.unwrap() - 27.5).abs() < 0.01);
    assert_eq!(std::fs::read(&deliverable.path).unwrap(), b"c1.movc3.mov");
}

#[tokio::test]
async fn test_no_video_anywhere() {
    let f = fixture();
    f.remote.set_manifest(&manifest(&[("c1.mov", 1), ("c2.mov", 2)]));
    for name in ["c1.mov", "c2.mov"] {
        f.remote.add_chunk(&url(name), b"audio");
        f.toolkit.set_probe(name, audio_only(15.0));
    }

    let err = f.app.retrieval.retrieve("s1", &|_| {}).await.unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::Reassembly(ReassemblyError::NoValidContent)
    ));
    assert!(!session_dir(&f.app.config.downloads_dir(), "s1").exists());
}

#[tokio::test]
async fn test_empty_chunk_is_corrupt() {
    let f = fixture();
    f.remote.set_manifest(&manifest(&[("c1.mov", 1), ("c2.mov", 2)]));
    f.remote.add_chunk(&url("c1.mov"), b"data");
    f.remote.add_chunk(&url("c2.mov"), b"");

    let err = f.app.retrieval.retrieve("s1", &|_| {}).await.unwrap_err();
    match err {
        RetrievalError::Reassembly(ReassemblyError::CorruptChunk(path)) => {
            assert!(path.ends_with("c2.mov"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_stalled_probe_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(FakeRemote::new(0.0, 1200.0));
    let toolkit = Arc::new(FakeToolkit::default());
    let mut config = test_config(dir.path(), "http://vault.test");
    config.load_timeout_secs = 1;
    let app = App::with_parts(config, as_account(&account()), remote.clone(), toolkit.clone());

    remote.set_manifest(&manifest(&[("c1.mov", 1), ("c2.mov", 2)]));
    remote.add_chunk(&url("c1.mov"), b"one");
    remote.add_chunk(&url("c2.mov"), b"two");
    toolkit
        .slow_probes
        .lock()
        .unwrap()
        .insert("c2.mov".to_string(), Duration::from_secs(30));

    let err = app.retrieval.retrieve("s1", &|_| {}).await.unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::Reassembly(ReassemblyError::ChunkLoadTimeout(_))
    ));
}

#[tokio::test]
async fn test_delete_remote_refreshes_quota_and_local_library() {
    let f = fixture();
    f.remote.set_manifest(&manifest(&[("only.mov", 1)]));
    f.remote.add_chunk(&url("only.mov"), b"clip");
    f.app.retrieval.retrieve("s1", &|_| {}).await.unwrap();

    f.app.retrieval.delete_remote("s1").await.unwrap();
    assert_eq!(*f.remote.deleted.lock().unwrap(), vec!["s1".to_string()]);
    assert_eq!(f.app.quota.snapshot().used_seconds, 270.0);

    assert!(f.app.retrieval.delete_local("s1").await.unwrap());
    assert!(!f.app.retrieval.delete_local("s1").await.unwrap());
    assert!(std::fs::read_dir(f.dir.path().join("library"))
        .unwrap()
        .next()
        .is_none());
}

#[tokio::test]
async fn test_list_remote() {
    let f = fixture();
    f.remote.sessions.lock().unwrap().push(RemoteSession {
        session_id: "abc".to_string(),
        session_name: "Front door".to_string(),
        chunk_count: 4,
        date: "2026-10-01".to_string(),
    });

    let sessions = f.app.retrieval.list_remote().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].chunk_count, 4);
}
