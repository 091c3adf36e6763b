use super::*;
use crate::clock::manual::ManualClock;
use crate::descriptor::Category;
use crate::http::fake::{FakeBody, FakeTransport};
use crate::ledger::MemoryStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

fn item(n: u32, title: &str) -> MediaDescriptor {
    MediaDescriptor {
        title: title.to_string(),
        lesson_number: Some(n),
        source_url: format!("https://cdn.example.test/a/{n}.mp3"),
        extension: "mp3".to_string(),
        category: Category::Audio,
        course_name: Some("COF Original".to_string()),
    }
}

fn items(count: u32) -> Vec<MediaDescriptor> {
    (1..=count).map(|n| item(n, &format!("Aula {n}"))).collect()
}

fn serve_all(fake: &FakeTransport, descriptors: &[MediaDescriptor]) {
    for d in descriptors {
        fake.file(&d.source_url, FakeBody::Ok(d.title.as_bytes().to_vec()));
    }
}

fn settings(min: usize, max: usize) -> BatchSettings {
    BatchSettings {
        min,
        max,
        throttle: Duration::from_secs(10),
        download_timeout: Duration::from_secs(300),
    }
}

fn downloader<'c>(
    fake: &Arc<FakeTransport>,
    root: &Path,
    clock: &'c ManualClock,
    min: usize,
    max: usize,
) -> BatchDownloader<&'c ManualClock> {
    let transport: Arc<dyn Transport> = fake.clone();
    BatchDownloader::new(transport, NamingResolver::new(root), clock, settings(min, max))
        .with_user_agent("test-agent")
}

fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                dirs.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

#[tokio::test]
async fn nothing_pending_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeTransport::new());
    let clock = ManualClock::at(3, 0);
    let store = MemoryStore::default();
    let mut ledger = DownloadLedger::open(store.clone()).unwrap();
    let d = downloader(&fake, dir.path(), &clock, 10, 15);

    let report = d
        .run(&[], &mut ledger, "tok", &mut StdRng::seed_from_u64(1), false)
        .await
        .unwrap();
    assert_eq!(report, BatchReport::default());
    assert!(fake.downloads().is_empty());
    assert!(clock.sleeps().is_empty());
    assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeTransport::new());
    let all = items(4);
    serve_all(&fake, &all);
    let clock = ManualClock::at(3, 0);
    let store = MemoryStore::default();
    let mut ledger = DownloadLedger::open(store.clone()).unwrap();
    let d = downloader(&fake, dir.path(), &clock, 2, 2);

    let report = d
        .run(&all, &mut ledger, "tok", &mut StdRng::seed_from_u64(1), true)
        .await
        .unwrap();
    assert!(report.dry_run);
    assert_eq!(report.selected, 2);
    assert_eq!(
        report.planned[0],
        dir.path().join("COF_Original/audios/Aula_001_-_Aula_1.mp3")
    );
    assert!(report.written.is_empty());
    assert!(fake.downloads().is_empty());
    assert_eq!(store.saves(), 0);
    assert!(ledger.is_empty());
    assert!(files_under(dir.path()).is_empty());
}

#[tokio::test]
async fn recorded_urls_are_never_fetched_again() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeTransport::new());
    let all = items(3);
    serve_all(&fake, &all);
    let clock = ManualClock::at(3, 0);
    let mut ledger = DownloadLedger::open(MemoryStore::default()).unwrap();
    ledger
        .record_success(&all[1].source_url, LedgerEntry::default())
        .unwrap();
    let d = downloader(&fake, dir.path(), &clock, 5, 5);

    let report = d
        .run(&all, &mut ledger, "tok", &mut StdRng::seed_from_u64(1), false)
        .await
        .unwrap();
    assert_eq!(report.pending, 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(
        fake.downloads(),
        vec![all[0].source_url.clone(), all[2].source_url.clone()]
    );

    for _ in 0..3 {
        let again = d
            .run(&all, &mut ledger, "tok", &mut StdRng::seed_from_u64(2), false)
            .await
            .unwrap();
        assert_eq!(again.selected, 0);
    }
    assert_eq!(fake.downloads().len(), 2);
}

#[tokio::test]
async fn batch_size_stays_in_range_and_keeps_order() {
    let all = items(20);
    let ledger = DownloadLedger::open(MemoryStore::default()).unwrap();
    let resolver = NamingResolver::new("/data");
    for seed in 0..50 {
        let p = plan(&all, &ledger, &resolver, 3, 5, &mut StdRng::seed_from_u64(seed));
        assert_eq!(p.pending, 20);
        assert!((3..=5).contains(&p.items.len()), "seed {seed}: {}", p.items.len());
        for (planned, original) in p.items.iter().zip(&all) {
            assert_eq!(&planned.descriptor, original);
        }
    }

    // Fewer pending than the minimum: take them all.
    let few = items(2);
    let p = plan(&few, &ledger, &resolver, 10, 15, &mut StdRng::seed_from_u64(7));
    assert_eq!(p.items.len(), 2);
}

#[test]
fn same_seed_same_batch() {
    let all = items(30);
    let ledger = DownloadLedger::open(MemoryStore::default()).unwrap();
    let resolver = NamingResolver::new("/data");
    let a = plan(&all, &ledger, &resolver, 10, 15, &mut StdRng::seed_from_u64(42));
    let b = plan(&all, &ledger, &resolver, 10, 15, &mut StdRng::seed_from_u64(42));
    assert_eq!(a, b);
}

#[tokio::test]
async fn failures_are_skipped_and_stay_pending() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeTransport::new());
    let all = items(3);
    fake.file(&all[0].source_url, FakeBody::Status(503));
    fake.file(&all[1].source_url, FakeBody::Ok(b"ok".to_vec()));
    fake.file(
        &all[2].source_url,
        FakeBody::Truncated {
            sent: vec![0; 4],
            expected: 64,
        },
    );
    let clock = ManualClock::at(3, 0);
    let mut ledger = DownloadLedger::open(MemoryStore::default()).unwrap();
    let d = downloader(&fake, dir.path(), &clock, 3, 3);

    let report = d
        .run(&all, &mut ledger, "tok", &mut StdRng::seed_from_u64(1), false)
        .await
        .unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 2);
    assert_eq!(fake.downloads().len(), 3);
    assert_eq!(ledger.urls().into_iter().collect::<Vec<_>>(), vec![all[1].source_url.clone()]);
    assert_eq!(files_under(dir.path()), report.written);

    let entry = ledger.get(&all[1].source_url).unwrap();
    assert_eq!(entry.bytes, Some(2));
    assert_eq!(entry.path.as_deref(), Some(report.written[0].as_path()));
    assert!(entry.sha256.is_some());

    let still = pending(&all, &ledger);
    assert_eq!(still.len(), 2);
}

#[tokio::test]
async fn throttle_between_items_only() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeTransport::new());
    let all = items(3);
    serve_all(&fake, &all);
    let clock = ManualClock::at(3, 0);
    let mut ledger = DownloadLedger::open(MemoryStore::default()).unwrap();
    let d = downloader(&fake, dir.path(), &clock, 3, 3);

    d.run(&all, &mut ledger, "tok", &mut StdRng::seed_from_u64(1), false)
        .await
        .unwrap();
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(10); 2]);
}

#[tokio::test]
async fn restart_after_partial_batch() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let ledger_path = dir.path().join("state/state.json");
    let fake = Arc::new(FakeTransport::new());
    let all = items(4);
    serve_all(&fake, &all);
    let clock = ManualClock::at(3, 0);

    // First process: two items complete, then it dies (ledger and downloader dropped).
    {
        let mut ledger = DownloadLedger::open_file(&ledger_path).unwrap();
        let d = downloader(&fake, &data, &clock, 2, 2);
        d.run(&all, &mut ledger, "tok", &mut StdRng::seed_from_u64(1), false)
            .await
            .unwrap();
    }
    // An interrupted third item left a partial file behind.
    let third = NamingResolver::new(&data).resolve(&all[2]);
    std::fs::write(part_path(&third), b"half").unwrap();

    assert_eq!(sweep_partials(&data).unwrap(), 1);
    let ledger = DownloadLedger::open_file(&ledger_path).unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(files_under(&data).len(), 2);
    let still: Vec<&str> = pending(&all, &ledger)
        .into_iter()
        .map(|d| d.source_url.as_str())
        .collect();
    assert_eq!(still, vec![all[2].source_url.as_str(), all[3].source_url.as_str()]);
}

#[tokio::test]
async fn colliding_names_get_a_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeTransport::new());
    let mut first = item(5, "Same title");
    first.source_url = "https://cdn.example.test/x/5.mp3".into();
    let mut second = item(5, "Same title");
    second.source_url = "https://cdn.example.test/y/5.mp3".into();
    let all = vec![first, second];
    serve_all(&fake, &all);
    let clock = ManualClock::at(3, 0);
    let mut ledger = DownloadLedger::open(MemoryStore::default()).unwrap();
    let d = downloader(&fake, dir.path(), &clock, 2, 2);

    let report = d
        .run(&all, &mut ledger, "tok", &mut StdRng::seed_from_u64(1), false)
        .await
        .unwrap();
    let audios = dir.path().join("COF_Original/audios");
    assert_eq!(
        report.written,
        vec![
            audios.join("Aula_005_-_Same_title.mp3"),
            audios.join("Aula_005_-_Same_title_2.mp3"),
        ]
    );
    assert_eq!(files_under(dir.path()).len(), 2);
}

#[test]
fn ledger_owned_paths_are_not_reused() {
    let mut ledger = DownloadLedger::open(MemoryStore::default()).unwrap();
    let resolver = NamingResolver::new("/data");
    let taken = item(1, "Intro");
    ledger
        .record_success(
            "https://cdn.example.test/old.mp3",
            LedgerEntry {
                path: Some(resolver.resolve(&taken)),
                ..LedgerEntry::default()
            },
        )
        .unwrap();
    let planned = assign_destinations(vec![taken], &resolver, &ledger);
    assert_eq!(
        planned[0].destination,
        PathBuf::from("/data/COF_Original/audios/Aula_001_-_Intro_2.mp3")
    );
}

#[tokio::test]
async fn long_titles_still_download() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeTransport::new());
    let long = "a".repeat(250);
    let mut first = item(7, &long);
    first.source_url = "https://cdn.example.test/x/7.mp3".into();
    let mut second = item(7, &long);
    second.source_url = "https://cdn.example.test/y/7.mp3".into();
    let all = vec![first, second];
    serve_all(&fake, &all);
    let clock = ManualClock::at(3, 0);
    let mut ledger = DownloadLedger::open(MemoryStore::default()).unwrap();
    let d = downloader(&fake, dir.path(), &clock, 2, 2);

    let report = d
        .run(&all, &mut ledger, "tok", &mut StdRng::seed_from_u64(1), false)
        .await
        .unwrap();
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(ledger.len(), 2);
    for path in &report.written {
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.len() <= crate::naming::NAME_MAX);
        assert!(path.exists());
    }
}

#[tokio::test]
async fn finished_part_named_download_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeTransport::new());
    let chapter = MediaDescriptor {
        title: "cap".to_string(),
        lesson_number: None,
        source_url: "https://cdn.example.test/b/cap.part".to_string(),
        extension: crate::catalog::extension_from_url("https://cdn.example.test/b/cap.part"),
        category: Category::Book,
        course_name: Some("COF Original".to_string()),
    };
    let all = vec![chapter];
    serve_all(&fake, &all);
    let clock = ManualClock::at(3, 0);
    let mut ledger = DownloadLedger::open(MemoryStore::default()).unwrap();
    let d = downloader(&fake, dir.path(), &clock, 1, 1);

    let report = d
        .run(&all, &mut ledger, "tok", &mut StdRng::seed_from_u64(1), false)
        .await
        .unwrap();
    let written = dir.path().join("COF_Original/livros/cap.part");
    assert_eq!(report.written, vec![written.clone()]);

    assert_eq!(sweep_partials(dir.path()).unwrap(), 0);
    assert!(written.exists());
    assert!(pending(&all, &ledger).is_empty());
}

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct CapturedLog(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
    type Writer = CapturedLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn empty_batch_still_logs_counts() {
    let log = CapturedLog::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(log.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeTransport::new());
    let clock = ManualClock::at(3, 0);
    let mut ledger = DownloadLedger::open(MemoryStore::default()).unwrap();
    let d = downloader(&fake, dir.path(), &clock, 10, 15);
    d.run(&[], &mut ledger, "tok", &mut StdRng::seed_from_u64(1), false)
        .await
        .unwrap();

    let out = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
    assert!(out.contains("batch finished"), "{out}");
    assert!(out.contains("pending=0"), "{out}");
    assert!(out.contains("selected=0"), "{out}");
}
