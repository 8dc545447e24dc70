use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kikoeru_archive::{ArchiveExtractor, ArchiveFormat, ArchiveReport, NativeExtractor, format};
use kikoeru_core::quarantine::LOG_FILE_NAME;
use kikoeru_core::{
    Classifier, Disposition, MemoryReporter, Monitor, QuarantineRule, RecursiveExtractor,
    StabilityPolicy, Status,
};
use kikoeru_fs::Staging;
use zip::write::SimpleFileOptions;

enum Item {
    Dir(&'static str),
    File(&'static str),
    Archive(&'static str),
}

struct Fixture {
    password: Option<&'static str>,
    items: Vec<Item>,
}

/// Extracts by file name from a fixed script and remembers the passwords it saw.
#[derive(Default)]
struct ScriptedExtractor {
    script: HashMap<String, Fixture>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedExtractor {
    fn with(mut self, name: &str, password: Option<&'static str>, items: Vec<Item>) -> Self {
        self.script
            .insert(name.to_string(), Fixture { password, items });
        self
    }

    fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ArchiveExtractor for ScriptedExtractor {
    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
        password: Option<&str>,
    ) -> kikoeru_archive::Result<ArchiveReport> {
        let name = archive.file_name().unwrap().to_string_lossy().into_owned();
        self.calls
            .lock()
            .unwrap()
            .push((name.clone(), password.map(str::to_string)));

        let fixture = self
            .script
            .get(&name)
            .ok_or(kikoeru_archive::Error::UnsupportedFormat)?;
        match (fixture.password, password) {
            (Some(_), None) => return Err(kikoeru_archive::Error::PasswordRequired),
            (Some(expected), Some(given)) if expected != given => {
                return Err(kikoeru_archive::Error::WrongPassword);
            }
            _ => {}
        }

        std::fs::create_dir_all(destination)?;
        for item in &fixture.items {
            match item {
                Item::Dir(dir) => {
                    std::fs::create_dir_all(destination.join(dir))?;
                    std::fs::write(destination.join(dir).join("track01.mp3"), b"audio")?;
                }
                Item::File(file) => std::fs::write(destination.join(file), b"text")?,
                Item::Archive(file) => std::fs::write(destination.join(file), b"")?,
            }
        }
        Ok(ArchiveReport::new(ArchiveFormat::Zip, Vec::new()))
    }

    fn looks_like_archive(&self, path: &Path) -> bool {
        path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| format::from_extension(n).is_some())
    }
}

fn upload(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"archive bytes").unwrap();
    path
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn staging_dirs(dir: &Path) -> Vec<String> {
    listing(dir)
        .into_iter()
        .filter(|n| Staging::is_staging_name(n))
        .collect()
}

#[test]
fn marked_directories_stay_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "RJ01 pass-secret.zip");
    let extractor = ScriptedExtractor::default().with(
        "RJ01 pass-secret.zip",
        Some("secret"),
        vec![Item::Dir("RJ01")],
    );
    let pipeline = RecursiveExtractor::new(extractor, Classifier::default());

    let outcome = pipeline.run(&archive);

    assert_eq!(outcome.disposition(), Some(Disposition::KeepInPlace));
    assert_eq!(outcome.nested_depth, 0);
    assert_eq!(listing(dir.path()), vec!["RJ01"]);
    assert!(dir.path().join("RJ01/track01.mp3").is_file());
    assert_eq!(
        pipeline.extractor().calls(),
        vec![("RJ01 pass-secret.zip".to_string(), Some("secret".to_string()))]
    );
}

#[test]
fn single_unmarked_directory_takes_the_archive_name() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "RJ02 pass-pw.rar");
    let extractor =
        ScriptedExtractor::default().with("RJ02 pass-pw.rar", Some("pw"), vec![Item::Dir("Album")]);
    let pipeline = RecursiveExtractor::new(extractor, Classifier::default());

    let outcome = pipeline.run(&archive);

    assert_eq!(outcome.disposition(), Some(Disposition::RenameToSourceName));
    assert_eq!(listing(dir.path()), vec!["RJ02"]);
    assert!(dir.path().join("RJ02/track01.mp3").is_file());
}

#[test]
fn nested_archives_use_the_password_chain() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "bundle pass-(a b) x.zip");
    let extractor = ScriptedExtractor::default()
        .with(
            "bundle pass-(a b) x.zip",
            Some("a b"),
            vec![Item::Archive("disc1.zip"), Item::Archive("disc2.7z")],
        )
        .with("disc1.zip", Some("x"), vec![Item::Dir("RJ10")])
        .with("disc2.7z", Some("x"), vec![Item::Dir("RJ11")]);
    let pipeline = RecursiveExtractor::new(extractor, Classifier::default());

    let outcome = pipeline.run(&archive);

    assert_eq!(outcome.disposition(), Some(Disposition::RecurseEachEntry));
    assert_eq!(outcome.nested_depth, 1);
    assert_eq!(listing(dir.path()), vec!["RJ10", "RJ11"]);
    assert_eq!(
        pipeline.extractor().calls(),
        vec![
            ("bundle pass-(a b) x.zip".to_string(), Some("a b".to_string())),
            ("disc1.zip".to_string(), Some("x".to_string())),
            ("disc2.7z".to_string(), Some("x".to_string())),
        ]
    );
}

#[test]
fn mixed_content_is_quarantined_with_a_log() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "mix.zip");
    let extractor = ScriptedExtractor::default().with(
        "mix.zip",
        None,
        vec![Item::Archive("a.zip"), Item::File("readme.txt")],
    );
    let pipeline = RecursiveExtractor::new(extractor, Classifier::default());

    let outcome = pipeline.run(&archive);

    assert_eq!(
        outcome.disposition(),
        Some(Disposition::Quarantine(QuarantineRule::MixedArchivesAndFiles))
    );
    assert_eq!(outcome.quarantined.len(), 1);
    let record = &outcome.quarantined[0];
    let quarantine_name = record.destination.file_name().unwrap().to_string_lossy();
    assert!(quarantine_name.ends_with("-mix"));
    assert_eq!(quarantine_name.len(), "YYYYMMDD-mix".len());
    assert_eq!(listing(dir.path()), vec![quarantine_name.to_string()]);
    assert_eq!(
        listing(&record.destination),
        vec!["a.zip", "processing_log.txt", "readme.txt"]
    );

    let log = std::fs::read_to_string(record.destination.join(LOG_FILE_NAME)).unwrap();
    assert!(log.contains("Original file: mix.zip"));
    assert!(log.contains("rule 4"));
}

#[test]
fn wrong_password_leaves_the_upload_alone() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "RJ05 pass-bad.zip");
    let extractor = ScriptedExtractor::default().with(
        "RJ05 pass-bad.zip",
        Some("good"),
        vec![Item::Dir("RJ05")],
    );
    let pipeline = RecursiveExtractor::new(extractor, Classifier::default());

    let outcome = pipeline.run(&archive);

    assert!(outcome.is_failure());
    match &outcome.status {
        Status::Failed { depth, staging, .. } => {
            assert_eq!(*depth, Some(0));
            let staging = staging.as_ref().unwrap();
            assert!(staging.is_dir());
        }
        Status::Completed { .. } => panic!("expected a failure"),
    }
    assert!(archive.is_file());
    assert_eq!(staging_dirs(dir.path()).len(), 1);
    assert!(!dir.path().join("RJ05").exists());
}

#[test]
fn failure_in_a_nested_level_moves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "outer pass-one two.zip");
    let extractor = ScriptedExtractor::default()
        .with(
            "outer pass-one two.zip",
            Some("one"),
            vec![Item::Archive("ok.zip"), Item::Archive("broken.zip")],
        )
        .with("ok.zip", Some("two"), vec![Item::Dir("RJ20")])
        .with("broken.zip", Some("three"), vec![Item::Dir("RJ21")]);
    let pipeline = RecursiveExtractor::new(extractor, Classifier::default());

    let outcome = pipeline.run(&archive);

    assert!(outcome.is_failure());
    assert_eq!(outcome.nested_depth, 1);
    assert!(archive.is_file());
    assert!(!dir.path().join("RJ20").exists());
    assert!(!dir.path().join("RJ21").exists());
}

#[test]
fn levels_beyond_the_chain_get_no_password() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "RJ06 pass-one.zip");
    let extractor = ScriptedExtractor::default()
        .with("RJ06 pass-one.zip", Some("one"), vec![Item::Archive("deeper.zip")])
        .with("deeper.zip", None, vec![Item::Dir("RJ60")]);
    let pipeline = RecursiveExtractor::new(extractor, Classifier::default());

    let outcome = pipeline.run(&archive);

    assert_eq!(outcome.disposition(), Some(Disposition::RecurseEachEntry));
    assert_eq!(pipeline.extractor().calls()[1], ("deeper.zip".to_string(), None));
    assert_eq!(listing(dir.path()), vec!["RJ60"]);
}

#[test]
fn nesting_limit_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "a.zip");
    let extractor = ScriptedExtractor::default()
        .with("a.zip", None, vec![Item::Archive("b.zip")])
        .with("b.zip", None, vec![Item::Archive("c.zip")])
        .with("c.zip", None, vec![Item::Dir("RJ99")]);
    let pipeline = RecursiveExtractor::new(extractor, Classifier::default()).max_depth(1);

    let outcome = pipeline.run(&archive);

    assert!(outcome.is_failure());
    match &outcome.status {
        Status::Failed { depth, reason, .. } => {
            assert_eq!(*depth, Some(2));
            assert!(reason.contains("nests archives"));
        }
        Status::Completed { .. } => panic!("expected a failure"),
    }
    assert!(archive.is_file());
    assert_eq!(pipeline.extractor().calls().len(), 2);
}

#[test]
fn non_archive_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, b"hello").unwrap();
    let pipeline = RecursiveExtractor::new(ScriptedExtractor::default(), Classifier::default());

    let outcome = pipeline.run(&notes);

    assert!(outcome.is_failure());
    assert!(notes.is_file());
    assert!(staging_dirs(dir.path()).is_empty());
}

#[test]
fn real_zip_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("RJ77.zip");
    let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
    writer
        .add_directory("Album", SimpleFileOptions::default())
        .unwrap();
    writer
        .start_file("Album/track01.mp3", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"audio").unwrap();
    writer.finish().unwrap();

    let pipeline = RecursiveExtractor::new(NativeExtractor::default(), Classifier::default());
    let outcome = pipeline.run(&archive);

    assert_eq!(outcome.disposition(), Some(Disposition::RenameToSourceName));
    assert_eq!(listing(dir.path()), vec!["RJ77"]);
    assert_eq!(
        std::fs::read(dir.path().join("RJ77/track01.mp3")).unwrap(),
        b"audio"
    );
}

#[test]
fn loose_readme_next_to_a_folder_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "mix.zip");
    let extractor = ScriptedExtractor::default().with(
        "mix.zip",
        None,
        vec![Item::File("readme.txt"), Item::Dir("a")],
    );
    let pipeline = RecursiveExtractor::new(extractor, Classifier::default());

    let outcome = pipeline.run(&archive);

    assert_eq!(
        outcome.disposition(),
        Some(Disposition::Quarantine(QuarantineRule::LooseFiles))
    );
    assert!(!archive.exists());
    let destination = &outcome.quarantined[0].destination;
    assert!(destination.join("a/track01.mp3").is_file());
    assert!(destination.join("readme.txt").is_file());
    assert_eq!(outcome.quarantined[0].entries, vec!["a/", "readme.txt"]);
}

#[test]
fn two_level_chain_unlocks_outer_and_inner() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "outer pass-p1 p2.zip");
    let extractor = ScriptedExtractor::default()
        .with("outer pass-p1 p2.zip", Some("p1"), vec![Item::Archive("inner.zip")])
        .with("inner.zip", Some("p2"), vec![Item::Dir("RJ1")]);
    let pipeline = RecursiveExtractor::new(extractor, Classifier::default());

    let outcome = pipeline.run(&archive);

    assert_eq!(outcome.disposition(), Some(Disposition::RecurseEachEntry));
    assert_eq!(outcome.nested_depth, 1);
    assert_eq!(listing(dir.path()), vec!["RJ1"]);
    assert_eq!(
        pipeline.extractor().calls(),
        vec![
            ("outer pass-p1 p2.zip".to_string(), Some("p1".to_string())),
            ("inner.zip".to_string(), Some("p2".to_string())),
        ]
    );
}

#[test]
fn real_zip_with_marked_folder_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("RJ12345.zip");
    let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
    writer
        .start_file("RJ12345/track01.mp3", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"audio").unwrap();
    writer.finish().unwrap();

    let pipeline = RecursiveExtractor::new(NativeExtractor::default(), Classifier::default());
    let outcome = pipeline.run(&archive);

    assert_eq!(outcome.disposition(), Some(Disposition::KeepInPlace));
    assert_eq!(listing(dir.path()), vec!["RJ12345"]);
}

#[test]
fn extracted_file_named_like_the_log_survives_quarantine() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("mix.zip");
    let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
    writer
        .start_file(LOG_FILE_NAME, SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"USER DATA").unwrap();
    writer
        .start_file("readme.txt", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"hi").unwrap();
    writer.finish().unwrap();

    let pipeline = RecursiveExtractor::new(NativeExtractor::default(), Classifier::default());
    let outcome = pipeline.run(&archive);

    assert_eq!(
        outcome.disposition(),
        Some(Disposition::Quarantine(QuarantineRule::LooseFiles))
    );
    let destination = &outcome.quarantined[0].destination;
    assert_eq!(
        listing(destination),
        vec!["processing_log.txt", "processing_log.txt_1", "readme.txt"]
    );
    assert_eq!(
        std::fs::read_to_string(destination.join("processing_log.txt_1")).unwrap(),
        "USER DATA"
    );
    let log = std::fs::read_to_string(destination.join(LOG_FILE_NAME)).unwrap();
    assert!(log.contains("Original file: mix.zip"));
    assert!(!archive.exists());
}

#[test]
fn nested_levels_are_renamed_and_quarantined_by_their_own_names() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "outer.zip");
    let extractor = ScriptedExtractor::default()
        .with(
            "outer.zip",
            None,
            vec![Item::Archive("RJ7.zip"), Item::Archive("mix.zip")],
        )
        .with("RJ7.zip", None, vec![Item::Dir("stuff")])
        .with("mix.zip", None, vec![Item::File("readme.txt")]);
    let pipeline = RecursiveExtractor::new(extractor, Classifier::default());

    let outcome = pipeline.run(&archive);

    assert_eq!(outcome.disposition(), Some(Disposition::RecurseEachEntry));
    assert_eq!(outcome.nested_depth, 1);
    assert_eq!(outcome.quarantined.len(), 1);
    let record = &outcome.quarantined[0];
    assert_eq!(record.depth, 1);
    assert_eq!(record.archive, "mix.zip");
    assert_eq!(record.rule, QuarantineRule::LooseFiles);

    let quarantine_name = record
        .destination
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(quarantine_name.ends_with("-mix"));
    assert_eq!(listing(dir.path()), vec![quarantine_name, "RJ7".to_string()]);
    assert!(dir.path().join("RJ7/track01.mp3").is_file());
    assert!(record.destination.join("readme.txt").is_file());

    let log = std::fs::read_to_string(record.destination.join(LOG_FILE_NAME)).unwrap();
    assert!(log.contains("Nesting depth: 1"));
}

/// Panics on every extraction.
struct PanickingExtractor;

impl ArchiveExtractor for PanickingExtractor {
    fn extract(
        &self,
        _archive: &Path,
        _destination: &Path,
        _password: Option<&str>,
    ) -> kikoeru_archive::Result<ArchiveReport> {
        panic!("extractor bug");
    }

    fn looks_like_archive(&self, path: &Path) -> bool {
        path.is_file()
    }
}

fn eager_policy() -> StabilityPolicy {
    StabilityPolicy {
        min_stable_checks: 1,
        max_wait: Duration::from_secs(3600),
        min_age: Duration::ZERO,
    }
}

#[tokio::test]
async fn monitor_processes_a_stable_upload() {
    let dir = tempfile::tempdir().unwrap();
    upload(dir.path(), "RJ88.zip");
    std::fs::write(dir.path().join(".partial.zip"), b"hidden").unwrap();
    let extractor = ScriptedExtractor::default().with("RJ88.zip", None, vec![Item::Dir("RJ88")]);
    let reporter = Arc::new(MemoryReporter::new());
    let mut monitor = Monitor::new(
        dir.path(),
        Duration::from_secs(1),
        eager_policy(),
        RecursiveExtractor::new(extractor, Classifier::default()),
        reporter.clone(),
    );

    monitor.tick();
    assert_eq!(monitor.registry().len(), 1);
    assert_eq!(monitor.in_flight(), 0);

    monitor.tick();
    let outcomes = monitor.drain().await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].disposition(), Some(Disposition::KeepInPlace));
    assert_eq!(reporter.outcomes().len(), 1);
    assert!(dir.path().join("RJ88/track01.mp3").is_file());
    assert!(!dir.path().join("RJ88.zip").exists());
    assert!(dir.path().join(".partial.zip").exists());
}

#[tokio::test]
async fn monitor_does_not_retry_an_unchanged_failure() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "RJ89 pass-wrong.zip");
    let extractor = ScriptedExtractor::default().with(
        "RJ89 pass-wrong.zip",
        Some("right"),
        vec![Item::Dir("RJ89")],
    );
    let reporter = Arc::new(MemoryReporter::new());
    let mut monitor = Monitor::new(
        dir.path(),
        Duration::from_secs(1),
        eager_policy(),
        RecursiveExtractor::new(extractor, Classifier::default()),
        reporter.clone(),
    );

    monitor.tick();
    monitor.tick();
    let outcomes = monitor.drain().await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_failure());

    monitor.tick();
    monitor.tick();
    assert!(monitor.drain().await.is_empty());
    assert!(monitor.registry().is_empty());
    assert!(archive.is_file());

    std::fs::write(&archive, b"re-uploaded archive bytes").unwrap();
    monitor.tick();
    monitor.tick();
    assert_eq!(monitor.drain().await.len(), 1);
    assert_eq!(reporter.outcomes().len(), 2);
}

#[tokio::test]
async fn monitor_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let monitor = Monitor::new(
        dir.path(),
        Duration::from_secs(1),
        eager_policy(),
        RecursiveExtractor::new(ScriptedExtractor::default(), Classifier::default()),
        Arc::new(MemoryReporter::new()),
    );

    monitor.run(std::future::ready(())).await.unwrap();
}

#[tokio::test]
async fn monitor_recovers_the_path_of_a_panicked_run() {
    let dir = tempfile::tempdir().unwrap();
    let archive = upload(dir.path(), "RJ90.zip");
    let reporter = Arc::new(MemoryReporter::new());
    let mut monitor = Monitor::new(
        dir.path(),
        Duration::from_secs(1),
        eager_policy(),
        RecursiveExtractor::new(PanickingExtractor, Classifier::default()),
        reporter.clone(),
    );

    monitor.tick();
    monitor.tick();
    let outcomes = monitor.drain().await;

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_failure());
    assert_eq!(outcomes[0].archive, archive);
    assert_eq!(monitor.in_flight(), 0);
    assert_eq!(reporter.outcomes().len(), 1);
    assert!(archive.is_file());

    std::fs::write(&archive, b"re-uploaded archive bytes").unwrap();
    monitor.tick();
    monitor.tick();
    assert_eq!(monitor.drain().await.len(), 1);
}
