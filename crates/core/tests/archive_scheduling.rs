//! Archive decisions against mock process table, disks and archive host.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use plotherd_core::archive::{
    archive_log_path, expected_plot_size, ArchiveError, ArchiveLauncher, ArchiveOutcome,
    RefusalReason, SkipReason,
};
use plotherd_core::config::Config;
use plotherd_core::disk::GB;
use plotherd_core::testing::{
    fixtures, FixedDiskSpace, MockProcessDirectory, MockSpaceProbe, MockSpawner,
};
use tempfile::TempDir;

const ARCHIVE_ROOT: &str = "/mnt/archive";

struct Harness {
    dir: TempDir,
    log_dir: PathBuf,
    dst: Vec<PathBuf>,
    config: Config,
    processes: MockProcessDirectory,
    disk: FixedDiskSpace,
    probe: MockSpaceProbe,
    spawner: MockSpawner,
}

impl Harness {
    /// Two destination dirs with plenty of local space and a remote archive.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");
        fs::create_dir(&log_dir).unwrap();
        let dst: Vec<PathBuf> = ["dst0", "dst1"]
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::create_dir(&path).unwrap();
                path
            })
            .collect();

        let mut config = fixtures::config(&log_dir, &dst);
        config.archive = Some(fixtures::archive_config("nas", ARCHIVE_ROOT));

        let processes = MockProcessDirectory::new();
        Self {
            dir,
            log_dir,
            dst,
            config,
            spawner: MockSpawner::visible_in(processes.clone()),
            processes,
            disk: FixedDiskSpace::new(2_000 * GB),
            probe: MockSpaceProbe::new(),
        }
    }

    fn launcher(&self) -> ArchiveLauncher {
        ArchiveLauncher::new(
            &self.config,
            Arc::new(self.processes.clone()),
            Arc::new(self.disk.clone()),
            Arc::new(self.probe.clone()),
            Arc::new(self.spawner.clone()),
        )
    }

    fn archive_mut(&mut self) -> &mut plotherd_core::config::ArchiveConfig {
        self.config.archive.as_mut().unwrap()
    }

    /// A completed plot in destination dir `idx`.
    fn plot(&self, idx: usize, id: &str) -> PathBuf {
        fixtures::sparse_file(
            &self.dst[idx],
            &format!("plot-k32-2021-06-14-18-07-{id}.plot"),
            expected_plot_size(32),
        )
    }

    fn archive_room(&self, name: &str, gb: u64) {
        self.probe
            .set_free(format!("{}/{}", ARCHIVE_ROOT, name), gb * GB);
    }
}

fn launched_plot(outcome: &ArchiveOutcome) -> PathBuf {
    match outcome {
        ArchiveOutcome::Launched { command, .. } => command.plot.clone(),
        other => panic!("expected a launch, got {:?}", other),
    }
}

fn refusal(outcome: &ArchiveOutcome) -> RefusalReason {
    match outcome {
        ArchiveOutcome::Refused { reason, .. } => *reason,
        other => panic!("expected a refusal, got {:?}", other),
    }
}

#[test]
fn test_not_configured() {
    let mut h = Harness::new();
    h.config.archive = None;
    h.plot(0, "aa");

    let outcome = h.launcher().tick(&[]).unwrap();

    assert_eq!(refusal(&outcome), RefusalReason::NotConfigured);
    assert_eq!(outcome.status(), "no archive settings configured");
    assert_eq!(h.probe.call_count(), 0);
}

#[test]
fn test_launches_transfer() {
    let h = Harness::new();
    let plot = h.plot(0, "aa");
    h.archive_room("a", 500);

    let outcome = h.launcher().tick(&[]).unwrap();

    assert_eq!(launched_plot(&outcome), plot);
    assert_eq!(outcome.status(), "pid: <pending>");

    let spawned = h.spawner.spawned();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].program, "rsync");
    assert_eq!(spawned[0].destination, "rsync://farmer@nas:12000/plots/a");
    assert_eq!(
        spawned[0].args.last().map(String::as_str),
        Some("rsync://farmer@nas:12000/plots/a")
    );
    assert!(spawned[0].args.contains(&"--remove-source-files".to_string()));
    assert!(archive_log_path(&h.log_dir, &plot).exists());
}

#[test]
fn test_no_plots() {
    let h = Harness::new();
    h.archive_room("a", 500);

    let outcome = h.launcher().tick(&[]).unwrap();

    assert_eq!(refusal(&outcome), RefusalReason::NoPlots);
    assert_eq!(outcome.status(), "no plots found");
    assert_eq!(h.probe.call_count(), 0);
}

#[test]
fn test_partial_plot_is_not_archived() {
    let h = Harness::new();
    fixtures::sparse_file(
        &h.dst[0],
        "plot-k32-2021-06-14-18-07-aa.plot",
        expected_plot_size(32) * 9 / 10,
    );
    h.archive_room("a", 500);

    let outcome = h.launcher().tick(&[]).unwrap();
    assert_eq!(refusal(&outcome), RefusalReason::NoPlots);
}

#[test]
fn test_later_tied_directory_wins() {
    let h = Harness::new();
    h.plot(0, "aa");
    let later = h.plot(1, "bb");
    h.archive_room("a", 500);

    let outcome = h.launcher().tick(&[]).unwrap();
    assert_eq!(launched_plot(&outcome), later);
}

#[test]
fn test_fuller_directory_wins() {
    let h = Harness::new();
    let fuller = h.plot(0, "aa");
    h.plot(1, "bb");
    h.disk.set_free(&h.dst[0], 100 * GB);
    h.archive_room("a", 500);

    let outcome = h.launcher().tick(&[]).unwrap();
    assert_eq!(launched_plot(&outcome), fuller);
}

#[test]
fn test_plot_count_breaks_ties() {
    let h = Harness::new();
    let first = h.plot(0, "aa");
    h.plot(0, "ab");
    h.plot(1, "bb");
    h.archive_room("a", 500);

    let outcome = h.launcher().tick(&[]).unwrap();
    assert_eq!(launched_plot(&outcome), first);
}

#[test]
fn test_in_flight_plots_are_skipped() {
    let mut h = Harness::new();
    h.archive_mut().max_concurrent_transfer = Some(2);
    let idle = h.plot(0, "aa");
    let busy = h.plot(1, "bb");
    h.processes.add_process(fixtures::process(
        7000,
        1,
        &format!(
            "rsync -P {} rsync://farmer@nas:12000/plots/b",
            busy.display()
        ),
    ));
    h.archive_room("a", 500);

    let outcome = h.launcher().tick(&[]).unwrap();

    assert_eq!(launched_plot(&outcome), idle);
    assert_eq!(outcome.status(), "pid: 7000, <pending>");
}

#[test]
fn test_concurrency_limit() {
    let h = Harness::new();
    h.plot(0, "aa");
    h.processes.add_process(fixtures::process(
        7100,
        1,
        "rsync -P --address=10.0.0.2 /elsewhere/x.plot rsync://farmer@nas:12000/plots/b",
    ));
    h.archive_room("a", 500);

    let outcome = h.launcher().tick(&[]).unwrap();

    assert_eq!(refusal(&outcome), RefusalReason::ConcurrencyLimit);
    assert_eq!(outcome.status(), "pid: 7100");
    assert_eq!(outcome.transfers()[0].tunnel_ip.as_deref(), Some("10.0.0.2"));
    assert_eq!(h.spawner.spawn_count(), 0);
}

#[test]
fn test_rsync_to_other_host_is_not_counted() {
    let h = Harness::new();
    h.plot(0, "aa");
    h.processes.add_process(fixtures::process(
        7200,
        1,
        "rsync -P /elsewhere/x.plot rsync://farmer@backup:12000/plots/b",
    ));
    h.archive_room("a", 500);

    let outcome = h.launcher().tick(&[]).unwrap();
    assert!(outcome.is_launched());
}

#[test]
fn test_local_archive_allows_more_transfers() {
    let mut h = Harness::new();
    h.config.archive = Some(fixtures::archive_config("localhost", ARCHIVE_ROOT));
    h.plot(0, "aa");
    for pid in [7300, 7301] {
        h.processes.add_process(fixtures::process(
            pid,
            1,
            &format!("rsync -P /elsewhere/{pid}.plot /mnt/archive/b"),
        ));
    }
    h.archive_room("a", 500);

    let outcome = h.launcher().tick(&[]).unwrap();

    assert!(outcome.is_launched());
    assert_eq!(h.spawner.spawned()[0].destination, "/mnt/archive/a");
}

#[test]
fn test_archive_dir_rotation() {
    let mut h = Harness::new();
    h.archive_mut().max_concurrent_transfer = Some(2);
    h.plot(0, "aa");
    h.plot(0, "ab");
    h.archive_room("c", 500);
    h.archive_room("a", 500);
    h.archive_room("b", 500);
    h.archive_room("full", 100);

    h.archive_mut().index = 1;
    h.launcher().tick(&[]).unwrap();

    h.archive_mut().index = 9;
    h.launcher().tick(&[]).unwrap();

    let destinations: Vec<String> = h
        .spawner
        .spawned()
        .into_iter()
        .map(|c| c.destination)
        .collect();
    assert_eq!(
        destinations,
        vec![
            "rsync://farmer@nas:12000/plots/b",
            "rsync://farmer@nas:12000/plots/c"
        ]
    );
}

#[test]
fn test_no_archive_dirs() {
    let h = Harness::new();
    h.plot(0, "aa");

    let outcome = h.launcher().tick(&[]).unwrap();
    assert_eq!(refusal(&outcome), RefusalReason::NoArchiveDirs);
    assert_eq!(outcome.status(), "no free archive dirs found");
}

#[test]
fn test_failed_probe_means_no_archive_dirs() {
    let h = Harness::new();
    h.plot(0, "aa");
    h.archive_room("a", 500);
    h.probe.set_failing(true);

    let outcome = h.launcher().tick(&[]).unwrap();
    assert_eq!(refusal(&outcome), RefusalReason::NoArchiveDirs);
    assert_eq!(h.spawner.spawn_count(), 0);
}

#[test]
fn test_no_archive_space() {
    let h = Harness::new();
    h.plot(0, "aa");
    // One plot fits but the headroom does not.
    h.archive_room("a", 120);

    let outcome = h.launcher().tick(&[]).unwrap();
    assert_eq!(refusal(&outcome), RefusalReason::NoArchiveSpace);
    assert_eq!(
        outcome.status(),
        "no archive directories found with enough free space"
    );
}

#[test]
fn test_existing_log_blocks_duplicate_launch() {
    let h = Harness::new();
    let plot = h.plot(0, "aa");
    h.archive_room("a", 500);
    let log = archive_log_path(&h.log_dir, &plot);
    fs::write(&log, "").unwrap();

    let outcome = h.launcher().tick(&[]).unwrap();

    assert_eq!(
        outcome.status(),
        format!("archive log exists: {}", log.display())
    );
    match outcome {
        ArchiveOutcome::Skipped {
            reason: SkipReason::AlreadyInFlight { log: skipped },
            ..
        } => assert_eq!(skipped, log),
        other => panic!("expected a skip, got {:?}", other),
    }
    assert_eq!(h.spawner.spawn_count(), 0);
}

#[test]
fn test_unwritable_log_dir_is_fatal() {
    let mut h = Harness::new();
    h.config.directories.log = h.dir.path().join("missing");
    h.plot(0, "aa");
    h.archive_room("a", 500);

    let err = h.launcher().tick(&[]).unwrap_err();

    assert!(matches!(err, ArchiveError::LogFile { .. }));
    assert!(err.is_fatal());
    assert_eq!(h.spawner.spawn_count(), 0);
}

#[test]
fn test_spawn_failure_is_not_fatal() {
    let h = Harness::new();
    let plot = h.plot(0, "aa");
    h.archive_room("a", 500);
    h.spawner.set_next_error(io::ErrorKind::PermissionDenied);
    let mut launcher = h.launcher();

    let err = launcher.tick(&[]).unwrap_err();

    assert!(matches!(err, ArchiveError::Spawn { .. }));
    assert!(!err.is_fatal());
    assert!(!archive_log_path(&h.log_dir, &plot).exists());

    // The failed launch leaves nothing behind, so the plot is retried.
    let next = launcher.tick(&[]).unwrap();
    assert!(next.is_launched());
    assert_eq!(h.spawner.spawn_count(), 1);
}

#[test]
fn test_placeholder_counts_only_in_launching_tick() {
    let mut h = Harness::new();
    h.archive_mut().max_concurrent_transfer = Some(2);
    // Transfers never show up in the process table.
    h.spawner = MockSpawner::new();
    h.plot(0, "aa");
    h.plot(1, "bb");
    h.archive_room("a", 500);
    let mut launcher = h.launcher();

    let first = launcher.tick(&[]).unwrap();
    assert_eq!(first.transfers().len(), 1);
    assert!(first.transfers()[0].is_pending());

    // The placeholder has expired, so the same plot is chosen again and
    // only its transfer log stops the second launch.
    let second = launcher.tick(&[]).unwrap();
    assert!(matches!(second, ArchiveOutcome::Skipped { .. }));
    assert!(second.transfers().is_empty());
    assert_eq!(h.spawner.spawn_count(), 1);
}

#[test]
fn test_placeholder_replaced_by_running_transfer() {
    let h = Harness::new();
    h.plot(0, "aa");
    let moving = h.plot(1, "bb");
    h.archive_room("a", 500);
    let mut launcher = h.launcher();

    let first = launcher.tick(&[]).unwrap();
    assert_eq!(launched_plot(&first), moving);
    assert_eq!(first.status(), "pid: <pending>");

    let second = launcher.tick(&[]).unwrap();
    assert_eq!(refusal(&second), RefusalReason::ConcurrencyLimit);
    assert_eq!(second.status(), "pid: 50000");
    assert!(!second.transfers()[0].is_pending());

    // rsync finished and removed the source.
    h.processes.remove_process(50000);
    fs::remove_file(&moving).unwrap();
    let third = launcher.tick(&[]).unwrap();
    assert!(third.is_launched());
    assert_eq!(h.spawner.spawn_count(), 2);
}
