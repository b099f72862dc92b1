use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use tshrag_core::{MdbConfig, RunStatus, SchedulerConfig, TestId, Time};
use tshrag_scheduler::Tshrag;

/// Scheduler over a fresh temp root. Keep the guard alive for the test.
pub fn open_scheduler() -> (TempDir, Tshrag) {
    let dir = tempfile::tempdir().unwrap();
    let config = SchedulerConfig {
        root: dir.path().join("root"),
        host: "127.0.0.1:9000".into(),
        lock_timeout_ms: 2_000,
        max_workers: 4,
        ..Default::default()
    };
    let scheduler = Tshrag::new(&config, MdbConfig::default()).unwrap();
    (dir, scheduler)
}

pub fn at(raw: &str) -> Time {
    Time::parse(raw).unwrap()
}

/// Poll until the test reaches a terminal status.
pub fn wait_terminal(scheduler: &Tshrag, id: &TestId) -> RunStatus {
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        let status = scheduler.query_test(id).unwrap().status();
        if status.is_terminal() && scheduler.live_workers() == 0 {
            return status;
        }
        assert!(Instant::now() < deadline, "test {id} stuck in {status}");
        thread::sleep(Duration::from_millis(20));
    }
}
