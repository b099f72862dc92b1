use serde_json::json;

use tshrag_core::{MetricEntry, Profile, RunStatus, Time, Window};
use tshrag_report::{ReportItem, RuleLevel};
use tshrag_scheduler::TestPlan;

use crate::helpers::{at, open_scheduler, wait_terminal};

const PROFILE: &str = r#"
name: latency-soak
description: Latency soak on one rig
duration: 3600
distribution:
  steps:
    - comment: staging firmware
execution:
  steps:
    - cmd: sh -c 'exit 0'
    - cmd: ["sh", "-c", "exit 2"]
reporting:
  sections:
    - name: Performance
      items:
        - key: latency
          unit: ms
          statistics: [avg, cnt]
          rules:
            - condition: avg < 100
              level: ERROR
"#;

fn open_plan() -> TestPlan {
    let now = Time::now();
    TestPlan::new()
        .window(Some(now.saturating_sub_secs(60)), None)
        .machine("rig_a")
        .device("probe_1")
}

#[cfg(unix)]
#[test]
fn test_campaign_runs_to_report() {
    let (_dir, scheduler) = open_scheduler();
    let scheduler = scheduler.with_default_test_main();
    let profile = Profile::from_yaml_str(PROFILE).unwrap();
    let test = scheduler.create_test(profile, open_plan()).unwrap();
    assert_eq!(test.duration, Some(3600));

    assert_eq!(scheduler.refresh().unwrap(), vec![test.id.clone()]);
    // Failing jobs are data; the test itself completes.
    assert_eq!(wait_terminal(&scheduler, &test.id), RunStatus::Completed);

    let finished = scheduler.query_test(&test.id).unwrap();
    assert_eq!(finished.jobs.len(), 2);
    let statuses: Vec<RunStatus> = scheduler
        .query_jobs(&finished)
        .iter()
        .map(|job| job.run.status)
        .collect();
    assert_eq!(statuses, [RunStatus::Completed, RunStatus::Crashed]);
    assert!(scheduler
        .test_dir(&test.id)
        .join("distribution/rig_a")
        .is_dir());

    for (i, value) in (50..=500).step_by(50).enumerate() {
        let entry = MetricEntry::new(at("20240601080000").saturating_add_secs(i as u64 * 30), value);
        assert!(scheduler.add_metric_entry(&test.id, "latency", &entry, None).unwrap());
    }

    let report = scheduler.report_test(&test.id, Some(Window::all())).unwrap();
    assert_eq!(report.start_time, Time::min());
    assert_eq!(report.jobs.len(), 2);
    let ReportItem::Entry(entry) = &report.sections[0].items[0] else {
        panic!("expected entry");
    };
    assert_eq!(entry.data["avg"], json!(275.0));
    assert_eq!(entry.data["cnt"], json!(10));
    let violations = report.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].rule.level, RuleLevel::Error);
}

#[test]
fn test_cancel_unwinds_running_test() {
    let (_dir, scheduler) = open_scheduler();
    let scheduler = scheduler.with_default_test_main();
    let mut profile = Profile::new("slow");
    let steps = vec![json!({"sleep": 0.1}); 50];
    profile.execution = json!({ "steps": steps });
    let test = scheduler.create_test(profile, open_plan()).unwrap();

    assert_eq!(scheduler.refresh().unwrap(), vec![test.id.clone()]);
    assert!(scheduler.cancel_test(&test.id));
    assert_eq!(wait_terminal(&scheduler, &test.id), RunStatus::Cancelled);
    assert_eq!(scheduler.shutdown(), 0);
}

#[test]
fn test_report_defaults_to_test_window() {
    let (_dir, scheduler) = open_scheduler();
    let profile = Profile::from_yaml_str(PROFILE).unwrap();
    let plan = TestPlan::new().window(Some(at("20240601080000")), Some(at("20240601090000")));
    let test = scheduler.create_test(profile, plan).unwrap();

    for (time, value) in [
        ("20240601073000", 1000),
        ("20240601081000", 10),
        ("20240601082000", 20),
        ("20240601093000", 1000),
    ] {
        let entry = MetricEntry::new(at(time), value);
        assert!(scheduler.add_metric_entry(&test.id, "latency", &entry, None).unwrap());
    }

    let report = scheduler.report_test(&test.id, None).unwrap();
    assert_eq!(report.start_time, at("20240601080000"));
    assert_eq!(report.end_time, at("20240601090000"));
    let ReportItem::Entry(entry) = &report.sections[0].items[0] else {
        panic!("expected entry");
    };
    assert_eq!(entry.data["cnt"], json!(2));
    assert_eq!(entry.data["avg"], json!(15.0));
    assert!(report.violations().is_empty());
}
