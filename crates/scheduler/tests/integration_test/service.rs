use std::collections::BTreeSet;

use serde_json::json;

use tshrag_core::{DutId, Metric, MetricEntry, MetricId, MetricIdPattern, Profile, TestId, Window};
use tshrag_report::ReportError;
use tshrag_scheduler::{SchedulerError, TestPlan};

use crate::helpers::{at, open_scheduler};

fn rigs(names: &[&str]) -> BTreeSet<DutId> {
    names.iter().map(|n| DutId::new(n)).collect()
}

#[test]
fn test_metrics_are_qualified_by_resources() {
    let (_dir, scheduler) = open_scheduler();
    let test = scheduler.create_test(Profile::new("net"), TestPlan::new()).unwrap();
    let id = &test.id;

    let a = rigs(&["rig_a"]);
    let b = rigs(&["rig_b"]);
    scheduler
        .add_metric_entry(id, "rtt", &MetricEntry::new(at("20240601080000"), 10), Some(&a))
        .unwrap();
    scheduler
        .add_metric_entry(id, "rtt", &MetricEntry::new(at("20240601080100"), 30), Some(&b))
        .unwrap();
    scheduler
        .add_metric_entry(id, "rtt", &MetricEntry::new(at("20240601080200"), 20), Some(&a))
        .unwrap();

    let only_a = scheduler.query_metric_entry(id, "rtt", Some(&a), None).unwrap();
    assert_eq!(only_a.iter().map(|e| e.value.clone()).collect::<Vec<_>>(), [json!(10), json!(20)]);

    let merged = scheduler.query_metric_entry(id, "rtt", None, None).unwrap();
    assert_eq!(merged.len(), 3);
    assert!(merged.windows(2).all(|w| w[0].time <= w[1].time));

    let narrow = Window::new(Some(at("20240601080030")), Some(at("20240601080130")));
    let narrowed = scheduler.query_metric_entry(id, "rtt", None, Some(narrow)).unwrap();
    assert_eq!(narrowed.len(), 1);

    let listed = scheduler.list_metric_info(id, &MetricIdPattern::parse("rtt::*")).unwrap();
    let names: Vec<String> = listed.iter().map(|m| m.id.to_string()).collect();
    assert_eq!(names, ["rtt::rig_a", "rtt::rig_b"]);

    assert_eq!(
        scheduler.query_metric_statistic(id, "rtt", "max", None, None).unwrap(),
        json!(30.0)
    );
    assert_eq!(
        scheduler.query_metric_statistic(id, "rtt", "CNT", Some(&a), None).unwrap(),
        json!(2)
    );
}

#[test]
fn test_metric_info_round_trip() {
    let (_dir, scheduler) = open_scheduler();
    let test = scheduler.create_test(Profile::new("power"), TestPlan::new()).unwrap();

    let mut metric = Metric::new(MetricId::parse("power::draw").unwrap());
    metric.kind = "float".into();
    metric.description = "Board power draw".into();
    assert!(scheduler.update_metric_info(&test.id, &metric).unwrap());

    let stored = scheduler.query_metric_info(&test.id, "power::draw", None).unwrap();
    assert_eq!(stored, Some(metric));
    assert!(scheduler
        .query_metric_info(&test.id, "power::idle", None)
        .unwrap()
        .is_none());
}

#[test]
fn test_service_errors() {
    let (_dir, scheduler) = open_scheduler();
    let ghost = TestId::new("ghost");
    assert!(matches!(
        scheduler.report_test(&ghost, None),
        Err(SchedulerError::Report(ReportError::TestNotFound(_)))
    ));
    assert!(scheduler.query_metric_entry(&ghost, "rtt", None, None).is_err());

    let test = scheduler.create_test(Profile::new("net"), TestPlan::new()).unwrap();
    assert!(matches!(
        scheduler.query_metric_statistic(&test.id, "rtt", "median", None, None),
        Err(SchedulerError::Report(ReportError::UnknownStatistic(_)))
    ));
    assert!(scheduler
        .add_metric_entry(&test.id, "::", &MetricEntry::new(at("2024"), 1), None)
        .is_err());
}
