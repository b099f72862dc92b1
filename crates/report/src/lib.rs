//! Statistics, rules and report rendering over a metric store.
//!
//! This crate provides:
//! - `Statistic` aggregates computed on demand from metric entries
//! - A rule condition grammar (`avg < 100`, `> 10`, `=~ ^OK`) parsed into
//!   closed operator/statistic enums
//! - Declarative `View` trees and their rendered `Report` counterparts

pub mod condition;
pub mod error;
pub mod evaluator;
pub mod render;
pub mod schema;
pub mod statistic;

pub use condition::{Condition, Operator};
pub use error::ReportError;
pub use evaluator::{evaluate_rule, query_statistic, render_report_data};
pub use render::{render, render_report};
pub use schema::{
    Report, ReportEntry, ReportItem, ReportSection, Rule, RuleLevel, RuleViolation, View,
    ViewEntry, ViewItem, ViewSection,
};
pub use statistic::{Statistic, StatisticKind};
