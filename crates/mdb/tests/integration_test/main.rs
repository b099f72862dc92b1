/// Integration tests for the metric store covering write/read round trips,
/// bucket pruning, and concurrent writers.

mod concurrency;
mod helpers;
mod pruning;
mod roundtrip;
