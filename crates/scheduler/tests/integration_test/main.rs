/// Integration tests for the scheduler covering a full test campaign from
/// creation to report, the metric facade, and streaming ingestion.

mod campaign;
mod helpers;
mod service;
mod stream;
