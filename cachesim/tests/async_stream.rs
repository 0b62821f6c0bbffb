// cachesim/tests/async_stream.rs

mod common;

use common::*;
use fibre_cachesim::policy::PolicyConfig;
use fibre_cachesim::window::Windowing;
use fibre_cachesim::{MemorySink, RawRecord, SimulationBuilder, SimulationDriver};

use futures_util::stream;
use std::time::Duration;
use tokio::sync::mpsc;

fn day_driver(policy: PolicyConfig) -> SimulationDriver {
  SimulationBuilder::new()
    .name("streamed")
    .capacity(40_000)
    .policy(policy)
    .windowing(Windowing::Day)
    .build()
    .unwrap()
}

#[tokio::test]
async fn test_stream_run_matches_iterator_run() {
  let trace = synthetic_trace(5, 1_200, 250, 10, 4);

  let mut sync_driver = day_driver(weighted(2.0));
  let mut sync_sink = MemorySink::new();
  let expected = sync_driver.run(trace.clone(), &mut sync_sink).unwrap();

  let mut async_driver = day_driver(weighted(2.0));
  let mut async_sink = MemorySink::new();
  let summary = async_driver
    .run_stream(stream::iter(trace), &mut async_sink)
    .await
    .unwrap();

  assert_eq!(summary, expected);
  assert_eq!(async_sink.reports, sync_sink.reports);
}

#[tokio::test]
async fn test_stream_fed_from_channel() {
  let (tx, mut rx) = mpsc::channel::<RawRecord>(16);

  let producer = tokio::spawn(async move {
    for i in 0..40u64 {
      let record = rec(&format!("f{}", i % 10), 100).day(DAY_ONE + (i as i64 / 20) * DAY);
      tx.send(record).await.unwrap();
      if i % 8 == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
      }
    }
  });

  let records = stream::poll_fn(move |cx| rx.poll_recv(cx));
  let mut driver = day_driver(PolicyConfig::FixedRecency);
  let mut sink = MemorySink::new();
  let summary = driver.run_stream(records, &mut sink).await.unwrap();
  producer.await.unwrap();

  assert_eq!(summary.records_processed, 40);
  assert_eq!(summary.misses, 10);
  assert_eq!(summary.hits, 30);
  assert_eq!(sink.reports.len(), 2);
}

#[test]
fn test_stream_run_without_tokio() {
  let records = stream::iter(vec![
    rec("a", 10).day(DAY_ONE),
    rec("a", 10).day(DAY_ONE + 1),
    RawRecord::default(),
    rec("b", 10).day(DAY_ONE + DAY),
  ]);
  let mut driver = day_driver(PolicyConfig::FixedRecency);
  let mut sink = MemorySink::new();

  let summary = futures_executor::block_on(driver.run_stream(records, &mut sink)).unwrap();
  assert_eq!(summary.records_processed, 3);
  assert_eq!(summary.records_rejected, 1);
  assert_eq!(sink.reports.len(), 2);
  assert_eq!(sink.reports[0].hit_rate, 50.0);
}
