use std::time::{Duration, Instant};

use ntest::timeout;

use oxipulse::{AppError, DummyLink, DummySettings, Session, StopReason};

fn fast_dummy() -> DummySettings {
    DummySettings {
        interval: Duration::from_millis(100),
        ..Default::default()
    }
}

#[tokio::test]
#[timeout(10000)]
async fn duration_cutoff_bounds_the_run() {
    let link = DummyLink::spawn(fast_dummy());
    let mut session = Session::with_link(link, false);

    let started = Instant::now();
    let run = session
        .acquire(Some(Duration::from_secs_f64(2.0)))
        .await
        .unwrap();
    let elapsed = started.elapsed().as_secs_f64();

    assert!(elapsed > 2.0, "cutoff fired early: {elapsed:.3}s");
    assert!(elapsed < 2.3, "cutoff fired late: {elapsed:.3}s");
    assert_eq!(run.stop_reason(), StopReason::DurationElapsed);

    // One frame every 0.1s for 2s, give or take scheduling.
    let count = run.sample_count();
    assert!(
        (18..=23).contains(&count),
        "unexpected sample count {count}"
    );
}

#[tokio::test]
#[timeout(10000)]
async fn channels_stay_aligned_and_timestamps_monotonic() {
    let link = DummyLink::spawn(fast_dummy());
    let mut session = Session::with_link(link, false);
    let run = session
        .acquire(Some(Duration::from_millis(800)))
        .await
        .unwrap();

    let series = run.series();
    assert!(series.len() > 0);
    assert_eq!(series.pulse().len(), series.len());
    assert_eq!(series.spo2().len(), series.len());
    assert_eq!(series.pleth().len(), series.len());

    let timestamps = series.timestamps();
    assert!(timestamps[0] >= 0.0);
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
#[timeout(10000)]
async fn cooperative_stop_finalizes_promptly() {
    let link = DummyLink::spawn(fast_dummy());
    let session = Session::with_link(link, false);

    let handle = session.acquire_in_background(None).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let signalled = Instant::now();
    handle.stop();
    let run = handle.join().await.unwrap();

    // One poll cycle of latency, not a hard preemption.
    assert!(signalled.elapsed() < Duration::from_millis(250));
    assert_eq!(run.stop_reason(), StopReason::Stopped);
    assert!(run.sample_count() >= 3);
    let last = *run.series().timestamps().last().unwrap();
    assert!(last <= 0.8, "sample appended after the stop signal: {last}");
}

#[tokio::test]
#[timeout(10000)]
async fn transport_drop_is_absorbed() {
    let link = DummyLink::spawn(fast_dummy());
    let session = Session::with_link(link.clone(), false);

    let handle = session.acquire_in_background(None).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    link.drop_transport();

    let run = handle.join().await.unwrap();
    assert_eq!(run.stop_reason(), StopReason::Disconnected);
    assert!(!session.is_connected().await);
}

#[test_log::test(tokio::test)]
async fn acquisition_requires_a_connection() {
    let link = DummyLink::spawn(fast_dummy());
    let mut session = Session::with_link(link, false);
    session.disconnect().await.unwrap();

    let err = session.acquire(None).await.unwrap_err();
    assert!(matches!(err, AppError::NotConnected));
    assert!(session.acquire_in_background(None).is_err());
}

#[test_log::test(tokio::test)]
async fn invalid_frames_stay_out_of_the_series() {
    let link = DummyLink::spawn(DummySettings {
        interval: Duration::from_millis(50),
        finger_lift_every: 3,
        ..Default::default()
    });
    let mut session = Session::with_link(link, false);
    let run = session.acquire(Some(Duration::from_secs(1))).await.unwrap();

    assert!(
        run.raw_log().iter().any(|r| !r.sample.finger_present),
        "expected some finger-off frames in the diagnostic log"
    );
    let valid_pulled = run.raw_log().iter().filter(|r| r.sample.is_valid()).count();
    assert_eq!(run.sample_count(), valid_pulled);
    assert!(run.sample_count() < run.raw_log().len());
}

#[test_log::test(tokio::test)]
async fn identity_reads_and_caches() {
    let link = DummyLink::spawn(fast_dummy());
    let mut session = Session::with_link(link, false);

    let identity = session.read_identity().await.unwrap().unwrap();
    assert_eq!(identity.manufacturer, "Berry Instruments");
    assert_eq!(session.identity().unwrap().model, "BM1000-SIM");

    session.disconnect().await.unwrap();
    assert!(session.identity().is_none());
    assert!(matches!(
        session.read_identity().await,
        Err(AppError::NotConnected)
    ));
}

#[test_log::test(tokio::test)]
async fn disconnect_is_idempotent() {
    let link = DummyLink::spawn(fast_dummy());
    let mut session = Session::with_link(link.clone(), false);

    link.drop_transport();
    session.disconnect().await.unwrap();
    session.disconnect().await.unwrap();
    assert!(!session.is_connected().await);
}
