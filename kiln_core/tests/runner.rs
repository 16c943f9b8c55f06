use kiln_core::mocks::{FakeElement, MemoryRecorder};
use kiln_core::{
    CycleStatus, KilnError, Oven, OvenConfig, OvenHandle, OvenRunner, Outcome, RunState,
    STATUS_CAPACITY, ScheduleProfile, SensorCell,
};
use kiln_traits::ThermocoupleReading;
use kiln_traits::clock::test_clock::TestClock;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

struct Rig {
    handle: OvenHandle,
    cell: Arc<SensorCell>,
    recorder: Arc<MemoryRecorder>,
    element: FakeElement,
}

fn rig() -> Rig {
    let clock = TestClock::new();
    let cell = Arc::new(SensorCell::new());
    let recorder = Arc::new(MemoryRecorder::new());
    let mut cfg = OvenConfig::default();
    cfg.sensor.time_step_s = 0.05;
    cfg.schedule.kiln_must_catch_up = false;
    let element = FakeElement::paced(clock.clone());
    let oven = Oven::builder()
        .with_element(element.clone())
        .with_sensor(cell.clone())
        .with_recorder(recorder.clone())
        .with_clock(clock)
        .with_config(cfg)
        .build()
        .expect("build");
    Rig {
        handle: OvenRunner::spawn(oven),
        cell,
        recorder,
        element,
    }
}

fn short() -> ScheduleProfile {
    ScheduleProfile::new("short", vec![(0.0, 70.0), (1.0, 100.0)]).expect("profile")
}

fn long() -> ScheduleProfile {
    ScheduleProfile::new("long", vec![(0.0, 70.0), (1_000_000.0, 100.0)]).expect("profile")
}

fn wait_for(handle: &OvenHandle, pred: impl Fn(&CycleStatus) -> bool) -> CycleStatus {
    let deadline = Instant::now() + WAIT;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match handle.statuses().recv_timeout(left) {
            Ok(st) if pred(&st) => return st,
            Ok(_) => {}
            Err(e) => panic!("no matching status: {e}"),
        }
    }
}

fn wait_until(mut pred: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !pred() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn run_completes_on_control_thread() {
    let rig = rig();
    rig.cell.publish_temperature(80.0);
    rig.handle.start(short(), 0.0).expect("start");
    let st = wait_for(&rig.handle, CycleStatus::is_terminal);
    assert_eq!(
        st,
        CycleStatus::Completed {
            session_id: Some("mem-1".into())
        }
    );
    // kiln is already below the cooldown threshold
    let st = wait_for(&rig.handle, |s| matches!(s, CycleStatus::CoolingDown { .. }));
    assert_eq!(st, CycleStatus::CoolingDown { final_sample: true });
    assert_eq!(
        rig.recorder.session("mem-1").expect("session").outcome,
        Outcome::Completed
    );
}

#[test]
fn refused_start_reports_the_fault() {
    let rig = rig();
    rig.cell.publish_flags(&ThermocoupleReading {
        short_to_ground: true,
        ..Default::default()
    });
    let err = rig.handle.start(short(), 0.0).expect_err("refused");
    match err.downcast_ref::<KilnError>() {
        Some(KilnError::StartRefused(msg)) => assert!(msg.contains("ground"), "{msg}"),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(rig.handle.snapshot().state, RunState::Idle);
    assert!(rig.recorder.sessions().is_empty());
}

#[test]
fn abort_stops_the_session() {
    let rig = rig();
    rig.cell.publish_temperature(80.0);
    rig.handle.start(long(), 0.0).expect("start");
    wait_for(&rig.handle, |s| *s == CycleStatus::Running);
    rig.handle.abort().expect("abort");
    wait_until(|| {
        rig.recorder
            .session("mem-1")
            .is_some_and(|s| s.outcome == Outcome::Aborted)
    });
    wait_until(|| rig.handle.snapshot().state == RunState::Idle);
}

#[test]
fn cooldown_can_be_stopped_from_the_handle() {
    let rig = rig();
    rig.cell.publish_temperature(500.0);
    rig.handle.start(short(), 0.0).expect("start");
    wait_for(&rig.handle, CycleStatus::is_terminal);
    assert!(!rig.handle.stop_cooldown_capture(Some("mem-9")));
    assert!(rig.handle.stop_cooldown_capture(Some("mem-1")));
    assert!(!rig.handle.stop_cooldown_capture(None));
}

#[test]
fn dropping_the_handle_aborts_an_active_run() {
    let rig = rig();
    rig.cell.publish_temperature(80.0);
    rig.handle.start(long(), 0.0).expect("start");
    let Rig {
        handle, recorder, ..
    } = rig;
    drop(handle);
    let s = recorder.session("mem-1").expect("session");
    assert_eq!(s.outcome, Outcome::Aborted);
    assert!(s.ended_at.is_some());
}

#[test]
fn undrained_statuses_stay_bounded() {
    let rig = rig();
    rig.cell.publish_temperature(80.0);
    rig.handle.start(long(), 0.0).expect("start");
    wait_until(|| rig.element.duties().len() > 4 * STATUS_CAPACITY);
    assert!(rig.handle.statuses().len() <= STATUS_CAPACITY);
    // the oldest entries were discarded, fresh ones keep arriving
    assert_eq!(wait_for(&rig.handle, |_| true), CycleStatus::Running);
    assert_eq!(rig.handle.snapshot().state, RunState::Running);
}
