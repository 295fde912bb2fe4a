use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Arc, Mutex};

use titrator_core::error::TitratorError;
use titrator_core::{
    ControlCfg, FitError, Phase, SampleParameters, StartRequest, TimingCfg, Titrator,
    TitrationStatus,
};
use titrator_traits::clock::test_clock::TestClock;
use titrator_traits::{Measurement, PhMeter, Pump};

type DevResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Fill,
    Empty,
    Check(f64),
    Dispense(f64),
    Aspirate(f64),
}

/// Pump that tracks held volume in liters and records every call.
struct SpyPump {
    log: Arc<Mutex<Vec<Op>>>,
    capacity_l: f64,
    held_l: f64,
    fail_dispense: bool,
}

impl SpyPump {
    fn new(capacity_l: f64) -> (Self, Arc<Mutex<Vec<Op>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: log.clone(),
                capacity_l,
                held_l: 0.0,
                fail_dispense: false,
            },
            log,
        )
    }

    fn record(&self, op: Op) {
        self.log.lock().unwrap().push(op);
    }
}

impl Pump for SpyPump {
    fn fill(&mut self) -> DevResult<()> {
        self.record(Op::Fill);
        self.held_l = self.capacity_l;
        Ok(())
    }
    fn empty(&mut self) -> DevResult<()> {
        self.record(Op::Empty);
        self.held_l = 0.0;
        Ok(())
    }
    fn dispense(&mut self, volume_l: f64) -> DevResult<()> {
        self.record(Op::Dispense(volume_l));
        if self.fail_dispense {
            return Err(Box::new(std::io::Error::other("valve stuck")));
        }
        assert!(volume_l <= self.held_l, "dispense beyond held volume");
        self.held_l -= volume_l;
        Ok(())
    }
    fn aspirate(&mut self, volume_l: f64) -> DevResult<()> {
        self.record(Op::Aspirate(volume_l));
        self.held_l += volume_l;
        Ok(())
    }
    fn check_volume_available(&mut self, volume_l: f64) -> DevResult<bool> {
        self.record(Op::Check(volume_l));
        Ok(self.held_l > volume_l)
    }
    fn get_syringe_position(&mut self) -> DevResult<u32> {
        Ok(0)
    }
    fn syringe_volume_l(&self) -> f64 {
        self.capacity_l
    }
}

enum Reading {
    Ph(f64),
    Fail(&'static str),
}

/// Meter that replays a fixed script of readings.
struct ScriptedMeter {
    script: VecDeque<Reading>,
    reads: Arc<Mutex<usize>>,
}

impl ScriptedMeter {
    fn new(phs: &[f64]) -> (Self, Arc<Mutex<usize>>) {
        let reads = Arc::new(Mutex::new(0));
        (
            Self {
                script: phs.iter().map(|&p| Reading::Ph(p)).collect(),
                reads: reads.clone(),
            },
            reads,
        )
    }

    fn then_fail(mut self, msg: &'static str) -> Self {
        self.script.push_back(Reading::Fail(msg));
        self
    }
}

impl PhMeter for ScriptedMeter {
    fn get_measurement(&mut self) -> DevResult<Measurement> {
        *self.reads.lock().unwrap() += 1;
        match self.script.pop_front() {
            Some(Reading::Ph(ph)) => Ok(Measurement {
                ph,
                emf_mv: 400.0 - 59.16 * ph,
                temperature_c: 22.5,
            }),
            Some(Reading::Fail(msg)) => Err(Box::new(std::io::Error::other(msg))),
            None => Err(Box::new(std::io::Error::other("script exhausted"))),
        }
    }
}

fn params() -> SampleParameters {
    SampleParameters::new(0.1, 35.0, 0.1, 25.0).unwrap()
}

fn timing() -> TimingCfg {
    TimingCfg {
        fill_settle_ms: 100,
        first_phase_settle_ms: 10,
        second_phase_settle_ms: 1,
    }
}

fn titrator(pump: SpyPump, meter: ScriptedMeter, clock: &TestClock) -> Titrator {
    Titrator::builder()
        .with_pump(pump)
        .with_meter(meter)
        .with_clock(Box::new(clock.clone()))
        .with_timing(timing())
        .build()
        .unwrap()
}

fn expect_titrator_err(err: &eyre::Report) -> &TitratorError {
    err.downcast_ref::<TitratorError>()
        .unwrap_or_else(|| panic!("expected TitratorError, got {err:?}"))
}

fn dispenses(log: &Arc<Mutex<Vec<Op>>>) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|op| matches!(op, Op::Dispense(_)))
        .count()
}

#[test]
fn start_seeds_session_and_fills() {
    let clock = TestClock::new();
    let (pump, log) = SpyPump::new(1.0);
    let (meter, reads) = ScriptedMeter::new(&[8.0]);
    let mut t = titrator(pump, meter, &clock);

    let s = t.start(params()).unwrap();
    assert_eq!(s.len(), 1);
    assert_eq!(s.last_ph(), 8.0);
    assert_eq!(s.last_volume(), 0.0);
    assert_eq!(t.phase(), Phase::FirstPhase);
    assert_eq!(*log.lock().unwrap(), vec![Op::Fill]);
    assert_eq!(*reads.lock().unwrap(), 1);
    assert_eq!(clock.elapsed().as_millis(), 100);
}

#[test]
fn phase_switches_on_the_step_after_crossing() {
    let clock = TestClock::new();
    let (pump, _log) = SpyPump::new(1.0);
    let (meter, _) = ScriptedMeter::new(&[8.0, 5.0, 3.7, 3.6, 3.5]);
    let mut t = titrator(pump, meter, &clock);
    t.start(params()).unwrap();

    let mut records = Vec::new();
    for _ in 0..4 {
        match t.step().unwrap() {
            TitrationStatus::Running(rec) => records.push(rec),
            other => panic!("unexpected: {other:?}"),
        }
    }

    // Crossed 3.8 on step 2, so step 3 is the first fine step.
    assert_eq!(records[0].phase, Phase::FirstPhase);
    assert_eq!(records[1].phase, Phase::FirstPhase);
    assert!((records[0].target_ph - 3.79).abs() < 1e-12);
    assert!((records[1].target_ph - 3.79).abs() < 1e-12);
    assert_eq!(records[2].phase, Phase::SecondPhase);
    assert!((records[2].target_ph - 3.6).abs() < 1e-12);
    assert!((records[3].target_ph - 3.5).abs() < 1e-12);
    assert_eq!(records[3].step, 4);
    assert_eq!(t.phase(), Phase::SecondPhase);

    // Settle waits: fill, two coarse, two fine.
    assert_eq!(clock.elapsed().as_millis(), 100 + 2 * 10 + 2);
}

#[test]
fn refill_precedes_dispense_when_syringe_is_short() {
    let clock = TestClock::new();
    // Just over the coarse dose from pH 8, so the next dose needs a refill.
    let (pump, log) = SpyPump::new(0.0025);
    let (meter, _) = ScriptedMeter::new(&[8.0, 3.7, 3.6]);
    let mut t = titrator(pump, meter, &clock);
    t.start(params()).unwrap();

    let first = match t.step().unwrap() {
        TitrationStatus::Running(rec) => rec,
        other => panic!("unexpected: {other:?}"),
    };
    assert!(!first.refilled);

    let second = match t.step().unwrap() {
        TitrationStatus::Running(rec) => rec,
        other => panic!("unexpected: {other:?}"),
    };
    assert!(second.refilled);
    assert_eq!(t.refills(), 2);

    let log = log.lock().unwrap().clone();
    let v2 = second.volume_l;
    let tail = &log[log.len() - 4..];
    assert_eq!(
        tail,
        &[Op::Check(v2), Op::Fill, Op::Check(v2), Op::Dispense(v2)]
    );
}

#[test]
fn oversized_coarse_dose_dispenses_a_full_syringe_and_continues() {
    let clock = TestClock::new();
    // The 2.5 mL coarse dose from pH 8 needs more than one 1 mL syringe.
    let (pump, log) = SpyPump::new(0.001);
    let (meter, _) = ScriptedMeter::new(&[8.0, 4.2, 3.7]);
    let mut t = titrator(pump, meter, &clock);
    t.start(params()).unwrap();

    let first = match t.step().unwrap() {
        TitrationStatus::Running(rec) => rec,
        other => panic!("unexpected: {other:?}"),
    };
    assert_eq!(first.phase, Phase::FirstPhase);
    assert_eq!(first.volume_l, 0.001);
    assert!(first.refilled);

    // Still above the threshold: the remainder is dosed from the new reading.
    let second = match t.step().unwrap() {
        TitrationStatus::Running(rec) => rec,
        other => panic!("unexpected: {other:?}"),
    };
    assert_eq!(second.phase, Phase::FirstPhase);
    assert!((second.target_ph - 3.79).abs() < 1e-12);
    assert!(second.volume_l > 0.0 && second.volume_l < 0.001);
    assert!(second.refilled);
    assert_eq!(t.refills(), 3);

    let dispensed: Vec<f64> = log
        .lock()
        .unwrap()
        .iter()
        .filter_map(|op| match op {
            Op::Dispense(v) => Some(*v),
            _ => None,
        })
        .collect();
    assert_eq!(dispensed, vec![0.001, second.volume_l]);
    let s = t.session().unwrap();
    assert!((s.last_volume() - (0.001 + second.volume_l)).abs() < 1e-15);

    let third = match t.step().unwrap() {
        TitrationStatus::Running(rec) => rec,
        other => panic!("unexpected: {other:?}"),
    };
    assert_eq!(third.phase, Phase::SecondPhase);
}

#[test]
fn fine_dose_larger_than_syringe_fails_without_dispensing() {
    let clock = TestClock::new();
    // 10 µL syringe: the coarse step is capped, the fine dose cannot be.
    let (pump, log) = SpyPump::new(1e-5);
    let (meter, _) = ScriptedMeter::new(&[8.0, 3.7]);
    let mut t = titrator(pump, meter, &clock);
    t.start(params()).unwrap();
    assert!(matches!(t.step().unwrap(), TitrationStatus::Running(_)));

    let err = t.step().expect_err("fine dose cannot fit in 10 µL");
    assert!(matches!(
        expect_titrator_err(&err),
        TitratorError::DoseExceedsCapacity { .. }
    ));
    assert_eq!(dispenses(&log), 1);
    assert_eq!(t.phase(), Phase::Faulted);
    assert_eq!(t.session().unwrap().step_count(), 1);
}

#[test]
fn stops_as_soon_as_ph_drops_below_end() {
    let clock = TestClock::new();
    let (pump, log) = SpyPump::new(1.0);
    let (meter, _) = ScriptedMeter::new(&[8.0, 3.7, 3.4, 3.1, 2.95]);
    let mut t = titrator(pump, meter, &clock);
    t.start(params()).unwrap();

    for _ in 0..4 {
        assert!(matches!(t.step().unwrap(), TitrationStatus::Running(_)));
    }
    let result = match t.step().unwrap() {
        TitrationStatus::Complete(r) => r,
        other => panic!("unexpected: {other:?}"),
    };
    assert_eq!(dispenses(&log), 4);
    assert_eq!(t.phase(), Phase::Finished);
    assert_eq!(result.points_used, 4);
    assert_eq!(t.result().unwrap(), result);
    assert_eq!(t.session().unwrap().len(), 5);
}

#[test]
fn stops_once_step_count_exceeds_cap() {
    let clock = TestClock::new();
    let (pump, log) = SpyPump::new(1.0);
    let mut script = vec![8.0];
    script.extend((0..40).map(|i| 3.79 - 0.01 * f64::from(i)));
    let (meter, _) = ScriptedMeter::new(&script);
    let mut t = titrator(pump, meter, &clock);
    t.start(params()).unwrap();

    let mut running = 0;
    loop {
        match t.step().unwrap() {
            TitrationStatus::Running(_) => running += 1,
            TitrationStatus::Complete(_) => break,
            TitrationStatus::Cancelled => panic!("not cancelled"),
        }
    }
    // 25 doses, 26 readings counting the initial one.
    assert_eq!(running, 25);
    assert_eq!(dispenses(&log), 25);
    assert_eq!(t.session().unwrap().step_count(), 25);
    assert_eq!(t.session().unwrap().len(), 26);
}

#[test]
fn custom_step_cap_is_honoured() {
    let clock = TestClock::new();
    let (pump, _) = SpyPump::new(1.0);
    let mut script = vec![8.0];
    script.extend((0..10).map(|i| 3.79 - 0.01 * f64::from(i)));
    let (meter, _) = ScriptedMeter::new(&script);
    let mut t = Titrator::builder()
        .with_pump(pump)
        .with_meter(meter)
        .with_clock(Box::new(clock.clone()))
        .with_control(ControlCfg {
            max_steps: 3,
            ..ControlCfg::default()
        })
        .build()
        .unwrap();
    t.start(params()).unwrap();
    let mut n = 0;
    while let TitrationStatus::Running(_) = t.step().unwrap() {
        n += 1;
    }
    assert_eq!(n, 3);
}

#[test]
fn cancellation_is_honoured_between_steps() {
    let clock = TestClock::new();
    let (pump, log) = SpyPump::new(1.0);
    let (meter, _) = ScriptedMeter::new(&[8.0, 3.7, 3.6]);
    let mut t = titrator(pump, meter, &clock);
    t.start(params()).unwrap();
    assert!(matches!(t.step().unwrap(), TitrationStatus::Running(_)));

    t.cancel_token().cancel();
    assert_eq!(t.step().unwrap(), TitrationStatus::Cancelled);
    assert_eq!(t.phase(), Phase::Cancelled);
    assert_eq!(dispenses(&log), 1);
    assert_eq!(t.session().unwrap().len(), 2);

    let err = t.step().expect_err("cancelled is terminal");
    assert!(matches!(expect_titrator_err(&err), TitratorError::State(_)));
    assert!(t.result().is_err());
}

#[test]
fn pump_failure_is_fatal_and_not_retried() {
    let clock = TestClock::new();
    let (mut pump, log) = SpyPump::new(1.0);
    pump.fail_dispense = true;
    let (meter, reads) = ScriptedMeter::new(&[8.0, 3.7]);
    let mut t = titrator(pump, meter, &clock);
    t.start(params()).unwrap();

    let err = t.step().expect_err("dispense fails");
    assert_eq!(
        expect_titrator_err(&err),
        &TitratorError::Pump("valve stuck".into())
    );
    assert_eq!(dispenses(&log), 1);
    assert_eq!(*reads.lock().unwrap(), 1);
    assert_eq!(t.phase(), Phase::Faulted);
    assert_eq!(t.session().unwrap().len(), 1);

    let err = t.step().expect_err("faulted is terminal");
    assert!(matches!(expect_titrator_err(&err), TitratorError::State(_)));
}

#[test]
fn meter_timeout_maps_to_timeout() {
    let clock = TestClock::new();
    let (pump, _) = SpyPump::new(1.0);
    let (meter, _) = ScriptedMeter::new(&[8.0]);
    let meter = meter.then_fail("read timeout on /dev/ttyUSB0");
    let mut t = titrator(pump, meter, &clock);
    t.start(params()).unwrap();

    let err = t.step().expect_err("meter times out");
    assert_eq!(expect_titrator_err(&err), &TitratorError::Timeout);
    assert_eq!(t.session().unwrap().len(), 1);
}

#[test]
fn invalid_sample_is_rejected_before_touching_devices() {
    let clock = TestClock::new();
    let (pump, log) = SpyPump::new(1.0);
    let (meter, reads) = ScriptedMeter::new(&[8.0]);
    let mut t = titrator(pump, meter, &clock);

    let err = t
        .start(StartRequest::ProbeTemperature {
            mass_kg: 0.0,
            salinity: 35.0,
            acid_conc_mol_l: 0.1,
        })
        .expect_err("zero mass");
    assert!(matches!(
        expect_titrator_err(&err),
        TitratorError::InvalidSample(_)
    ));
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(*reads.lock().unwrap(), 0);
    assert_eq!(t.phase(), Phase::AwaitingStart);
}

#[test]
fn probe_temperature_is_used_when_requested() {
    let clock = TestClock::new();
    let (pump, _) = SpyPump::new(1.0);
    let (meter, _) = ScriptedMeter::new(&[8.0]);
    let mut t = titrator(pump, meter, &clock);
    let s = t
        .start(StartRequest::ProbeTemperature {
            mass_kg: 0.1,
            salinity: 35.0,
            acid_conc_mol_l: 0.1,
        })
        .unwrap();
    assert_eq!(s.params().temperature_c(), 22.5);
}

#[test]
fn step_before_start_and_double_start_are_state_errors() {
    let clock = TestClock::new();
    let (pump, _) = SpyPump::new(1.0);
    let (meter, _) = ScriptedMeter::new(&[8.0, 7.0]);
    let mut t = titrator(pump, meter, &clock);

    let err = t.step().expect_err("not started");
    assert!(matches!(expect_titrator_err(&err), TitratorError::State(_)));
    let err = t.result().expect_err("no result yet");
    assert!(matches!(expect_titrator_err(&err), TitratorError::State(_)));

    t.start(params()).unwrap();
    let err = t.start(params()).expect_err("already running");
    assert!(matches!(expect_titrator_err(&err), TitratorError::State(_)));
}

#[test]
fn single_gran_point_reports_insufficient_data() {
    let clock = TestClock::new();
    let (pump, _) = SpyPump::new(1.0);
    let (meter, _) = ScriptedMeter::new(&[8.0, 2.5]);
    let mut t = titrator(pump, meter, &clock);
    t.start(params()).unwrap();
    assert!(matches!(t.step().unwrap(), TitrationStatus::Running(_)));

    let err = t.step().expect_err("one point below 3.8");
    assert_eq!(
        expect_titrator_err(&err),
        &TitratorError::Endpoint(FitError::InsufficientData { found: 1 })
    );
    assert_eq!(t.phase(), Phase::Finished);
    let again = t.result().expect_err("same outcome from result()");
    assert_eq!(
        expect_titrator_err(&again),
        &TitratorError::Endpoint(FitError::InsufficientData { found: 1 })
    );
}

#[test]
fn initial_ph_below_end_finishes_without_dosing() {
    let clock = TestClock::new();
    let (pump, log) = SpyPump::new(1.0);
    let (meter, _) = ScriptedMeter::new(&[2.8]);
    let mut t = titrator(pump, meter, &clock);
    t.start(params()).unwrap();
    assert!(t.step().is_err());
    assert_eq!(dispenses(&log), 0);
    assert_eq!(t.phase(), Phase::Finished);
}
