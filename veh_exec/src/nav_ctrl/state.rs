//! Implementations for the NavCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{error, info};
use std::path::Path;

// Internal
use super::{
    bypass::BypassCtx,
    tm::{DistCtrlRecord, NavStatusReport, NavTm},
    NavCtrlError, NavCtrlParams, NavFailure, NavState,
};
use crate::dist_ctrl::DistCtrl;
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    session::{self, Session},
};
use veh_if::{
    eqpt::{HazardReading, Odometer, PowerPair, StatusDisplay},
    route::{AvoidanceMode, Move, Route},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const SPLASH_ART: &str = " /\\_/\\\n( o.o )\n > ^ <";

/// Number of dots in the deployment countdown.
const DEPLOY_DOTS: u64 = 3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Navigation control state machine.
///
/// Owns the distance controller and the route, and is stepped once per control cycle through the
/// [`State`] trait.
pub struct NavCtrl<O: Odometer, D: StatusDisplay> {
    pub(super) params: NavCtrlParams,

    pub(super) dist: DistCtrl<O>,

    route: Route,

    display: D,

    pub(super) state: NavState,
    prev_state: NavState,

    /// Set on every transition, cleared once the new state's body has run.
    pub(super) fresh_entry: bool,

    /// Time the current state's body first ran.
    pub(super) entry_ms: u64,

    pub(super) phase: u32,
    pub(super) phase_entry_ms: u64,

    /// Set whenever the phase is (re)started, cleared by the state body once it has acted on it.
    pub(super) phase_fresh: bool,

    /// The motion move being executed, kept through hazard and bypass states.
    pub(super) active_move: Option<Move>,

    pub(super) leg: Option<Leg>,

    /// The state to return to once a hazard has been dealt with.
    pub(super) callback: Option<NavState>,

    /// Displacement still owed by the interrupted move.
    pub(super) resume: Option<(f64, f64)>,

    /// The hazard was present on the previous cycle of an `Adjust` leg.
    pub(super) adjust_latched: bool,

    pub(super) bypass: BypassCtx,

    failure: Option<NavFailure>,

    pub(super) now_ms: u64,
    last_now_ms: Option<u64>,

    pub(super) hazard: HazardReading,

    output: PowerPair,

    report: NavStatusReport,
    arch_status: Option<Archiver>,
    arch_dist_ctrl: Option<Archiver>,
}

/// Input data to navigation control.
#[derive(Debug, Clone, Copy, Default)]
pub struct NavInput {
    /// Monotonic time of this cycle.
    ///
    /// Units: milliseconds
    pub now_ms: u64,

    pub hazard: HazardReading,
}

/// A single commanded displacement driven through the distance controller.
#[derive(Debug, Clone, Copy)]
pub(super) struct Leg {
    pub target: (f64, f64),

    /// The target is re-armed once this time is reached, power is held at zero until then.
    pub settle_until_ms: Option<u64>,
}

pub(super) enum LegStatus {
    Settling,
    Driving(PowerPair),
    Done(PowerPair),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<O: Odometer, D: StatusDisplay> NavCtrl<O, D> {
    /// Create a new state machine starting in `initial`.
    ///
    /// `Splash` and `RoadInfo` start before the route. Any other initial state must be the state of
    /// the route's first move, which is consumed.
    pub fn new(
        params: NavCtrlParams,
        dist: DistCtrl<O>,
        mut route: Route,
        display: D,
        initial: NavState,
    ) -> Result<Self, NavCtrlError> {
        let mut active_move = None;

        match initial {
            NavState::Splash | NavState::RoadInfo => (),
            _ => {
                let first = route.peek().copied();
                match first {
                    Some(m) if NavState::from_move(&m) == initial => {
                        route.next_move();
                        if let Move::Motion { .. } = m {
                            active_move = Some(m);
                        }
                    }
                    _ => return Err(NavCtrlError::InvalidInitialState(initial, first)),
                }
            }
        }

        Ok(Self {
            params,
            dist,
            route,
            display,
            state: initial,
            prev_state: initial,
            fresh_entry: true,
            entry_ms: 0,
            phase: 0,
            phase_entry_ms: 0,
            phase_fresh: true,
            active_move,
            leg: None,
            callback: None,
            resume: None,
            adjust_latched: false,
            bypass: BypassCtx::default(),
            failure: None,
            now_ms: 0,
            last_now_ms: None,
            hazard: HazardReading::CLEAR,
            output: PowerPair::ZERO,
            report: NavStatusReport::default(),
            arch_status: None,
            arch_dist_ctrl: None,
        })
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn prev_state(&self) -> NavState {
        self.prev_state
    }

    pub fn phase(&self) -> u32 {
        self.phase
    }

    pub fn failure(&self) -> Option<NavFailure> {
        self.failure
    }

    /// The remainder captured when the active move was interrupted.
    pub fn resume_target(&self) -> Option<(f64, f64)> {
        self.resume
    }

    pub fn callback_state(&self) -> Option<NavState> {
        self.callback
    }

    pub fn bypass_attempts(&self) -> u32 {
        self.bypass.attempts
    }

    pub fn output(&self) -> PowerPair {
        self.output
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn dist_ctrl(&self) -> &DistCtrl<O> {
        &self.dist
    }

    pub fn dist_ctrl_mut(&mut self) -> &mut DistCtrl<O> {
        &mut self.dist
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn params(&self) -> &NavCtrlParams {
        &self.params
    }

    pub fn tm(&self) -> NavTm {
        NavTm {
            state: self.state,
            prev_state: self.prev_state,
            phase: self.phase,
            cursor: self.route.cursor(),
            active_move: self.active_move,
            callback: self.callback,
            remainder_mm: self.resume,
            output: self.output,
            bypass_attempts: self.bypass.attempts,
            failure: self.failure,
            dist_ctrl: self.dist.status(),
        }
    }

    // ---- TRANSITIONS ----

    pub(super) fn transition(&mut self, next: NavState) {
        info!("NavCtrl state change: {} -> {}", self.state, next);

        self.prev_state = self.state;
        self.state = next;
        self.fresh_entry = true;
        self.set_phase(0);
    }

    pub(super) fn set_phase(&mut self, phase: u32) {
        self.phase = phase;
        self.phase_entry_ms = self.now_ms;
        self.phase_fresh = true;
    }

    /// Abandon the route.
    pub(super) fn fail(&mut self, failure: NavFailure) {
        error!("NavCtrl abandoning route in {}: {}", self.state, failure);

        self.failure = Some(failure);
        self.callback = None;
        self.resume = None;
        self.leg = None;
        self.transition(NavState::Stop);
    }

    /// Return to the state interrupted by a hazard.
    pub(super) fn resume_callback(&mut self) -> Result<(), NavCtrlError> {
        let callback = self
            .callback
            .take()
            .ok_or(NavCtrlError::NoCallbackState(self.state))?;

        self.transition(callback);
        Ok(())
    }

    fn load_next_move(&mut self) -> Result<(), NavCtrlError> {
        let m = self
            .route
            .next_move()
            .ok_or(NavCtrlError::RouteCursorOverrun)?;

        self.active_move = match m {
            Move::Motion { .. } => Some(m),
            Move::Marker(_) => None,
        };
        self.resume = None;
        self.transition(NavState::from_move(&m));

        Ok(())
    }

    // ---- TIMING ----

    pub(super) fn elapsed_ms(&self) -> u64 {
        self.now_ms.saturating_sub(self.entry_ms)
    }

    pub(super) fn phase_elapsed_ms(&self) -> u64 {
        self.now_ms.saturating_sub(self.phase_entry_ms)
    }

    /// Avoidance mode of the active move.
    pub(super) fn avoidance(&self) -> AvoidanceMode {
        match self.active_move {
            Some(Move::Motion { avoidance, .. }) => avoidance,
            _ => AvoidanceMode::default(),
        }
    }

    // ---- LEGS ----

    /// Command a new leg. The target is set immediately, power is held for the settle delay.
    pub(super) fn start_leg(&mut self, target: (f64, f64), max_power: f64) {
        self.dist.set_target(target.0, target.1);
        self.dist.set_max_power(max_power);

        let settle_until_ms = match self.params.settle_ms {
            0 => None,
            ms => Some(self.now_ms + ms),
        };

        self.leg = Some(Leg {
            target,
            settle_until_ms,
        });
    }

    pub(super) fn drive_leg(&mut self, dt_s: f64) -> LegStatus {
        let leg = match self.leg.as_mut() {
            Some(l) => l,
            None => return LegStatus::Settling,
        };

        if let Some(until) = leg.settle_until_ms {
            if self.now_ms < until {
                return LegStatus::Settling;
            }

            // Anything counted while settling belongs to the previous leg
            leg.settle_until_ms = None;
            let target = leg.target;
            self.dist.set_target(target.0, target.1);
        }

        let power = self.dist.run_dt(dt_s);

        if self.dist.target_met() {
            self.leg = None;
            LegStatus::Done(power)
        } else {
            LegStatus::Driving(power)
        }
    }

    /// Hold position through the distance controller.
    fn hold(&mut self, entered: bool, dt_s: f64) -> PowerPair {
        if entered {
            self.leg = None;
            self.dist.set_target(0.0, 0.0);
        }
        self.dist.run_dt(dt_s)
    }

    // ---- STATE BODIES ----

    fn on_enter(&mut self) {
        self.entry_ms = self.now_ms;
        self.phase_entry_ms = self.now_ms;

        let text = self.status_text();
        self.display.print_status(&text);
    }

    fn status_text(&self) -> String {
        match self.state {
            NavState::Splash => SPLASH_ART.to_string(),
            NavState::RoadInfo => format!(
                "Route: {} moves\n{:.0} mm",
                self.route.len(),
                self.route.total_distance_mm()
            ),
            NavState::Stop => match self.failure {
                Some(f) => format!("STOP: {}", f),
                None => String::from("Route complete"),
            },
            NavState::DeploySensor => String::from("Deploying sensor"),
            NavState::HazardForward => String::from("Hazard ahead"),
            NavState::HazardBackward => String::from("Hazard behind"),
            NavState::HazardForwardBypass | NavState::HazardBackwardBypass => {
                String::from("Bypassing hazard")
            }
            s => match (self.resume, self.active_move) {
                (Some((l, r)), _) | (None, Some(Move::Motion { left_mm: l, right_mm: r, .. })) => {
                    format!("{:?} {:.0}/{:.0} mm", s, l, r)
                }
                _ => format!("{:?}", s),
            },
        }
    }

    fn splash(&mut self, entered: bool, dt_s: f64) -> PowerPair {
        let power = self.hold(entered, dt_s);

        if self.elapsed_ms() >= self.params.splash_ms {
            self.transition(NavState::RoadInfo);
        }

        power
    }

    fn road_info(&mut self, entered: bool, dt_s: f64) -> Result<PowerPair, NavCtrlError> {
        let power = self.hold(entered, dt_s);

        if self.elapsed_ms() >= self.params.road_info_ms {
            self.load_next_move()?;
        }

        Ok(power)
    }

    fn deploy(&mut self, entered: bool, dt_s: f64) -> Result<PowerPair, NavCtrlError> {
        let power = self.hold(entered, dt_s);
        let elapsed = self.elapsed_ms();

        if elapsed >= self.params.deploy_ms {
            info!("Sensor deployed");
            self.load_next_move()?;
            return Ok(power);
        }

        // The phase counts the dots shown
        let dots = (elapsed * DEPLOY_DOTS / self.params.deploy_ms.max(1) + 1).min(DEPLOY_DOTS);
        if dots != self.phase as u64 {
            self.set_phase(dots as u32);
            self.display
                .print_variable_region(&".".repeat(dots as usize), 0, 1);
        }

        Ok(power)
    }

    fn motion(&mut self, entered: bool, dt_s: f64) -> Result<PowerPair, NavCtrlError> {
        if entered {
            let (target, max_power) = match self.active_move {
                Some(Move::Motion {
                    left_mm,
                    right_mm,
                    max_power,
                    ..
                }) => ((left_mm, right_mm), max_power),
                _ => return Err(NavCtrlError::NoActiveMove(self.state)),
            };

            let target = self.resume.take().unwrap_or(target);
            self.adjust_latched = false;
            self.start_leg(target, max_power);
        }

        match self.drive_leg(dt_s) {
            LegStatus::Settling => Ok(PowerPair::ZERO),
            LegStatus::Driving(power) => Ok(power),
            LegStatus::Done(power) => {
                info!("Move {} complete", self.route.cursor());
                self.load_next_move()?;
                Ok(power)
            }
        }
    }
}

impl<O: Odometer, D: StatusDisplay> State for NavCtrl<O, D> {
    type InitData = &'static str;
    type InitError = NavCtrlError;

    type InputData = NavInput;
    type OutputData = PowerPair;
    type StatusReport = NavStatusReport;
    type ProcError = NavCtrlError;

    /// Initialise the NavCtrl module.
    ///
    /// Expected init data is the directory of the archives, relative to the session's archive
    /// root.
    fn init(&mut self, init_data: Self::InitData, session: &Session) -> Result<(), Self::InitError> {
        let arch_dir = Path::new(init_data);

        self.arch_status = Some(
            Archiver::from_path(session, arch_dir.join("status_report.csv"))
                .map_err(NavCtrlError::ArchiveInit)?,
        );
        self.arch_dist_ctrl = Some(
            Archiver::from_path(session, arch_dir.join("dist_ctrl.csv"))
                .map_err(NavCtrlError::ArchiveInit)?,
        );

        Ok(())
    }

    /// Perform cyclic processing of navigation control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let dt_s = match self.last_now_ms {
            Some(t) => input_data.now_ms.saturating_sub(t) as f64 / 1000.0,
            None => self.dist.params().nominal_tick_s,
        };
        self.last_now_ms = Some(input_data.now_ms);
        self.now_ms = input_data.now_ms;
        self.hazard = input_data.hazard;

        // Hazards override the state body
        let preempted = self.check_hazard();

        let entered = std::mem::replace(&mut self.fresh_entry, false);
        if entered {
            self.on_enter();
        }

        let output = match self.state {
            NavState::Splash => self.splash(entered, dt_s),
            NavState::RoadInfo => self.road_info(entered, dt_s)?,
            NavState::DeploySensor => self.deploy(entered, dt_s)?,
            NavState::Stop => self.hold(entered, dt_s),
            NavState::HazardForward | NavState::HazardBackward => {
                self.hazard_wait(entered, dt_s)?
            }
            NavState::HazardForwardBypass | NavState::HazardBackwardBypass => {
                self.bypass_step(entered, dt_s)?
            }
            NavState::Forward
            | NavState::Backward
            | NavState::RotateLeft
            | NavState::RotateRight
            | NavState::Park
            | NavState::Unpark => self.motion(entered, dt_s)?,
        }
        .clamped();

        self.output = output;

        self.report = NavStatusReport {
            time_s: session::get_elapsed_seconds(),
            state: Some(self.state),
            phase: self.phase,
            cursor: self.route.cursor(),
            entered,
            preempted,
            hazard_forward: self.hazard.forward,
            hazard_backward: self.hazard.backward,
            left_power: output.left,
            right_power: output.right,
            bypass_attempts: self.bypass.attempts,
            failure: self.failure,
        };

        Ok((output, self.report))
    }
}

impl<O: Odometer, D: StatusDisplay> Archived for NavCtrl<O, D> {
    fn write(&mut self) -> Result<(), ArchiveError> {
        let dist_record = DistCtrlRecord::from_report(self.report.time_s, &self.dist.status());

        if let Some(ref mut a) = self.arch_status {
            a.serialise(self.report)?;
        }
        if let Some(ref mut a) = self.arch_dist_ctrl {
            a.serialise(dist_record)?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dist_ctrl::{DistCtrlParams, WheelGeometry},
        sim::{HazardWindow, ManualOdometer, ScriptedHazard, SimParams, SimVehicle},
    };
    use veh_if::{
        eqpt::{HazardSensor, MotorDrive, NullDisplay, SharedOdometer, TravelDir},
        route::{Marker, MotionKind},
    };

    const TICK_MS: u64 = 50;

    fn quick_params() -> NavCtrlParams {
        NavCtrlParams {
            settle_ms: 0,
            ..Default::default()
        }
    }

    fn route(moves: Vec<Move>) -> Route {
        let mut moves = moves;
        moves.push(Move::Marker(Marker::Stop));
        Route::new(moves).unwrap()
    }

    fn input(now_ms: u64, forward: bool) -> NavInput {
        NavInput {
            now_ms,
            hazard: HazardReading {
                forward,
                backward: false,
            },
        }
    }

    /// Navigation driving a simulated vehicle.
    struct Rig {
        nav: NavCtrl<SharedOdometer, NullDisplay>,
        sim: SimVehicle,
        hazard: ScriptedHazard,
        now_ms: u64,
        visited: Vec<(NavState, u32)>,
    }

    impl Rig {
        fn new(
            params: NavCtrlParams,
            moves: Vec<Move>,
            initial: NavState,
            windows: Vec<HazardWindow>,
        ) -> Self {
            let sim = SimVehicle::new(SimParams::default());
            let dist = DistCtrl::new(DistCtrlParams::default(), sim.odometer());
            let nav = NavCtrl::new(params, dist, route(moves), NullDisplay, initial).unwrap();

            Self {
                nav,
                sim,
                hazard: ScriptedHazard::new(windows),
                now_ms: 0,
                visited: vec![(initial, 0)],
            }
        }

        fn tick(&mut self) -> PowerPair {
            self.hazard.set_time(self.now_ms);
            let input = NavInput {
                now_ms: self.now_ms,
                hazard: self.hazard.read(),
            };

            let (power, _) = self.nav.proc(&input).unwrap();

            self.sim.set_motors(power);
            self.sim.step(TICK_MS as f64 / 1000.0);
            self.now_ms += TICK_MS;

            let sp = (self.nav.state(), self.nav.phase());
            if self.visited.last() != Some(&sp) {
                self.visited.push(sp);
            }

            power
        }

        /// Tick until `cond` holds, returning false if it never did.
        fn run_until<F: Fn(&NavCtrl<SharedOdometer, NullDisplay>) -> bool>(
            &mut self,
            max_ticks: usize,
            cond: F,
        ) -> bool {
            for _ in 0..max_ticks {
                self.tick();
                if cond(&self.nav) {
                    return true;
                }
            }
            false
        }

        fn bypass_phases(&self) -> Vec<u32> {
            self.visited
                .iter()
                .filter(|(s, _)| *s == NavState::HazardForwardBypass)
                .map(|(_, p)| *p)
                .collect()
        }
    }

    #[derive(Default)]
    struct Recorder {
        status: Vec<String>,
        regions: Vec<String>,
    }

    impl StatusDisplay for Recorder {
        fn print_status(&mut self, text: &str) {
            self.status.push(text.to_string());
        }

        fn print_variable_region(&mut self, text: &str, _col: u8, _row: u8) {
            self.regions.push(text.to_string());
        }
    }

    #[test]
    fn test_initial_state() {
        let make = |initial| {
            NavCtrl::new(
                quick_params(),
                DistCtrl::new(DistCtrlParams::default(), ManualOdometer::default()),
                route(vec![Move::rotate_left(94.0)]),
                NullDisplay,
                initial,
            )
        };

        assert!(make(NavState::Splash).is_ok());
        assert!(make(NavState::RotateLeft).is_ok());
        assert!(matches!(
            make(NavState::Forward),
            Err(NavCtrlError::InvalidInitialState(NavState::Forward, _))
        ));
        assert!(make(NavState::HazardForward).is_err());
    }

    #[test]
    fn test_route_to_stop() {
        let mut rig = Rig::new(
            NavCtrlParams::default(),
            vec![Move::forward(300.0)],
            NavState::Forward,
            vec![],
        );

        assert!(rig.run_until(400, |n| n.state() == NavState::Stop));
        assert_eq!(
            rig.visited,
            vec![(NavState::Forward, 0), (NavState::Stop, 0)]
        );
        assert_eq!(rig.nav.prev_state(), NavState::Forward);

        for _ in 0..100 {
            assert_eq!(rig.tick(), PowerPair::ZERO);
        }
        assert_eq!(rig.nav.state(), NavState::Stop);
        assert_eq!(rig.nav.failure(), None);

        let (left, right) = rig.sim.wheel_positions_mm();
        assert!((left - 300.0).abs() < 25.0);
        assert!((right - 300.0).abs() < 25.0);
    }

    #[test]
    fn test_hazard_resumes_remainder() {
        let odo = SharedOdometer::new();
        let counter = odo.counter();
        let dist = DistCtrl::new(DistCtrlParams::default(), odo);

        let target = 120.0 + WheelGeometry::default().clicks_to_mm(20);
        let mut nav = NavCtrl::new(
            quick_params(),
            dist,
            route(vec![Move::forward(target)]),
            NullDisplay,
            NavState::Forward,
        )
        .unwrap();

        let mut now = 0;
        let (power, _) = nav.proc(&input(now, false)).unwrap();
        assert!(power.left > 0);

        for _ in 0..20 {
            counter.on_left_edge();
            counter.on_right_edge();
        }

        now += TICK_MS;
        let (power, report) = nav.proc(&input(now, true)).unwrap();
        assert!(report.preempted);
        assert_eq!(nav.state(), NavState::HazardForward);
        assert_eq!(nav.callback_state(), Some(NavState::Forward));
        assert_eq!(power, PowerPair::new(-40, -40));

        let (rl, rr) = nav.resume_target().unwrap();
        assert!((rl - 120.0).abs() < 1e-9);
        assert!((rr - 120.0).abs() < 1e-9);

        // Hazard clears before the timeout
        while now < 1000 {
            now += TICK_MS;
            let (power, _) = nav.proc(&input(now, true)).unwrap();
            assert_eq!(nav.state(), NavState::HazardForward);
            if now >= 50 + 150 {
                assert_eq!(power, PowerPair::ZERO);
            }
        }

        now += TICK_MS;
        nav.proc(&input(now, false)).unwrap();
        assert_eq!(nav.state(), NavState::Forward);

        now += TICK_MS;
        nav.proc(&input(now, false)).unwrap();
        let (tl, tr) = nav.dist_ctrl().target();
        assert!((tl - 120.0).abs() < 1e-9);
        assert!((tr - 120.0).abs() < 1e-9);
        assert_eq!(nav.resume_target(), None);
    }

    #[test]
    fn test_bypass_sequence() {
        let windows = vec![HazardWindow {
            start_ms: 1000,
            end_ms: Some(6000),
            dir: TravelDir::Forward,
        }];
        let mut rig = Rig::new(
            NavCtrlParams::default(),
            vec![Move::forward(1000.0)],
            NavState::Forward,
            windows,
        );

        assert!(rig.run_until(100, |n| n.state() == NavState::HazardForward));
        let (rl, rr) = rig.nav.resume_target().unwrap();
        assert!(rl > 700.0 && rr > 700.0);

        assert!(rig.run_until(200, |n| n.state() == NavState::HazardForwardBypass));
        assert!(rig.now_ms >= 1000 + 4000);

        rig.tick();
        assert_eq!(rig.nav.phase(), 0);
        assert_eq!(rig.nav.dist_ctrl().target(), (-60.0, -60.0));

        assert!(rig.run_until(2000, |n| n.state() == NavState::Forward));
        assert_eq!(rig.bypass_phases(), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(rig.nav.bypass_attempts(), 1);

        // Progress along the line is the pass length less the distance backed off
        let (al, ar) = rig.nav.resume_target().unwrap();
        assert!((al - (rl - 240.0)).abs() < 1e-9);
        assert!((ar - (rr - 240.0)).abs() < 1e-9);

        assert!(rig.run_until(1000, |n| n.state() == NavState::Stop));
        assert_eq!(rig.nav.failure(), None);
        assert!(rig.sim.position_mm().x > 700.0);
    }

    #[test]
    fn test_bypass_attempts_exhausted() {
        let windows = vec![HazardWindow {
            start_ms: 500,
            end_ms: None,
            dir: TravelDir::Forward,
        }];
        let params = NavCtrlParams {
            hazard_timeout_ms: 1000,
            max_bypass_attempts: 2,
            ..Default::default()
        };
        let mut rig = Rig::new(params, vec![Move::forward(1000.0)], NavState::Forward, windows);

        assert!(rig.run_until(3000, |n| n.state() == NavState::Stop));
        assert_eq!(rig.nav.failure(), Some(NavFailure::BypassAttemptsExhausted));
        assert_eq!(rig.nav.bypass_attempts(), 2);
        assert_eq!(rig.bypass_phases(), vec![0, 1, 2, 3, 0, 1, 2, 3]);

        for _ in 0..20 {
            assert_eq!(rig.tick(), PowerPair::ZERO);
        }
    }

    #[test]
    fn test_halt_times_out() {
        let windows = vec![HazardWindow {
            start_ms: 200,
            end_ms: None,
            dir: TravelDir::Forward,
        }];
        let mut rig = Rig::new(
            quick_params(),
            vec![Move::forward(500.0).with_avoidance(AvoidanceMode::Halt)],
            NavState::Forward,
            windows,
        );

        assert!(rig.run_until(200, |n| n.state() == NavState::Stop));
        assert_eq!(rig.nav.failure(), Some(NavFailure::HazardTimeout));
        assert!(rig.now_ms >= 200 + 4000);
        assert_eq!(
            rig.visited,
            vec![
                (NavState::Forward, 0),
                (NavState::HazardForward, 0),
                (NavState::HazardForward, 1),
                (NavState::Stop, 0)
            ]
        );
    }

    #[test]
    fn test_adjust_veers_without_stopping() {
        let dist = DistCtrl::new(DistCtrlParams::default(), ManualOdometer::default());
        let mut nav = NavCtrl::new(
            quick_params(),
            dist,
            route(vec![
                Move::forward(300.0).with_avoidance(AvoidanceMode::Adjust)
            ]),
            NullDisplay,
            NavState::Forward,
        )
        .unwrap();

        nav.proc(&input(0, false)).unwrap();
        assert_eq!(nav.dist_ctrl().target(), (300.0, 300.0));

        nav.proc(&input(50, true)).unwrap();
        assert_eq!(nav.state(), NavState::Forward);
        assert_eq!(nav.dist_ctrl().target(), (315.0, 285.0));

        // Only the rising edge veers
        nav.proc(&input(100, true)).unwrap();
        assert_eq!(nav.dist_ctrl().target(), (315.0, 285.0));

        nav.proc(&input(150, false)).unwrap();
        nav.proc(&input(200, true)).unwrap();
        assert_eq!(nav.dist_ctrl().target(), (330.0, 270.0));
        assert_eq!(nav.state(), NavState::Forward);
    }

    #[test]
    fn test_park_hazard_stops() {
        let dist = DistCtrl::new(DistCtrlParams::default(), ManualOdometer::default());
        let mut nav = NavCtrl::new(
            quick_params(),
            dist,
            route(vec![Move::with_targets(MotionKind::Park, 200.0, 200.0)]),
            NullDisplay,
            NavState::Park,
        )
        .unwrap();

        nav.proc(&input(0, false)).unwrap();
        nav.proc(&input(50, true)).unwrap();

        assert_eq!(nav.state(), NavState::Stop);
        assert_eq!(nav.failure(), Some(NavFailure::ParkInterrupted));
        assert_eq!(nav.resume_target(), None);

        let (power, _) = nav.proc(&input(100, false)).unwrap();
        assert_eq!(power, PowerPair::ZERO);
    }

    #[test]
    fn test_rotation_not_preempted() {
        let dist = DistCtrl::new(DistCtrlParams::default(), ManualOdometer::default());
        let mut nav = NavCtrl::new(
            quick_params(),
            dist,
            route(vec![Move::rotate_left(94.0)]),
            NullDisplay,
            NavState::RotateLeft,
        )
        .unwrap();

        for i in 0..10 {
            nav.proc(&input(i * TICK_MS, true)).unwrap();
            assert_eq!(nav.state(), NavState::RotateLeft);
        }
    }

    #[test]
    fn test_markers() {
        let dist = DistCtrl::new(DistCtrlParams::default(), ManualOdometer::default());
        let mut nav = NavCtrl::new(
            quick_params(),
            dist,
            route(vec![Move::Marker(Marker::DeploySensor)]),
            Recorder::default(),
            NavState::Splash,
        )
        .unwrap();

        let mut states = vec![NavState::Splash];
        let mut now = 0;
        while nav.state() != NavState::Stop && now < 20_000 {
            let (power, _) = nav.proc(&input(now, false)).unwrap();
            assert_eq!(power, PowerPair::ZERO);

            if states.last() != Some(&nav.state()) {
                states.push(nav.state());
            }
            now += TICK_MS;
        }

        assert_eq!(
            states,
            vec![
                NavState::Splash,
                NavState::RoadInfo,
                NavState::DeploySensor,
                NavState::Stop
            ]
        );
        // Splash, road info and deployment each take their configured time
        assert!(now >= 2000 + 1500 + 3000);

        let display = nav.display();
        assert!(display.status[0].contains("( o.o )"));
        assert!(display.status[1].starts_with("Route: 2 moves"));
        assert_eq!(display.status[2], "Deploying sensor");
        assert_eq!(display.regions, vec![".", "..", "..."]);
    }

    #[test]
    fn test_pass_beyond_short_leg() {
        let windows = vec![
            HazardWindow {
                start_ms: 0,
                end_ms: Some(1500),
                dir: TravelDir::Forward,
            },
            HazardWindow {
                start_ms: 0,
                end_ms: None,
                dir: TravelDir::Backward,
            },
        ];
        let mut rig = Rig::new(
            NavCtrlParams {
                hazard_timeout_ms: 500,
                ..Default::default()
            },
            vec![Move::forward(100.0)],
            NavState::Forward,
            windows,
        );

        assert!(rig.run_until(100, |n| n.state() == NavState::HazardForwardBypass));
        assert!(rig.run_until(2000, |n| n.state() == NavState::Forward));

        // The pass covered more than the leg owed
        assert_eq!(rig.nav.resume_target(), Some((0.0, 0.0)));

        for _ in 0..400 {
            let power = rig.tick();
            assert!(power.left >= 0 && power.right >= 0);
            if rig.nav.state() == NavState::Stop {
                break;
            }
        }

        assert_eq!(rig.nav.state(), NavState::Stop);
        assert_eq!(rig.nav.failure(), None);
        assert!(rig
            .visited
            .iter()
            .all(|(s, _)| *s != NavState::HazardBackward));
    }
}
