//! Main vehicle-side executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Hazard sensing
//!         - Navigation control processing, which runs distance control
//!         - Motor demands
//!         - Archiving
//!         - Simulation step
//!
//! # Modules
//!
//! All modules (e.g. `nav_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use veh_lib::{
    data_store::DataStore,
    dist_ctrl::{DistCtrl, DistCtrlParams},
    nav_ctrl::{NavCtrl, NavCtrlParams, NavInput, NavState},
    params::VehExecParams,
    sim::{LogDisplay, ScriptedHazard, SimVehicle},
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use util::{
    archive::Archived,
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    route_script,
    session::{self, Session},
    time,
};
use veh_if::eqpt::{HazardSensor, MotorDrive, PowerPair};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Command line options.
#[derive(Debug, StructOpt)]
#[structopt(name = "veh_exec", about = "Drives the simulated vehicle along a route")]
struct Opt {
    /// Route script or JSON route. The route in `veh_exec.toml` is used if not given.
    #[structopt(short, long, parse(from_os_str))]
    route: Option<PathBuf>,

    /// State to start in, e.g. `splash` or `forward`.
    #[structopt(short, long)]
    initial_state: Option<NavState>,

    /// Stop after this many cycles.
    #[structopt(short, long)]
    max_cycles: Option<u64>,

    /// Minimum log level, must be `info` or more verbose.
    #[structopt(short, long, default_value = "debug")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("veh_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opt.log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Vehicle Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("Command line options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let exec_params: VehExecParams =
        util::params::load("veh_exec.toml").wrap_err("Could not load exec params")?;
    let dist_ctrl_params: DistCtrlParams =
        util::params::load("dist_ctrl.toml").wrap_err("Could not load DistCtrl params")?;
    let nav_ctrl_params: NavCtrlParams =
        util::params::load("nav_ctrl.toml").wrap_err("Could not load NavCtrl params")?;

    info!("Exec parameters loaded");

    // ---- LOAD ROUTE ----

    let route_path = match opt.route {
        Some(p) => p,
        None => host::get_sw_root()
            .wrap_err("Could not find the software root")?
            .join(&exec_params.route_script),
    };

    info!("Loading route from {:?}", route_path);

    let route = route_script::load_route(&route_path).wrap_err("Failed to load route")?;

    info!(
        "Loaded route contains {} moves covering {:.0} mm\n",
        route.len(),
        route.total_distance_mm()
    );

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    let mut vehicle = SimVehicle::new(exec_params.sim);
    let mut hazard = ScriptedHazard::new(exec_params.hazards.clone());

    let dist_ctrl = DistCtrl::new(dist_ctrl_params, vehicle.odometer());

    let initial_state = opt
        .initial_state
        .or(exec_params.initial_state)
        .unwrap_or(NavState::Splash);

    let mut nav_ctrl = NavCtrl::new(
        nav_ctrl_params,
        dist_ctrl,
        route,
        LogDisplay::default(),
        initial_state,
    )
    .wrap_err("Failed to create NavCtrl")?;
    nav_ctrl
        .init("nav_ctrl", &session)
        .wrap_err("Failed to initialise NavCtrl")?;
    info!("NavCtrl init complete, starting in {}", initial_state);

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);
    let cycle_period_ms = time::duration_to_millis(cycle_period);
    let max_cycles = opt.max_cycles.or(exec_params.max_cycles);

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start();

        // ---- DATA INPUT ----

        hazard.set_time(ds.sim_time_ms);
        ds.hazard = hazard.read();

        // ---- NAVIGATION PROCESSING ----

        let input = NavInput {
            now_ms: ds.sim_time_ms,
            hazard: ds.hazard,
        };

        ds.nav_output = match nav_ctrl.proc(&input) {
            Ok((output, status_rpt)) => {
                ds.nav_status_rpt = status_rpt;
                output
            }
            Err(e) => {
                error!("Error during NavCtrl processing: {}", e);
                PowerPair::ZERO
            }
        };

        // ---- WRITE OUTPUT ----

        vehicle.set_motors(ds.nav_output);

        if let Err(e) = nav_ctrl.write() {
            warn!("Could not write NavCtrl archives: {}", e);
        }

        vehicle.step(exec_params.cycle_period_s);

        ds.cycle_end(cycle_period_ms);

        // ---- EXIT CONDITIONS ----

        if nav_ctrl.state() == NavState::Stop && vehicle.is_stationary() {
            match nav_ctrl.failure() {
                Some(f) => {
                    error!("Route abandoned: {}", f);
                    session::save_with_timestamp("nav_ctrl/failure.json", nav_ctrl.tm());
                }
                None => info!("Route complete"),
            }
            break;
        }

        if let Some(max) = max_cycles {
            if ds.num_cycles >= max {
                info!("Reached the limit of {} cycles, stopping", max);
                break;
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.record_overrun(false, 0);
                thread::sleep(d);
            }
            None => ds.record_overrun(true, time::duration_to_millis(cycle_dur - cycle_period)),
        }
    }

    // ---- SHUTDOWN ----

    vehicle.set_motors(PowerPair::ZERO);

    let pos = vehicle.position_mm();
    info!(
        "Finished after {} cycles ({:.2} s) at ({:.0}, {:.0}) mm, heading {:.1} deg",
        ds.num_cycles,
        ds.sim_time_ms as f64 / 1000.0,
        pos.x,
        pos.y,
        vehicle.heading_rad().to_degrees()
    );

    session.save("nav_tm.json", nav_ctrl.tm());

    info!("End of execution");

    session.exit();

    Ok(())
}
