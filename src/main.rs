#![cfg_attr(target_vendor = "vex", no_main, no_std)]

#[cfg(target_vendor = "vex")]
mod robot;

#[cfg(target_vendor = "vex")]
#[vexide::main]
async fn main(peripherals: vexide::prelude::Peripherals) {
    robot::run(peripherals).await;
}

/// Dry run on the host: `hurricane-chassis [routine] [mirrored]` runs a routine
/// against the simulator and reports where it ended up.
#[cfg(not(target_vendor = "vex"))]
fn main() {
    use core::cell::RefCell;

    use hurricane_chassis::{
        config::OdomGeometry,
        hardware::Clock,
        logger,
        plan::run_plan,
        pose::Pose,
        routines::{Selection, list_names},
        scheduler::CancelToken,
        sim::{SimRobot, SimRuntime, sim_config, sim_intake},
    };
    use log::{LevelFilter, error, info};

    if let Err(e) = logger::init(LevelFilter::Info) {
        eprintln!("{e}");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let selection = Selection::parse(&args.join(" "));
    info!("routines: {}", list_names().collect::<Vec<_>>().join(", "));

    let runtime = SimRuntime::new();
    let robot = SimRobot::new(&runtime, OdomGeometry::default(), Pose::default());
    let chassis = match robot.chassis(sim_config()) {
        Ok(chassis) => chassis,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    let intake = RefCell::new(sim_intake());

    info!("simulating {selection}");
    let plan = selection.plan();
    let result = runtime.block_on(run_plan(&chassis, &intake, &plan, &CancelToken::new()));
    info!(
        "{selection}: {result:?} after {:.2}s, odometry {:?}, actual {:?}",
        runtime.now().as_secs_f64(),
        chassis.pose(),
        robot.true_pose()
    );
}
