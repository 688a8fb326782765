//! Autonomous routines as data.

extern crate alloc;

use alloc::{rc::Rc, vec::Vec};
use core::{cell::RefCell, time::Duration};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    chassis::Chassis,
    hardware::{ChassisSensors, Clock, Drivetrain},
    mechanism::Mechanisms,
    scheduler::{CancelToken, Cancelled},
};

/// One step of a routine. Distances are inches, angles compass degrees and
/// times milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action<C> {
    SetPosition { x: f64, y: f64, heading: f64 },
    SetDriveMaxVoltage(f64),
    SetTurnMaxVoltage(f64),
    DriveDistance(f64),
    DriveDistanceTime { distance: f64, timeout: u64 },
    DriveDistanceSettle { distance: f64, settle_time: u64, settle_error: f64 },
    TurnToAngle(f64),
    TurnToAngleTime { heading: f64, timeout: u64 },
    TurnToAngleFor { heading: f64, duration: u64 },
    MoveToPosition { x: f64, y: f64 },
    TurnToPosition { x: f64, y: f64 },
    Wait(u64),
    Mechanism(C),
}

/// Runs `plan` in order, checking `token` after every action.
///
/// Motion timeouts are not failures; the next action starts from wherever the
/// robot ended up.
pub async fn run_plan<D, S, C, M>(
    chassis: &Chassis<D, S, C>,
    mechanisms: &RefCell<M>,
    plan: &[Action<M::Command>],
    token: &CancelToken,
) -> Result<(), Cancelled>
where
    D: Drivetrain,
    S: ChassisSensors,
    C: Clock,
    M: Mechanisms,
{
    for (index, action) in plan.iter().enumerate() {
        token.checkpoint()?;
        debug!("step {index}: {action:?}");
        match *action {
            Action::SetPosition { x, y, heading } => chassis.set_position(x, y, heading),
            Action::SetDriveMaxVoltage(voltage) => chassis.set_drive_max_voltage(voltage),
            Action::SetTurnMaxVoltage(voltage) => chassis.set_turn_max_voltage(voltage),
            Action::DriveDistance(distance) => {
                chassis.drive_distance_with_odom(distance).await;
            }
            Action::DriveDistanceTime { distance, timeout } => {
                chassis
                    .drive_distance_with_odom_time(distance, Duration::from_millis(timeout))
                    .await;
            }
            Action::DriveDistanceSettle {
                distance,
                settle_time,
                settle_error,
            } => {
                chassis
                    .drive_distance_with_odom_settle(
                        distance,
                        Duration::from_millis(settle_time),
                        settle_error,
                    )
                    .await;
            }
            Action::TurnToAngle(heading) => {
                chassis.turn_to_angle(heading).await;
            }
            Action::TurnToAngleTime { heading, timeout } => {
                chassis.turn_to_angle_time(heading, Duration::from_millis(timeout)).await;
            }
            Action::TurnToAngleFor { heading, duration } => {
                chassis.turn_to_angle_d(heading, Duration::from_millis(duration)).await;
            }
            Action::MoveToPosition { x, y } => {
                chassis.move_to_position(x, y).await;
            }
            Action::TurnToPosition { x, y } => {
                chassis.turn_to_position(x, y).await;
            }
            Action::Wait(ms) => chassis.wait(Duration::from_millis(ms)).await,
            Action::Mechanism(command) => mechanisms.borrow_mut().apply(command),
        }
    }
    token.checkpoint()?;
    info!("plan complete");
    Ok(())
}

/// A halt for [`MacroScheduler`](crate::scheduler::MacroScheduler) that stops
/// the drive and every mechanism a plan can command.
pub fn halt_all<D, S, C, M>(
    chassis: Rc<Chassis<D, S, C>>,
    mechanisms: Rc<RefCell<M>>,
) -> impl Fn()
where
    D: Drivetrain,
    S: ChassisSensors,
    C: Clock,
    M: Mechanisms,
{
    move || {
        chassis.stop();
        mechanisms.borrow_mut().halt();
    }
}

/// Mirrors a plan across the field's x = 0 line, for running a route written
/// for one side of the field on the other.
pub fn mirrored<C: Clone>(plan: &[Action<C>]) -> Vec<Action<C>> {
    plan.iter()
        .map(|action| match action.clone() {
            Action::SetPosition { x, y, heading } => Action::SetPosition {
                x: -x,
                y,
                heading: -heading,
            },
            Action::TurnToAngle(heading) => Action::TurnToAngle(-heading),
            Action::TurnToAngleTime { heading, timeout } => Action::TurnToAngleTime {
                heading: -heading,
                timeout,
            },
            Action::TurnToAngleFor { heading, duration } => Action::TurnToAngleFor {
                heading: -heading,
                duration,
            },
            Action::MoveToPosition { x, y } => Action::MoveToPosition { x: -x, y },
            Action::TurnToPosition { x, y } => Action::TurnToPosition { x: -x, y },
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::OdomGeometry,
        hardware::Spawner,
        mechanism::IntakeCommand,
        pose::Pose,
        scheduler::MacroScheduler,
        sim::{SimRobot, SimRuntime, sim_config, sim_intake},
        utils::angle_error,
    };

    #[test]
    fn plan_drives_a_square_corner() {
        let runtime = SimRuntime::new();
        let robot = SimRobot::new(&runtime, OdomGeometry::default(), Pose::default());
        let chassis = robot.chassis(sim_config()).unwrap();
        let plan: [Action<()>; 4] = [
            Action::SetPosition {
                x: -24.0,
                y: 0.0,
                heading: 0.0,
            },
            Action::DriveDistance(24.0),
            Action::TurnToAngle(90.0),
            Action::MoveToPosition { x: 0.0, y: 24.0 },
        ];
        let result =
            runtime.block_on(run_plan(&chassis, &RefCell::new(()), &plan, &CancelToken::new()));
        assert_eq!(result, Ok(()));
        let pose = chassis.pose();
        assert!(pose.distance_to(0.0, 24.0) < 1.0, "{pose:?}");
        assert!(angle_error(pose.heading, 90.0).abs() < 5.0);
    }

    #[test]
    fn mechanism_steps_reach_the_intake() {
        let runtime = SimRuntime::new();
        let robot = SimRobot::new(&runtime, OdomGeometry::default(), Pose::default());
        let chassis = robot.chassis(sim_config()).unwrap();
        let intake = RefCell::new(sim_intake());
        let plan = [
            Action::Mechanism(IntakeCommand::Collect),
            Action::Wait(250),
        ];
        runtime
            .block_on(run_plan(&chassis, &intake, &plan, &CancelToken::new()))
            .unwrap();
        assert_eq!(intake.borrow().main.motors().voltage(), 12.0);
        assert_eq!(runtime.now(), Duration::from_millis(250));
    }

    #[test]
    fn cancelled_macro_halts_drive_and_intake() {
        let runtime = SimRuntime::new();
        let robot = SimRobot::new(&runtime, OdomGeometry::default(), Pose::default());
        let chassis = Rc::new(robot.chassis(sim_config()).unwrap());
        let intake = Rc::new(RefCell::new(sim_intake()));
        let halt = halt_all(chassis.clone(), intake.clone());
        let mut macros = MacroScheduler::new(runtime.clone(), halt);

        runtime.block_on(async {
            macros.start(|token| {
                let (chassis, intake) = (chassis.clone(), intake.clone());
                async move {
                    let plan = [
                        Action::Mechanism(IntakeCommand::Collect),
                        Action::Wait(200),
                        Action::DriveDistance(24.0),
                        Action::Mechanism(IntakeCommand::Score),
                        Action::Wait(1000),
                    ];
                    run_plan(&*chassis, &*intake, &plan, &token).await
                }
            });
            runtime.sleep(Duration::from_millis(400)).await;
            assert_eq!(intake.borrow().main.motors().voltage(), 12.0);
            assert_ne!(robot.voltage(), (0.0, 0.0));

            assert!(macros.cancel().await);
        });
        let intake = intake.borrow();
        assert_eq!(intake.main.motors().voltage(), 0.0);
        assert_eq!(intake.top.motors().voltage(), 0.0);
        assert_eq!(intake.sorter.motors().voltage(), 0.0);
        assert_eq!(robot.voltage(), (0.0, 0.0));
        // the drive in progress finished, the score step never ran
        assert!(chassis.y() > 20.0);
        assert!(!intake.flap.is_extended());
    }

    #[test]
    fn cancelled_token_stops_before_the_next_action() {
        let runtime = SimRuntime::new();
        let robot = SimRobot::new(&runtime, OdomGeometry::default(), Pose::default());
        let chassis = robot.chassis(sim_config()).unwrap();
        let token = CancelToken::new();
        let plan: [Action<()>; 3] = [
            Action::Wait(100),
            Action::DriveDistance(48.0),
            Action::Wait(100),
        ];
        let _watcher = runtime.spawn({
            let (runtime, token) = (runtime.clone(), token.clone());
            async move {
                runtime.sleep(Duration::from_millis(50)).await;
                token.cancel();
            }
        });
        let result = runtime.block_on(run_plan(&chassis, &RefCell::new(()), &plan, &token));
        assert_eq!(result, Err(Cancelled));
        assert_eq!(chassis.y(), 0.0);
        assert_eq!(runtime.now(), Duration::from_millis(100));
    }

    #[test]
    fn mirroring_flips_across_the_centre_line() {
        let plan: [Action<()>; 3] = [
            Action::SetPosition {
                x: -46.0,
                y: 10.5,
                heading: 90.0,
            },
            Action::TurnToAngle(45.0),
            Action::Wait(10),
        ];
        let mirrored = mirrored(&plan);
        assert_eq!(
            mirrored[0],
            Action::SetPosition {
                x: 46.0,
                y: 10.5,
                heading: -90.0
            }
        );
        assert_eq!(mirrored[1], Action::TurnToAngle(-45.0));
        assert_eq!(mirrored[2], Action::Wait(10));
    }
}
