//! Runs one driver-triggered macro at a time in the background.

extern crate alloc;

use alloc::{rc::Rc, sync::Arc};
use core::{
    cell::Cell,
    fmt,
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
};

use log::{info, warn};

use crate::hardware::{Halt, Spawner};

/// Shared cancellation flag checked by a routine between steps.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// `Err(Cancelled)` once cancellation was requested, for use with `?`.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A routine stopped early because its token was cancelled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("routine cancelled")
    }
}

impl core::error::Error for Cancelled {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MacroState {
    Idle,
    Running,
    /// Cancellation was requested but the routine has not reached a checkpoint yet.
    CancelRequested,
}

struct Active<H> {
    handle: H,
    finished: Rc<Cell<bool>>,
}

pub struct MacroScheduler<S: Spawner, H> {
    spawner: S,
    halt: H,
    token: CancelToken,
    active: Option<Active<S::Handle<Result<(), Cancelled>>>>,
}

impl<S: Spawner, H: Halt> MacroScheduler<S, H> {
    /// `halt` must stop every actuator a macro may drive.
    pub fn new(spawner: S, halt: H) -> Self {
        Self {
            spawner,
            halt,
            token: CancelToken::new(),
            active: None,
        }
    }

    pub fn state(&self) -> MacroState {
        match &self.active {
            None => MacroState::Idle,
            Some(active) if active.finished.get() => MacroState::Idle,
            Some(_) if self.token.is_cancelled() => MacroState::CancelRequested,
            Some(_) => MacroState::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() != MacroState::Idle
    }

    /// Spawns `routine` with a fresh token unless a macro is already running.
    /// Returns whether it was started.
    pub fn start<F>(&mut self, routine: impl FnOnce(CancelToken) -> F) -> bool
    where
        F: Future<Output = Result<(), Cancelled>> + 'static,
    {
        if self.is_running() {
            return false;
        }
        self.token.reset();

        let finished = Rc::new(Cell::new(false));
        let future = routine(self.token.clone());
        let handle = self.spawner.spawn({
            let finished = finished.clone();
            async move {
                let result = future.await;
                finished.set(true);
                result
            }
        });
        self.active = Some(Active { handle, finished });
        info!("macro started");
        true
    }

    /// Asks the running macro to stop at its next checkpoint without waiting.
    pub fn request_cancel(&self) {
        if self.is_running() {
            self.token.cancel();
        }
    }

    /// Stops every actuator a macro may drive, whether or not one is running.
    pub fn halt(&self) {
        self.halt.halt();
    }

    /// Cancels the running macro, waits for it to return and halts its actuators.
    /// Returns whether there was anything to cancel.
    pub async fn cancel(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        let was_running = !active.finished.get();
        self.token.cancel();
        let result = active.handle.await;
        self.halt.halt();
        if was_running {
            match result {
                Err(Cancelled) => warn!("macro cancelled"),
                Ok(()) => info!("macro finished before it could be cancelled"),
            }
        }
        was_running
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;
    use std::cell::RefCell;

    use super::*;
    use crate::{
        chassis::Chassis,
        config::OdomGeometry,
        hardware::Clock,
        pose::Pose,
        sim::{SimDrivetrain, SimRobot, SimRuntime, SimSensors, sim_config},
    };

    type SimChassis = Chassis<SimDrivetrain, SimSensors, SimRuntime>;

    fn rig() -> (SimRuntime, SimRobot, Rc<SimChassis>) {
        let runtime = SimRuntime::new();
        let robot = SimRobot::new(&runtime, OdomGeometry::default(), Pose::default());
        let chassis = Rc::new(robot.chassis(sim_config()).unwrap());
        (runtime, robot, chassis)
    }

    /// Creeps forward in 100ms steps, recording each step it begins.
    async fn creep(
        chassis: Rc<SimChassis>,
        steps: Rc<RefCell<Vec<u32>>>,
        token: CancelToken,
    ) -> Result<(), Cancelled> {
        for step in 0..5 {
            steps.borrow_mut().push(step);
            chassis.drive_motors(6.0, 6.0);
            chassis.wait(Duration::from_millis(100)).await;
            token.checkpoint()?;
        }
        chassis.stop();
        Ok(())
    }

    #[test]
    fn token_checkpoint_reports_cancellation() {
        let token = CancelToken::new();
        let other = token.clone();
        assert_eq!(token.checkpoint(), Ok(()));
        other.cancel();
        assert_eq!(token.checkpoint(), Err(Cancelled));
        token.reset();
        assert!(!other.is_cancelled());
    }

    #[test]
    fn cancel_stops_the_robot_and_restart_begins_again() {
        let (runtime, robot, chassis) = rig();
        let steps = Rc::new(RefCell::new(Vec::new()));
        let halt = {
            let chassis = chassis.clone();
            move || chassis.stop()
        };
        let mut scheduler = MacroScheduler::new(runtime.clone(), halt);

        runtime.block_on(async {
            assert!(scheduler.start(|token| creep(chassis.clone(), steps.clone(), token)));
            runtime.sleep(Duration::from_millis(250)).await;
            assert_eq!(scheduler.state(), MacroState::Running);
            assert_ne!(robot.voltage(), (0.0, 0.0));

            assert!(scheduler.cancel().await);
            assert_eq!(scheduler.state(), MacroState::Idle);
            assert_eq!(robot.voltage(), (0.0, 0.0));
            assert_eq!(*steps.borrow(), [0, 1, 2]);

            // nothing keeps running in the background
            let parked = robot.true_pose();
            runtime.sleep(Duration::from_millis(500)).await;
            assert_eq!(robot.true_pose(), parked);
            assert_eq!(steps.borrow().len(), 3);

            assert!(scheduler.start(|token| creep(chassis.clone(), steps.clone(), token)));
            runtime.sleep(Duration::from_millis(50)).await;
            assert_eq!(*steps.borrow(), [0, 1, 2, 0]);
            scheduler.cancel().await;
        });
    }

    #[test]
    fn second_start_while_running_is_ignored() {
        let (runtime, _robot, chassis) = rig();
        let runs = Rc::new(Cell::new(0));
        let mut scheduler = MacroScheduler::new(runtime.clone(), || {});

        let routine = |token: CancelToken| {
            let (chassis, runs) = (chassis.clone(), runs.clone());
            async move {
                runs.set(runs.get() + 1);
                chassis.wait(Duration::from_millis(100)).await;
                token.checkpoint()
            }
        };
        runtime.block_on(async {
            assert!(scheduler.start(routine));
            assert!(!scheduler.start(routine));
            runtime.sleep(Duration::from_millis(300)).await;
        });
        assert_eq!(runs.get(), 1);
        assert_eq!(scheduler.state(), MacroState::Idle);
    }

    #[test]
    fn finished_macro_reads_idle_and_can_start_again() {
        let (runtime, robot, chassis) = rig();
        let steps = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = MacroScheduler::new(runtime.clone(), || {});

        runtime.block_on(async {
            scheduler.start(|token| creep(chassis.clone(), steps.clone(), token));
            runtime.sleep(Duration::from_millis(600)).await;
        });
        assert_eq!(scheduler.state(), MacroState::Idle);
        assert_eq!(steps.borrow().len(), 5);
        assert_eq!(robot.voltage(), (0.0, 0.0));
        assert!((chassis.y() - 15.0).abs() < 1e-6);
        assert!(scheduler.start(|token| creep(chassis.clone(), steps.clone(), token)));
    }

    #[test]
    fn request_cancel_is_visible_until_the_checkpoint() {
        let (runtime, _robot, chassis) = rig();
        let steps = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = MacroScheduler::new(runtime.clone(), || {});

        runtime.block_on(async {
            scheduler.start(|token| creep(chassis.clone(), steps.clone(), token));
            runtime.sleep(Duration::from_millis(30)).await;
            scheduler.request_cancel();
            assert_eq!(scheduler.state(), MacroState::CancelRequested);
            runtime.sleep(Duration::from_millis(100)).await;
            assert_eq!(scheduler.state(), MacroState::Idle);
            assert!(!scheduler.cancel().await);
        });
        assert_eq!(*steps.borrow(), [0]);
    }
}
