//! Host-side simulator: a virtual-time executor and a kinematic drive base.
//!
//! Nothing here sleeps for real. When every task is blocked the clock jumps to
//! the earliest sleeper, so a 15 second routine runs in milliseconds and always
//! produces the same result.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, VecDeque},
    future::Future,
    pin::{Pin, pin},
    rc::Rc,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll, Waker},
    time::Duration,
};

use async_task::{Runnable, Task};
use waker_fn::waker_fn;

use crate::{
    chassis::{Chassis, ChassisArgs},
    config::{ChassisConfig, ConfigError, GainSet, OdomGeometry, TrackerLayout, TrackingWheel},
    hardware::{BrakeMode, ChassisSensors, Clock, Drivetrain, Spawner},
    mechanism::{Alliance, ColourSort, Intake, IntakeCommand, Roller, Solenoid, Spinner, Toggle},
    pose::{Pose, local_to_field},
    utils::normalize_heading,
};

/// Gains that suit the simulated drive base. The competition tuning in
/// [`ChassisConfig::default`] is for the real robot.
pub fn sim_config() -> ChassisConfig {
    ChassisConfig {
        drive_gains: GainSet::new(1.5, 0.0, 0.05, 0.25, 150, 3000),
        turn_gains: GainSet::new(0.4, 0.0, 0.005, 0.5, 150, 3000),
        ..ChassisConfig::default()
    }
}

/// An intake built from simulated parts that nothing observes.
pub fn sim_intake() -> Intake<SimSpinner, SimSpinner, SimPiston> {
    Intake {
        main: Roller::new(SimSpinner::default(), 12.0),
        top: Roller::new(SimSpinner::default(), 12.0),
        sorter: Roller::new(SimSpinner::default(), 12.0),
        flap: Toggle::new(SimPiston::default(), false),
        lift: Toggle::new(SimPiston::default(), false),
        match_load: Toggle::new(SimPiston::default(), false),
        sort: ColourSort::new(Alliance::Red),
        command: IntakeCommand::Stop,
    }
}

/// Distance between the left and right wheels, inches.
pub const TRACK_WIDTH: f64 = 12.0;
/// Wheel surface speed at 12 V, inches per second.
pub const FREE_SPEED: f64 = 60.0;
const SUBSTEP: Duration = Duration::from_millis(1);

#[derive(Default)]
struct Sleepers {
    sleepers: BTreeMap<(Duration, u64), Waker>,
    next_id: u64,
}

struct Executor {
    queue: Arc<Mutex<VecDeque<Runnable>>>,
    sleepers: RefCell<Sleepers>,
    now: Cell<Duration>,
}

/// Single-threaded executor and clock. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SimRuntime {
    executor: Rc<Executor>,
}

impl Default for SimRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRuntime {
    pub fn new() -> Self {
        Self {
            executor: Rc::new(Executor {
                queue: Arc::new(Mutex::new(VecDeque::new())),
                sleepers: RefCell::new(Sleepers::default()),
                now: Cell::new(Duration::ZERO),
            }),
        }
    }

    fn pop_runnable(&self) -> Option<Runnable> {
        self.executor
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }

    /// Jumps to the earliest pending sleeper and wakes it. Returns `false` when
    /// nothing is sleeping.
    fn advance(&self) -> bool {
        let next = self.executor.sleepers.borrow_mut().sleepers.pop_first();
        match next {
            Some(((deadline, _), waker)) => {
                if deadline > self.executor.now.get() {
                    self.executor.now.set(deadline);
                }
                waker.wake();
                true
            }
            None => false,
        }
    }

    /// Drives `future` and every spawned task to completion of `future`.
    ///
    /// # Panics
    ///
    /// Panics if `future` is still pending when no task can make progress.
    pub fn block_on<T>(&self, future: impl Future<Output = T>) -> T {
        let mut future = pin!(future);
        let woken = Arc::new(AtomicBool::new(true));
        let waker = waker_fn({
            let woken = woken.clone();
            move || woken.store(true, Ordering::Relaxed)
        });
        let mut cx = Context::from_waker(&waker);

        loop {
            if woken.swap(false, Ordering::Relaxed)
                && let Poll::Ready(output) = future.as_mut().poll(&mut cx)
            {
                return output;
            }
            if let Some(runnable) = self.pop_runnable() {
                runnable.run();
                continue;
            }
            if woken.load(Ordering::Relaxed) {
                continue;
            }
            assert!(self.advance(), "simulation deadlocked: nothing is runnable or sleeping");
        }
    }
}

impl Clock for SimRuntime {
    fn now(&self) -> Duration {
        self.executor.now.get()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        Sleep {
            executor: self.executor.clone(),
            deadline: self.executor.now.get() + duration,
            id: None,
        }
    }
}

impl Spawner for SimRuntime {
    type Handle<T: 'static> = Task<T>;

    fn spawn<T: 'static>(&self, future: impl Future<Output = T> + 'static) -> Task<T> {
        let queue = self.executor.queue.clone();
        let (runnable, task) = async_task::spawn_local(future, move |runnable| {
            queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push_back(runnable);
        });
        runnable.schedule();
        task
    }
}

struct Sleep {
    executor: Rc<Executor>,
    deadline: Duration,
    id: Option<u64>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.executor.now.get() >= self.deadline {
            return Poll::Ready(());
        }
        let mut sleepers = self.executor.sleepers.borrow_mut();
        let id = match self.id {
            Some(id) => id,
            None => {
                sleepers.next_id += 1;
                sleepers.next_id
            }
        };
        sleepers
            .sleepers
            .insert((self.deadline, id), cx.waker().clone());
        drop(sleepers);
        self.id = Some(id);
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.executor
                .sleepers
                .borrow_mut()
                .sleepers
                .remove(&(self.deadline, id));
        }
    }
}

struct Body {
    pose: Pose,
    geometry: OdomGeometry,
    voltage: (f64, f64),
    brake_mode: BrakeMode,
    tracker_travel: [f64; 2],
    last_update: Duration,
    heading_zero: f64,
    tracker_zero: [f64; 2],
    commands: Vec<(f64, f64)>,
}

impl Body {
    /// Integrates the motion up to `now` with the voltages currently applied.
    fn advance_to(&mut self, now: Duration) {
        while self.last_update < now {
            let step = SUBSTEP.min(now - self.last_update);
            self.last_update += step;
            let h = step.as_secs_f64();

            let (left, right) = self.voltage;
            let v_left = left / 12.0 * FREE_SPEED;
            let v_right = right / 12.0 * FREE_SPEED;
            let forward = (v_left + v_right) / 2.0 * h;
            let dtheta = (v_left - v_right) / TRACK_WIDTH * h;

            let mid = self.pose.heading + dtheta.to_degrees() / 2.0;
            let (dx, dy) = local_to_field(forward, 0.0, mid);
            self.pose.x += dx;
            self.pose.y += dy;
            self.pose.heading = normalize_heading(self.pose.heading + dtheta.to_degrees());

            let wheels = self.wheels();
            for (travel, wheel) in self.tracker_travel.iter_mut().zip(wheels) {
                if let Some(wheel) = wheel {
                    *travel += forward * wheel.angle.to_radians().cos() - wheel.offset * dtheta;
                }
            }
        }
    }

    fn wheels(&self) -> [Option<TrackingWheel>; 2] {
        match self.geometry.layout {
            TrackerLayout::Single { wheel } => [Some(wheel), None],
            TrackerLayout::Pair { first, second } => [Some(first), Some(second)],
        }
    }

    fn revolutions(&self) -> [f64; 2] {
        let per_rev = self.geometry.wheel_circumference() * self.geometry.gear_ratio;
        [
            self.tracker_travel[0] / per_rev - self.tracker_zero[0],
            self.tracker_travel[1] / per_rev - self.tracker_zero[1],
        ]
    }
}

/// A simulated robot. Hand out its drivetrain and sensors to a [`Chassis`].
#[derive(Clone)]
pub struct SimRobot {
    runtime: SimRuntime,
    body: Rc<RefCell<Body>>,
}

impl SimRobot {
    pub fn new(runtime: &SimRuntime, geometry: OdomGeometry, pose: Pose) -> Self {
        let now = runtime.now();
        Self {
            runtime: runtime.clone(),
            body: Rc::new(RefCell::new(Body {
                pose,
                geometry,
                voltage: (0.0, 0.0),
                brake_mode: BrakeMode::default(),
                tracker_travel: [0.0; 2],
                last_update: now,
                // the IMU reads zero at power-on whatever way the robot faces
                heading_zero: pose.heading,
                tracker_zero: [0.0; 2],
                commands: Vec::new(),
            })),
        }
    }

    fn body(&self) -> std::cell::RefMut<'_, Body> {
        let mut body = self.body.borrow_mut();
        body.advance_to(self.runtime.now());
        body
    }

    /// Builds a chassis on this robot, starting from its true pose.
    pub fn chassis(
        &self,
        config: ChassisConfig,
    ) -> Result<Chassis<SimDrivetrain, SimSensors, SimRuntime>, ConfigError> {
        let initial_pose = self.true_pose();
        Chassis::new(ChassisArgs {
            drivetrain: SimDrivetrain(self.clone()),
            sensors: SimSensors(self.clone()),
            clock: self.runtime.clone(),
            initial_pose,
            config,
        })
    }

    /// Where the robot really is, as opposed to where odometry thinks it is.
    pub fn true_pose(&self) -> Pose {
        self.body().pose
    }

    pub fn voltage(&self) -> (f64, f64) {
        self.body().voltage
    }

    pub fn brake_mode(&self) -> BrakeMode {
        self.body().brake_mode
    }

    /// Every left/right voltage pair commanded so far, stops included.
    pub fn commands(&self) -> Vec<(f64, f64)> {
        self.body().commands.clone()
    }
}

pub struct SimDrivetrain(SimRobot);

impl Drivetrain for SimDrivetrain {
    fn set_voltage(&mut self, left: f64, right: f64) {
        let mut body = self.0.body();
        body.voltage = (left, right);
        body.commands.push((left, right));
    }

    fn stop(&mut self) {
        self.set_voltage(0.0, 0.0);
    }

    fn set_brake_mode(&mut self, mode: BrakeMode) {
        self.0.body().brake_mode = mode;
    }
}

pub struct SimSensors(SimRobot);

impl ChassisSensors for SimSensors {
    fn heading(&self) -> f64 {
        let body = self.0.body();
        normalize_heading(body.pose.heading - body.heading_zero)
    }

    fn tracker_revolutions(&self) -> [f64; 2] {
        self.0.body().revolutions()
    }

    fn reset(&mut self) {
        let mut body = self.0.body();
        body.heading_zero = body.pose.heading;
        body.tracker_zero = [0.0; 2];
        body.tracker_zero = body.revolutions();
    }
}

/// Records the voltage last sent to a motor group.
#[derive(Clone, Default)]
pub struct SimSpinner(Rc<Cell<f64>>);

impl SimSpinner {
    pub fn voltage(&self) -> f64 {
        self.0.get()
    }
}

impl Spinner for SimSpinner {
    fn set_voltage(&mut self, voltage: f64) {
        self.0.set(voltage);
    }

    fn stop(&mut self) {
        self.0.set(0.0);
    }
}

#[derive(Clone, Default)]
pub struct SimPiston(Rc<Cell<bool>>);

impl SimPiston {
    pub fn is_extended(&self) -> bool {
        self.0.get()
    }
}

impl Solenoid for SimPiston {
    fn set_extended(&mut self, extended: bool) {
        self.0.set(extended);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleeping_advances_virtual_time() {
        let runtime = SimRuntime::new();
        runtime.block_on(async {
            runtime.sleep(Duration::from_millis(250)).await;
            runtime.sleep(Duration::from_secs(2)).await;
        });
        assert_eq!(runtime.now(), Duration::from_millis(2250));
    }

    #[test]
    fn spawned_tasks_interleave_by_deadline() {
        let runtime = SimRuntime::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let task = runtime.spawn({
            let (runtime, order) = (runtime.clone(), order.clone());
            async move {
                for i in 0..3 {
                    runtime.sleep(Duration::from_millis(30)).await;
                    order.borrow_mut().push(("bg", i));
                }
                7
            }
        });
        let result = runtime.block_on(async {
            for i in 0..2 {
                runtime.sleep(Duration::from_millis(40)).await;
                order.borrow_mut().push(("fg", i));
            }
            task.await
        });
        assert_eq!(result, 7);
        assert_eq!(
            *order.borrow(),
            [("bg", 0), ("fg", 0), ("bg", 1), ("fg", 1), ("bg", 2)]
        );
    }

    #[test]
    fn full_voltage_drives_at_free_speed() {
        let runtime = SimRuntime::new();
        let robot = SimRobot::new(&runtime, OdomGeometry::default(), Pose::new(0.0, 0.0, 90.0));
        let mut drivetrain = SimDrivetrain(robot.clone());
        runtime.block_on(async {
            drivetrain.set_voltage(12.0, 12.0);
            runtime.sleep(Duration::from_millis(500)).await;
            drivetrain.stop();
        });
        let pose = robot.true_pose();
        assert!((pose.x - FREE_SPEED / 2.0).abs() < 1e-9);
        assert!(pose.y.abs() < 1e-9);
    }

    #[test]
    fn sensors_read_relative_to_power_on() {
        let runtime = SimRuntime::new();
        let robot = SimRobot::new(&runtime, OdomGeometry::default(), Pose::new(0.0, 0.0, 90.0));
        let mut drivetrain = SimDrivetrain(robot.clone());
        let mut sensors = SimSensors(robot.clone());
        assert_eq!(sensors.heading(), 0.0);
        runtime.block_on(async {
            // spin clockwise in place
            drivetrain.set_voltage(6.0, -6.0);
            runtime.sleep(Duration::from_millis(100)).await;
            drivetrain.stop();
        });
        let expected = (2.0 * 30.0 / TRACK_WIDTH * 0.1).to_degrees();
        assert!((sensors.heading() - expected).abs() < 1e-9);
        assert!(sensors.tracker_revolutions()[0] != 0.0);
        sensors.reset();
        assert_eq!(sensors.heading(), 0.0);
        assert_eq!(sensors.tracker_revolutions(), [0.0, 0.0]);
    }
}
