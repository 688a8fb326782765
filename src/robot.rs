//! The competition robot: ports, SD card settings and the match lifecycle.

extern crate alloc;

use alloc::{boxed::Box, rc::Rc};
use core::{cell::RefCell, time::Duration};

use hurricane_chassis::{
    chassis::{Chassis, ChassisArgs},
    config::{ChassisConfig, ConfigError},
    driver_control::StickShaping,
    hardware::BrakeMode,
    logger,
    mechanism::{ColourSort, Intake, IntakeCommand, Mechanisms, Roller, Toggle},
    plan::{halt_all, run_plan},
    pose::Pose,
    routines::{Selection, score_macro},
    scheduler::{CancelToken, MacroScheduler},
    vex::{ImuTrackers, MotorDrivetrain, VexRuntime, ball_colour, sticks},
};
use log::{LevelFilter, error, info, warn};
use vexide::{fs, prelude::*};

const AUTON_SAVE_PATH: &str = "auton.txt";
const CONFIG_PATH: &str = "chassis.json";

type RobotChassis = Chassis<MotorDrivetrain<3>, ImuTrackers, VexRuntime>;
type RobotIntake = Intake<[Motor; 2], [Motor; 1], AdiDigitalOut>;

pub async fn run(peripherals: Peripherals) {
    let _ = logger::init(LevelFilter::Info);
    match Robot::new(peripherals).await {
        Ok(robot) => robot.compete().await,
        Err(e) => error!("chassis configuration rejected: {e}"),
    }
}

/// `chassis.json` if present and valid, otherwise the built-in tuning.
fn load_config() -> ChassisConfig {
    let Ok(text) = fs::read_to_string(CONFIG_PATH) else {
        return ChassisConfig::default();
    };
    let config = match serde_json::from_str::<ChassisConfig>(&text) {
        Ok(config) => config,
        Err(e) => {
            warn!("ignoring {CONFIG_PATH}: {e}");
            return ChassisConfig::default();
        }
    };
    match config.validate() {
        Ok(()) => {
            info!("loaded {CONFIG_PATH}");
            config
        }
        Err(e) => {
            warn!("ignoring {CONFIG_PATH}: {e}");
            ChassisConfig::default()
        }
    }
}

fn load_selection() -> Selection {
    fs::read_to_string(AUTON_SAVE_PATH)
        .map(|text| Selection::parse(&text))
        .unwrap_or_default()
}

struct Robot {
    controller: Controller,
    chassis: Rc<RobotChassis>,
    intake: Rc<RefCell<RobotIntake>>,
    colour_sensor: OpticalSensor,
    macros: MacroScheduler<VexRuntime, Box<dyn Fn()>>,
    selection: Selection,
}

impl Robot {
    async fn new(peripherals: Peripherals) -> Result<Self, ConfigError> {
        let runtime = VexRuntime::new();
        let drivetrain = MotorDrivetrain::new(
            [
                Motor::new(peripherals.port_1, Gearset::Blue, Direction::Reverse),
                Motor::new(peripherals.port_3, Gearset::Blue, Direction::Forward),
                Motor::new(peripherals.port_5, Gearset::Blue, Direction::Reverse),
            ],
            [
                Motor::new(peripherals.port_2, Gearset::Blue, Direction::Forward),
                Motor::new(peripherals.port_4, Gearset::Blue, Direction::Reverse),
                Motor::new(peripherals.port_6, Gearset::Blue, Direction::Forward),
            ],
        );
        let sensors = ImuTrackers::new(
            InertialSensor::new(peripherals.port_7),
            RotationSensor::new(peripherals.port_8, Direction::Forward),
            Some(RotationSensor::new(peripherals.port_9, Direction::Forward)),
        )
        .await;
        let selection = load_selection();
        let intake = Intake {
            main: Roller::new(
                [
                    Motor::new(peripherals.port_10, Gearset::Blue, Direction::Reverse),
                    Motor::new(peripherals.port_11, Gearset::Blue, Direction::Forward),
                ],
                12.0,
            ),
            top: Roller::new(
                [Motor::new(peripherals.port_12, Gearset::Blue, Direction::Forward)],
                12.0,
            ),
            sorter: Roller::new(
                [Motor::new(peripherals.port_13, Gearset::Blue, Direction::Forward)],
                12.0,
            ),
            flap: Toggle::new(AdiDigitalOut::new(peripherals.adi_a), false),
            lift: Toggle::new(AdiDigitalOut::new(peripherals.adi_b), false),
            match_load: Toggle::new(AdiDigitalOut::new(peripherals.adi_c), false),
            sort: ColourSort::new(selection.alliance),
            command: IntakeCommand::Stop,
        };
        let mut colour_sensor = OpticalSensor::new(peripherals.port_14);
        let _ = colour_sensor.set_led_brightness(1.0);
        let _ = colour_sensor.set_integration_time(Duration::from_millis(20));

        let chassis = Rc::new(Chassis::new(ChassisArgs {
            drivetrain,
            sensors,
            clock: runtime,
            initial_pose: Pose::default(),
            config: load_config(),
        })?);
        let intake = Rc::new(RefCell::new(intake));
        let halt: Box<dyn Fn()> = Box::new(halt_all(chassis.clone(), intake.clone()));

        let robot = Self {
            controller: peripherals.primary_controller,
            chassis,
            intake,
            colour_sensor,
            macros: MacroScheduler::new(runtime, halt),
            selection,
        };
        robot.pre_auton();
        info!("selected routine: {}", robot.selection);
        Ok(robot)
    }

    fn pre_auton(&self) {
        self.chassis.restore_tuning();
        self.chassis.brake(BrakeMode::Coast);
        self.chassis.drive_motors(0.0, 0.0);
        self.chassis.reset_sensors();
    }

    fn start_score_macro(&mut self) {
        let (chassis, intake) = (self.chassis.clone(), self.intake.clone());
        self.macros.start(move |token| async move {
            let plan = score_macro();
            run_plan(&*chassis, &*intake, &plan, &token).await
        });
    }
}

impl Compete for Robot {
    async fn autonomous(&mut self) {
        self.macros.cancel().await;
        self.chassis.reset_sensors();
        self.chassis.restore_tuning();

        info!("autonomous: {}", self.selection);
        let plan = self.selection.plan();
        let token = CancelToken::new();
        if let Err(e) = run_plan(&*self.chassis, &*self.intake, &plan, &token).await {
            warn!("autonomous: {e}");
        }
        self.macros.halt();
    }

    async fn driver(&mut self) {
        info!("driver control");
        self.chassis.brake(BrakeMode::Coast);
        loop {
            let state = self.controller.state().unwrap_or_default();

            if state.button_x.is_now_pressed() {
                self.start_score_macro();
            }
            if state.button_b.is_now_pressed() {
                self.macros.cancel().await;
            }

            let mut intake = self.intake.borrow_mut();
            intake.observe(ball_colour(&self.colour_sensor));
            if !self.macros.is_running() {
                let profile = self.selection.driver;
                self.chassis.drive_with(profile, StickShaping::default(), sticks(&state));
                intake.apply(IntakeCommand::from_buttons(
                    state.front_right_trigger.is_pressed(),
                    state.back_right_trigger.is_pressed(),
                    state.back_left_trigger.is_pressed(),
                ));
                if state.front_left_trigger.is_now_pressed() {
                    intake.apply(IntakeCommand::ToggleLift);
                }
            }
            drop(intake);

            sleep(self.chassis.config().dt).await;
        }
    }

    async fn disabled(&mut self) {
        self.macros.cancel().await;
        self.macros.halt();
    }
}
