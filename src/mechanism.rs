//! Intake rollers and pneumatics.

use log::debug;
use serde::{Deserialize, Serialize};

/// A single-acting pneumatic valve.
pub trait Solenoid {
    fn set_extended(&mut self, extended: bool);
}

/// One or more motors spun together open-loop.
pub trait Spinner {
    fn set_voltage(&mut self, voltage: f64);
    fn stop(&mut self);
}

/// A set of actuators a plan can command and a cancelled macro must stop.
pub trait Mechanisms {
    type Command: Copy + core::fmt::Debug;

    fn apply(&mut self, command: Self::Command);
    fn halt(&mut self);
}

impl Mechanisms for () {
    type Command = ();

    fn apply(&mut self, _command: ()) {}
    fn halt(&mut self) {}
}

/// Pneumatic with its state held explicitly rather than in a hidden static.
pub struct Toggle<P> {
    piston: P,
    extended: bool,
}

impl<P: Solenoid> Toggle<P> {
    pub fn new(mut piston: P, extended: bool) -> Self {
        piston.set_extended(extended);
        Self { piston, extended }
    }

    /// Flips the piston and returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.set(!self.extended);
        self.extended
    }

    pub fn set(&mut self, extended: bool) {
        if extended != self.extended {
            debug!("piston {}", if extended { "extended" } else { "retracted" });
        }
        self.extended = extended;
        self.piston.set_extended(extended);
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Spin {
    Forward,
    Reverse,
    #[default]
    Stopped,
}

/// A roller stage run at a fixed voltage in either direction.
pub struct Roller<M> {
    motors: M,
    voltage: f64,
    spin: Spin,
}

impl<M: Spinner> Roller<M> {
    pub fn new(mut motors: M, voltage: f64) -> Self {
        motors.stop();
        Self {
            motors,
            voltage,
            spin: Spin::Stopped,
        }
    }

    pub fn spin(&mut self, spin: Spin) {
        self.spin = spin;
        match spin {
            Spin::Forward => self.motors.set_voltage(self.voltage),
            Spin::Reverse => self.motors.set_voltage(-self.voltage),
            Spin::Stopped => self.motors.stop(),
        }
    }

    pub fn stop(&mut self) {
        self.spin(Spin::Stopped);
    }

    pub fn current(&self) -> Spin {
        self.spin
    }

    pub fn motors(&self) -> &M {
        &self.motors
    }
}

/// Which side of the field a game element, or the robot, belongs to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alliance {
    #[default]
    Red,
    Blue,
}

impl Alliance {
    /// Classifies an optical sensor hue in degrees. Hues between the two bands
    /// are neither.
    pub fn from_hue(hue: f64) -> Option<Self> {
        let h = hue.rem_euclid(360.0);
        if !(60.0..300.0).contains(&h) {
            Some(Self::Red)
        } else if (180.0..300.0).contains(&h) {
            Some(Self::Blue)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
        }
    }
}

/// Remembers the colour of the last element past the sensor and decides which
/// way the sorting roller should run: forward keeps it, reverse throws it out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColourSort {
    pub team: Alliance,
    pub last_seen: Alliance,
}

impl ColourSort {
    /// Nothing has been seen yet, so the first elements are kept.
    pub fn new(team: Alliance) -> Self {
        Self {
            team,
            last_seen: team,
        }
    }

    /// Records a sensor reading. `None` leaves the last colour in place.
    pub fn observe(&mut self, seen: Option<Alliance>) {
        if let Some(seen) = seen {
            self.last_seen = seen;
        }
    }

    pub fn direction(&self) -> Spin {
        if self.last_seen == self.team {
            Spin::Forward
        } else {
            Spin::Reverse
        }
    }
}

/// What the intake should be doing right now.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakeCommand {
    /// Pull game elements in and hold them below the top stage.
    Collect,
    /// Pull in and push through the top stage with the flap open.
    Score,
    /// Run everything backwards.
    Eject,
    #[default]
    Stop,
    /// Drop the match-load piston and pull elements in from the loader.
    MatchLoad,
    /// Raise or lower the intake.
    ToggleLift,
}

impl IntakeCommand {
    /// Maps the held intake buttons to a command. A single intake button wins
    /// over the match-load button, which wins over both intake buttons together.
    pub fn from_buttons(collect: bool, eject: bool, match_load: bool) -> Self {
        match (collect, eject, match_load) {
            (true, false, _) => Self::Collect,
            (false, true, _) => Self::Eject,
            (_, _, true) => Self::MatchLoad,
            (true, true, false) => Self::Score,
            (false, false, false) => Self::Stop,
        }
    }

    /// Whether the sorting roller follows the colour sort under this command.
    fn sorts(&self) -> bool {
        matches!(self, Self::Collect | Self::Score | Self::MatchLoad)
    }
}

/// Two-stage intake with a colour-sorting roller between the stages, a scoring
/// flap, a lift and a match-load piston.
pub struct Intake<M, T, P> {
    pub main: Roller<M>,
    pub top: Roller<T>,
    pub sorter: Roller<T>,
    pub flap: Toggle<P>,
    pub lift: Toggle<P>,
    pub match_load: Toggle<P>,
    pub sort: ColourSort,
    pub command: IntakeCommand,
}

impl<M: Spinner, T: Spinner, P: Solenoid> Intake<M, T, P> {
    /// Feeds a colour reading to the sort and turns the sorting roller round if
    /// the verdict changed while it is running.
    pub fn observe(&mut self, seen: Option<Alliance>) {
        let before = self.sort.direction();
        self.sort.observe(seen);
        let after = self.sort.direction();
        if after != before && self.command.sorts() {
            debug!("sorting {:?}: {after:?}", self.sort.last_seen);
            self.sorter.spin(after);
        }
    }
}

impl<M: Spinner, T: Spinner, P: Solenoid> Mechanisms for Intake<M, T, P> {
    type Command = IntakeCommand;

    fn apply(&mut self, command: IntakeCommand) {
        if command.sorts() {
            self.sorter.spin(self.sort.direction());
        }
        match command {
            IntakeCommand::Collect => {
                self.main.spin(Spin::Forward);
                self.top.stop();
                self.flap.set(false);
            }
            IntakeCommand::Score => {
                self.main.spin(Spin::Forward);
                self.top.spin(Spin::Forward);
                self.flap.set(true);
            }
            IntakeCommand::MatchLoad => {
                self.match_load.set(true);
                self.main.spin(Spin::Forward);
            }
            IntakeCommand::Eject => {
                self.main.spin(Spin::Reverse);
                self.top.spin(Spin::Reverse);
                self.sorter.spin(Spin::Forward);
                self.flap.set(false);
            }
            IntakeCommand::Stop => {
                self.main.stop();
                self.top.stop();
                self.sorter.stop();
                self.flap.set(false);
                self.match_load.set(false);
            }
            IntakeCommand::ToggleLift => {
                self.lift.toggle();
                return;
            }
        }
        self.command = command;
    }

    fn halt(&mut self) {
        self.main.stop();
        self.top.stop();
        self.sorter.stop();
        self.command = IntakeCommand::Stop;
    }
}
