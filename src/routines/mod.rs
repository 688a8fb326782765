//! Competition routes. Coordinates are field inches with the origin at the
//! field centre, routes written for the red alliance's left start.

extern crate alloc;

use alloc::{vec, vec::Vec};

use crate::{
    driver_control::DriverProfile,
    mechanism::{Alliance, IntakeCommand},
    plan::{Action, mirrored},
    utils::units::tile,
};

type Plan = Vec<Action<IntakeCommand>>;

pub struct Routine {
    pub name: &'static str,
    build: fn() -> Plan,
}

impl Routine {
    pub fn plan(&self) -> Plan {
        (self.build)()
    }
}

pub static ROUTINES: &[Routine] = &[
    Routine {
        name: "starting_square",
        build: starting_square,
    },
    Routine {
        name: "left_long_goals",
        build: left_long_goals,
    },
    Routine {
        name: "under_goal_sweep",
        build: under_goal_sweep,
    },
];

pub fn list_names() -> impl Iterator<Item = &'static str> {
    ROUTINES.iter().map(|routine| routine.name)
}

/// Everything picked on the brain before a match: the routine, optionally
/// mirrored onto the other side of the field, the alliance the colour sort keeps
/// and the stick layout the driver uses.
#[derive(Copy, Clone)]
pub struct Selection {
    pub routine: &'static Routine,
    pub mirrored: bool,
    pub alliance: Alliance,
    pub driver: DriverProfile,
}

impl Selection {
    /// Reads a saved selection: a routine name or index followed by any of
    /// `mirrored`, `red` or `blue`, and `tank` or `arcade`. An unrecognised
    /// routine selects the first one and unrecognised words are ignored.
    pub fn parse(text: &str) -> Self {
        let mut words = text.split_whitespace();
        let key = words.next().unwrap_or_default();
        let routine = ROUTINES
            .iter()
            .find(|routine| routine.name.eq_ignore_ascii_case(key))
            .or_else(|| key.parse::<usize>().ok().and_then(|index| ROUTINES.get(index)))
            .unwrap_or(&ROUTINES[0]);

        let mut selection = Self {
            routine,
            ..Self::default()
        };
        for word in words {
            match word.to_ascii_lowercase().as_str() {
                "mirrored" => selection.mirrored = true,
                "red" => selection.alliance = Alliance::Red,
                "blue" => selection.alliance = Alliance::Blue,
                "tank" => selection.driver = DriverProfile::Tank,
                "arcade" => selection.driver = DriverProfile::Arcade,
                _ => {}
            }
        }
        selection
    }

    pub fn plan(&self) -> Plan {
        let plan = self.routine.plan();
        if self.mirrored { mirrored(&plan) } else { plan }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            routine: &ROUTINES[0],
            mirrored: false,
            alliance: Alliance::default(),
            driver: DriverProfile::default(),
        }
    }
}

/// Written back in the form [`Selection::parse`] reads.
impl core::fmt::Display for Selection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.routine.name)?;
        if self.mirrored {
            f.write_str(" mirrored")?;
        }
        write!(f, " {} {}", self.alliance.name(), self.driver.name())
    }
}

/// Driver macro: back off the goal, line up again and run the top stage.
pub fn score_macro() -> Plan {
    vec![
        Action::Mechanism(IntakeCommand::Stop),
        Action::DriveDistanceTime {
            distance: -tile(0.25),
            timeout: 600,
        },
        Action::DriveDistanceTime {
            distance: tile(0.25),
            timeout: 600,
        },
        Action::Mechanism(IntakeCommand::Score),
        Action::Wait(1000),
        Action::Mechanism(IntakeCommand::Stop),
    ]
}

fn starting_square() -> Plan {
    vec![
        Action::SetTurnMaxVoltage(8.0),
        Action::SetPosition {
            x: -47.0,
            y: 15.0,
            heading: 90.0,
        },
        Action::DriveDistance(16.0),
        Action::TurnToAngle(180.0),
        Action::DriveDistance(10.0),
        Action::TurnToAngle(270.0),
        Action::DriveDistance(15.0),
    ]
}

fn left_long_goals() -> Plan {
    use Action::*;
    use IntakeCommand::*;

    vec![
        SetPosition {
            x: -46.0,
            y: 10.5,
            heading: 180.0,
        },
        SetTurnMaxVoltage(8.0),
        // two off the start line
        Mechanism(Collect),
        MoveToPosition { x: -46.0, y: 0.5 },
        Wait(1000),
        // match loader
        DriveDistance(-10.0),
        DriveDistance(-36.2),
        MoveToPosition { x: -58.0, y: 46.7 },
        Wait(1000),
        // long goal 1
        DriveDistance(-5.0),
        MoveToPosition { x: -32.0, y: 46.7 },
        Mechanism(Score),
        Wait(1000),
        // two along the top wall
        Mechanism(Collect),
        DriveDistance(-14.0),
        MoveToPosition { x: -46.0, y: 62.5 },
        Wait(1000),
        // back to the start line
        DriveDistance(-10.0),
        MoveToPosition { x: -30.0, y: 0.0 },
        MoveToPosition { x: -46.0, y: 0.0 },
        Wait(1000),
        // upper centre goal
        DriveDistance(-10.0),
        MoveToPosition { x: -17.5, y: 18.5 },
        MoveToPosition { x: -13.0, y: 13.5 },
        Mechanism(Score),
        Wait(1000),
        // block the lower centre goal
        Mechanism(Stop),
        DriveDistance(-10.0),
        MoveToPosition { x: -19.6, y: -4.9 },
        TurnToAngle(140.0),
        // second match loader
        Mechanism(Collect),
        MoveToPosition { x: -47.0, y: -47.0 },
        MoveToPosition { x: -58.0, y: -47.0 },
        Wait(1000),
        // two along the bottom wall
        DriveDistance(-11.0),
        MoveToPosition { x: -47.0, y: -62.5 },
        Wait(1000),
        // long goal 2
        DriveDistance(-15.5),
        MoveToPosition { x: -31.7, y: -47.0 },
        Mechanism(Score),
        Wait(1000),
        // park
        Mechanism(Stop),
        DriveDistance(-20.0),
        MoveToPosition { x: -63.8, y: -8.2 },
    ]
}

fn under_goal_sweep() -> Plan {
    use Action::*;
    use IntakeCommand::*;

    vec![
        SetTurnMaxVoltage(8.0),
        SetPosition {
            x: -55.5,
            y: -17.0,
            heading: 180.0,
        },
        // clear the park zone
        DriveDistance(2.0),
        MoveToPosition { x: -29.5, y: -60.0 },
        Mechanism(Collect),
        // two red under the long goal
        MoveToPosition { x: -7.5, y: -60.0 },
        MoveToPosition { x: -7.5, y: -56.0 },
        Wait(1000),
        // two blue under the long goal
        DriveDistance(-4.0),
        MoveToPosition { x: 7.5, y: -60.0 },
        MoveToPosition { x: 7.5, y: -56.0 },
        Wait(1000),
        // far match loader
        DriveDistance(-4.0),
        MoveToPosition { x: 33.0, y: -60.0 },
        MoveToPosition { x: 51.0, y: -47.0 },
        MoveToPosition { x: 57.5, y: -47.0 },
        Wait(1000),
        MoveToPosition { x: 32.0, y: -47.0 },
        Mechanism(Score),
        Wait(1000),
        Mechanism(Collect),
        MoveToPosition { x: 57.5, y: -47.0 },
        Wait(1000),
        DriveDistance(-6.5),
        // four from the far park zone
        MoveToPosition { x: 41.0, y: 0.5 },
        MoveToPosition { x: 46.0, y: 0.5 },
        Wait(1000),
        DriveDistance(-5.0),
        // lower centre goal
        MoveToPosition { x: 20.0, y: 21.0 },
        MoveToPosition { x: 17.5, y: 18.0 },
        Mechanism(Eject),
        Wait(1000),
        // two off the far wall
        Mechanism(Collect),
        DriveDistance(-4.0),
        MoveToPosition { x: 46.5, y: 47.0 },
        MoveToPosition { x: 46.5, y: 59.5 },
        Wait(1000),
        DriveDistance(-12.5),
        MoveToPosition { x: 57.5, y: 47.0 },
        Wait(1000),
        // top long goal
        DriveDistance(-4.5),
        MoveToPosition { x: 32.0, y: 47.0 },
        Mechanism(Score),
        Wait(1000),
        // park
        Mechanism(Stop),
        DriveDistance(-4.0),
        MoveToPosition { x: 32.0, y: 34.5 },
        MoveToPosition { x: -60.0, y: 34.5 },
        MoveToPosition { x: -62.0, y: 7.5 },
    ]
}
