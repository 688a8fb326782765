//! Drive control for a VEX V5 differential-drive robot: odometry, PID motion
//! primitives, routines as plans and cancellable driver macros.
//!
//! Hardware sits behind the traits in [`hardware`]. On the brain they are
//! implemented over vexide devices in `vex`; on the host `sim` provides a
//! virtual-time executor and a simulated drive base.

#![cfg_attr(target_vendor = "vex", no_std)]

extern crate alloc;

pub mod chassis;
pub mod config;
pub mod driver_control;
pub mod hardware;
pub mod logger;
pub mod mechanism;
pub mod motion;
pub mod odometry;
pub mod pid;
pub mod plan;
pub mod pose;
pub mod routines;
pub mod scheduler;
#[cfg(not(target_vendor = "vex"))]
pub mod sim;
pub mod utils;
#[cfg(target_vendor = "vex")]
pub mod vex;
