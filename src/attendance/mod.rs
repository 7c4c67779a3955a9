pub(crate) mod commands;
pub mod controller;
pub mod state;

pub use controller::{
    ActionOutcome, AttendanceController, AttendanceSnapshot, ControllerConfig,
    PendingCheckoutView,
};
pub use state::{AttendanceAction, AttendanceSession, AttendanceStatus, WorkingTime};
