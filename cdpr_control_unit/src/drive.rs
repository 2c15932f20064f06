//! Drive protocol layer: process image, transition table, state machine.

pub mod machine;
pub mod pdo;
pub mod transition;

pub use machine::DriveStateMachine;
pub use pdo::{AXIS_IMAGE_SIZE, InputPdos, OutputPdos, PdoError, PdoOffsets};
pub use transition::{DriveEvent, Transition, transition};
