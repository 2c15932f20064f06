//! Drive protocol types shared by the control unit and its tooling.

pub mod command;
pub mod pdo;
pub mod state;
pub mod words;

pub use command::DriveCommand;
pub use state::{DriveState, OperationMode};
pub use words::{ControlWord, StatusWord};
