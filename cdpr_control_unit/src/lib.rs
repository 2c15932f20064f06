//! # CDPR Control Unit Library
//!
//! Real-time control core of a cable-driven parallel robot. Every winch is
//! driven by a servo amplifier speaking a CiA402-style power state machine
//! over a cyclic fieldbus. Once per period the control unit refreshes the
//! process image, tracks the state of every drive and writes back control
//! words and set-points.
//!
//! ## Layers
//!
//! 1. [`drive`]: per-axis protocol state machine and process-image codec
//! 2. [`fieldbus`]: byte-domain exchange with the bus master
//! 3. [`sim`]: software drives for development without hardware
//! 4. [`cycle`]: the cycle body, run by a `cdpr_rt` cyclic executor
//!
//! ## Zero-Allocation RT Loop
//!
//! Drives and the domain are pre-allocated in fixed-capacity storage at
//! startup. The cycle body performs no heap allocation.

pub mod config;
pub mod cycle;
pub mod drive;
pub mod fieldbus;
pub mod sim;
