//! Fieldbus seam.
//!
//! The control cycle exchanges one byte domain per tick: [`Fieldbus::receive`]
//! fills the input entries, the drives update the output entries, then
//! [`Fieldbus::send`] hands the domain back to the bus.
//!
//! # Timing
//!
//! Both calls run inside the RT loop and must not block or allocate.

use thiserror::Error;

use crate::drive::PdoError;

/// Fieldbus errors.
#[derive(Debug, Error)]
pub enum FieldbusError {
    /// Domain handed to the bus is smaller than its process image.
    #[error("domain of {actual} bytes, bus needs {expected}")]
    DomainSize { expected: usize, actual: usize },

    #[error("too many devices: {requested} (max {max})")]
    TooManyDevices { requested: usize, max: usize },

    #[error("process data error: {0}")]
    Pdo(#[from] PdoError),
}

/// Cyclic process-data exchange with the drives.
pub trait Fieldbus: Send {
    /// Backend identifier (e.g. "simulation").
    fn name(&self) -> &'static str;

    /// Number of slaves on the bus.
    fn device_count(&self) -> usize;

    /// Copy the latest inputs of every slave into `domain`.
    fn receive(&mut self, domain: &mut [u8]) -> Result<(), FieldbusError>;

    /// Hand the outputs in `domain` to the slaves.
    fn send(&mut self, domain: &[u8]) -> Result<(), FieldbusError>;
}

/// Check that `domain` covers `expected` bytes.
pub fn check_domain(domain: &[u8], expected: usize) -> Result<(), FieldbusError> {
    if domain.len() < expected {
        return Err(FieldbusError::DomainSize {
            expected,
            actual: domain.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_domain_is_rejected() {
        let domain = [0u8; 10];
        assert!(check_domain(&domain, 10).is_ok());
        let err = check_domain(&domain, 34).unwrap_err();
        assert_eq!(err.to_string(), "domain of 10 bytes, bus needs 34");
    }
}
