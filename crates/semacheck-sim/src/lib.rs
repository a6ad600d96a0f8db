//! Reference in-process execution engine.
//!
//! [`SimRuntime`] implements [`semacheck_runtime::ClRuntime`] and, through
//! [`SimSemaphores`], [`semacheck_runtime::SemaphoreExt`]. A device worker
//! thread advances every command through
//! `Queued -> Submitted -> Ready -> Running -> Complete`, honouring explicit
//! wait lists, in-order queue chaining, out-of-order barriers and binary
//! semaphore payloads. [`DriverQuirk`]s inject specific non-conformant
//! behaviour.

pub mod config;
pub mod runtime;
mod state;

pub use config::{
    DriverQuirk, EXTERNAL_SEMAPHORE_EXTENSION, SEMAPHORE_EXTENSION, SimConfigError,
    SimDeviceConfig,
};
pub use runtime::{SimError, SimRuntime, SimSemaphores};
