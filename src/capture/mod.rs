//! Interaction capture
//!
//! Turns raw document signals into ledger records. Timers and animation
//! frames go through [`Scheduler`] so the host controls the clock.

pub mod dialog;
pub mod events;
pub mod machine;
pub mod observer;
pub mod pending;
pub mod scheduler;

pub use events::{CaptureEvent, ControlChange, EventKind, SelectedFile};
pub use machine::{CaptureMachine, FileTransfer};
pub use observer::{Affordance, StructureWatcher, SubscriptionId};
pub use scheduler::{Scheduler, Task, TaskId};
