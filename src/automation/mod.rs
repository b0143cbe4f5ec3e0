//! Access to the remote catalog: collaborator traits, the exclusive gate
//! around the automation session, and the HTTP implementations.

mod driver;
mod fast_lookup;
mod gate;
mod http_driver;
mod timeouts;
mod wire;

pub use driver::{
    AutomationDriver, AutomationPhase, FastLookup, PageHandle, SearchOptions, SessionCredentials,
    SessionHandle, StageProgress, StageProgressFn,
};
pub use fast_lookup::HttpFastLookup;
pub use gate::{AutomationGate, GateCommand, GateHandle, GateTask, TaskFuture};
pub use http_driver::HttpAutomationDriver;
pub use timeouts::race;
pub use wire::{StageEvent, WireCandidate};
