pub mod cancel;
pub mod config;
pub mod derive;
pub mod error;
pub mod event;
pub mod ics;
pub mod identity;
pub mod outline;
pub mod reconcile;
pub mod remote;
pub mod snapshot;
