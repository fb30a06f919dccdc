//! Runtime core: waits, observers, session and orchestration.
//!
//! - [`poller`]: bounded fixed-interval waits, cancellable through the runtime token;
//! - [`observer`]: turns raw mutations into `ViewReloaded` / `CounterChanged`;
//! - [`slot`]: one live observer per target, attach-then-disconnect hand-off;
//! - [`session`]: login probe and credential bookkeeping;
//! - [`config`]: [`Config`] and its defaults;
//! - [`builder`] / [`runtime`]: wiring and startup.

mod builder;
mod config;
mod observer;
mod poller;
mod runtime;
mod session;
mod slot;

pub use builder::RuntimeBuilder;
pub use config::Config;
pub use observer::ObserverManager;
pub use poller::{poll, ExhaustedFn, PollOutcome, RetryPoller};
pub use runtime::{Runtime, StartReport};
pub use session::{is_logged_in, CredentialSync};
