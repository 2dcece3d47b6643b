//! Signal wizard: pair, time, direction, confirm.
//!
//! `state` holds the pure per-session machine; `engine` owns the session
//! table and performs the outward sends each transition calls for.

pub mod engine;
pub mod menu;
pub mod signal;
pub mod state;
pub mod times;

pub use engine::{SessionKey, WizardEngine};
pub use menu::{Button, ButtonAction, Keyboard};
pub use signal::{Direction, render_signal};
pub use state::{PAIRS, SEND_TOKEN, Screen, Session, Transition, WizardState};
pub use times::{Clock, FixedClock, SystemClock, offer_times};
