//! Effect boundary: intake, validation, idempotency, PDP call, lifecycle
//! state machine.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod boundary;
mod effect_request;
mod error;
mod lifecycle;

pub use boundary::DEFAULT_IDEMPOTENCY_TTL_SECONDS;
pub use boundary::EffectBoundary;
pub use boundary::PdpAdapter;
pub use boundary::PdpVerdict;
pub use effect_request::EffectContext;
pub use effect_request::EffectRequest;
pub use effect_request::EffectType;
pub use effect_request::Idempotency;
pub use effect_request::KeyDerivation;
pub use effect_request::Payload;
pub use effect_request::Subject;
pub use effect_request::generate_effect_id;
pub use error::BoundaryError;
pub use error::Result;
pub use lifecycle::EffectLifecycle;
pub use lifecycle::LifecycleState;
