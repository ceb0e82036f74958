//! Thread context: which namespace serves lookups made "from here".
//!
//! # Responsibility
//! - Track the declaring types active on each thread ([`call_stack`]).
//! - Hold the per-thread ambient namespace ([`ambient`]).
//! - Resolve the serving namespace from the stack ([`resolver`]) and expose
//!   it as a forwarding namespace ([`loader`]).

pub mod ambient;
pub mod call_stack;
pub mod loader;
pub mod resolver;

pub use ambient::AmbientGuard;
pub use call_stack::{enter_frame, with_stack, CallStack, FrameGuard};
pub use loader::ContextAwareLoader;
pub use resolver::ContextResolver;
