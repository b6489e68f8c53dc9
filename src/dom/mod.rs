pub mod hit;
pub mod library;
pub mod locator;
pub mod query;
pub mod registry;
pub mod response;
pub mod selector;
pub mod wait;

pub use hit::{Hit, PageFunction, Property};
pub use locator::{Kinds, Locator, Policy, Term, Terms};
pub use query::{find, find_all, Parent};
pub use registry::{Layer, Registry};
pub use response::{HitList, Response};
pub use selector::SelectorKind;
pub use wait::{wait_until, Condition, Predicate, Wait, WaitOutcome, WaitTarget};
