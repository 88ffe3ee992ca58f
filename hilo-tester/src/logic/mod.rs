pub mod policy;
pub mod reports;
pub mod simulation;
pub mod tester;

pub use policy::PolicyKind;
pub use tester::*;
