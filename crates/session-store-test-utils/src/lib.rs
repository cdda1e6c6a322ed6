// session-store-test-utils: conformance suite shared by every backend.
//
// - `AdapterFixture` is implemented once per backend
// - `TestAdapter` runs the `Case` list against fresh adapters
// - `ManualClock` drives expiry deterministically

pub mod cases;
pub mod clock;
pub mod fixture;
pub mod test_adapter;
pub mod test_suite;

pub use cases::{Case, Outcome};
pub use clock::{suite_epoch, ManualClock};
pub use fixture::{
    test_tables, AdapterFixture, TestSession, TestSessionAttributes, TestUser, TestUserAttributes,
};
pub use test_adapter::TestAdapter;
pub use test_suite::{CaseFailure, TestLogger, TestSuite, TestSuiteConfig, TestSuiteStats};
