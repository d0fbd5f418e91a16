pub mod extractor;
pub mod generation;
pub mod history_ledger;
pub mod metrics;
pub mod payment;
pub mod prompts;
pub mod provider;
pub mod quota_ledger;
pub mod user_locks;

pub use extractor::*;
pub use generation::*;
pub use history_ledger::*;
pub use metrics::*;
pub use payment::*;
pub use prompts::*;
pub use provider::*;
pub use quota_ledger::*;
pub use user_locks::*;
