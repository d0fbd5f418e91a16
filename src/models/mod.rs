pub mod generation;
pub mod history;
pub mod payment;
pub mod quota;

pub use generation::*;
pub use history::*;
pub use payment::*;
pub use quota::*;
