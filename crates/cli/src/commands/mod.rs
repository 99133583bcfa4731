pub mod ops;
pub mod run;
pub mod task;

pub use ops::*;
pub use run::*;
pub use task::*;
