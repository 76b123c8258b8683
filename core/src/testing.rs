pub mod leak;
pub mod oracle;
pub mod result;
pub mod runner;
pub mod testcase;

pub use leak::*;
pub use oracle::*;
pub use result::*;
pub use runner::*;
pub use testcase::*;
