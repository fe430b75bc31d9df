pub mod artwork;
pub mod column;

pub use artwork::*;
pub use column::*;
