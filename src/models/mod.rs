mod deletion;
mod eligible_file;

pub use deletion::*;
pub use eligible_file::*;
