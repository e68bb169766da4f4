pub mod aggregate;
pub mod intake;
pub mod materialize;
pub mod storage;
pub mod transform;
