pub mod candidate;
pub mod coverage;
pub mod materialize;
pub mod sandbox;
pub mod validate;
