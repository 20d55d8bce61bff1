pub mod generate;
pub mod migrate;
pub mod serve;
pub mod token;
pub mod user;
