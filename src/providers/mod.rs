pub mod awesome_api;
pub mod util;
pub mod yahoo_finance;
