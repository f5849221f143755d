#[macro_use]
extern crate rust_i18n;

i18n!("locales");

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod logging;
pub mod mirror;
pub mod runner;

#[cfg(test)]
pub mod test_utils;

pub fn init_locale() {
    rust_i18n::set_locale("en");
}
