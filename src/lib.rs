//! Pulls venture funding deals out of a climate-tech newsletter archive: discovers
//! issues, cuts out each issue's deals section, asks a language model to structure
//! every deal, and keeps a deduplicated SQLite table of the results.

pub mod clean;
pub mod corpus;
pub mod db;
pub mod deal;
pub mod discover;
pub mod extract;
pub mod ledger;
pub mod locate;
pub mod pace;
pub mod parser;
pub mod pipeline;
pub mod settings;
pub mod sitemap;
pub mod validate;
