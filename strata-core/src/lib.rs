mod action;
mod aggregate;
mod backend;
mod config;
mod error;
mod filter;
mod lease;
mod mutate;
mod operator;
mod record;
mod security;
mod table;
mod timeout;
mod util;
mod value;

pub use action::*;
pub use aggregate::*;
pub use backend::*;
pub use config::*;
pub use error::*;
pub use filter::*;
pub use lease::*;
pub use mutate::*;
pub use operator::*;
pub use record::*;
pub use security::*;
pub use table::*;
pub use timeout::*;
pub use util::*;
pub use value::*;

pub mod stream {
    pub use ::futures::stream::*;
}
