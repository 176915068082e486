pub mod client;
pub mod token;

#[cfg(test)]
pub mod mock;

pub use client::UpstreamClient;
pub use token::TokenAuthenticator;
