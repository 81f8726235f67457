pub mod engine;
pub mod message;

#[cfg(test)]
mod tests;

pub use engine::{FulfillmentEngine, FulfillmentOutcome, PaymentInfo};
