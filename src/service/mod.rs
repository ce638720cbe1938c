pub mod discounting;
pub mod kpi;

pub use discounting::{ClaimedFigures, DiscountingService, OfferSubmission};
