pub mod bookings;
pub mod momo;
pub mod payments;
pub mod pricing;
pub mod reconciliation;
