pub mod blocks;
pub mod conflict;
pub mod hours;
pub mod payment;
pub mod slots;
