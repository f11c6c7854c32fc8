pub mod invoice;
pub mod order;
pub mod order_note;
pub mod payment;
pub mod payment_transaction;
