pub mod models {
    pub mod events;
}
pub mod pii;

pub use models::events::{
    BookingConfirmedEvent, ConfirmedTicket, PaymentNotification, ScheduledShowtime,
    ShowtimeScheduledEvent,
};
pub use pii::Masked;
