// libs/notification-cell/src/services/mod.rs

pub mod calendar;
pub mod email;
pub mod notification;
pub mod reminders;
pub mod sms;

pub use calendar::CalendarClient;
pub use email::EmailSender;
pub use notification::NotificationService;
pub use reminders::ReminderScheduler;
pub use sms::SmsSender;
