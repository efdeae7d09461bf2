//! Web Push delivery: VAPID keys, payload encryption, fan-out and the
//! scheduled notification run.

mod crypto;
pub mod cron;
pub mod diff;
pub mod keys;
pub mod sender;

pub use cron::{CronOptions, CronResult, NotificationCron};
pub use diff::{extract_items_to_notify, filter_new_items};
pub use keys::{
    generate_vapid_keys, validate_vapid_keys, vapid_public_key_from_env, VapidKeyValidation,
    VapidKeys, VAPID_PRIVATE_KEY_ENV, VAPID_PUBLIC_KEY_ENV, VAPID_SUBJECT_ENV,
};
pub use sender::{
    send_notifications, NotificationPayload, PushTransport, SendNotificationsResult, SendResult,
    WebPushClient,
};
