pub mod alert;
pub mod alert_mute;
pub mod alert_rule;
pub mod dispatch_log;
pub mod notification_channel;
