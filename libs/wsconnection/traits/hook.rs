use std::any::Any;

/// Extension point for inbound events the supervisor does not handle itself
///
/// Custom [`Framing`](crate::framing::Framing) implementations can surface
/// their own messages through [`InboundEvent::Application`](crate::InboundEvent::Application);
/// the supervisor passes them here without interpreting them.
pub trait AppMessageHook: Send + Sync {
    fn process_app_message(&self, message: Box<dyn Any + Send>);
}

/// Default hook, drops every application message
pub struct NoOpHook;

impl AppMessageHook for NoOpHook {
    fn process_app_message(&self, _message: Box<dyn Any + Send>) {}
}
