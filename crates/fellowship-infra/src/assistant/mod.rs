//! Chat assistant implementations.

mod faq;
mod webhook;

pub use faq::FaqAssistant;
pub use webhook::WebhookAssistant;
