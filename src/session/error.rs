use thiserror::Error;

use crate::templates::TemplateId;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot switch template from {from} to {to}: {reason}")]
    TemplateLocked {
        from: TemplateId,
        to: TemplateId,
        reason: String,
    },

    #[error("insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: u64, available: u64 },
}
