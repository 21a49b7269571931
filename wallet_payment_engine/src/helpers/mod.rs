mod reference;
mod retry;

pub use reference::{
    generate_admin_reference,
    generate_top_up_order_id,
    validate_manual_reference,
    AdminReferenceKind,
    ReferenceError,
};
pub use retry::{is_storage_contention, RetryPolicy, Retryable};
