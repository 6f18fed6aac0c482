pub mod expected;
pub mod reconciler;
