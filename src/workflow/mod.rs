pub mod fallback;
pub mod question_ctx;
pub mod question_flow;

pub use fallback::{run_fallback, FallbackState};
pub use question_ctx::QuestionCtx;
pub use question_flow::QuestionFlow;
