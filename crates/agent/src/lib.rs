//! The session loop at the heart of Careers.
//!
//! One run follows a **Generate → Call → Observe** cycle:
//!
//! 1. **Validate** the inbound conversation against the tool registry
//! 2. **Send to LLM** with the career counselor prompt and every tool declaration
//! 3. **Relay** text deltas and tool calls to the caller as they arrive
//! 4. **If tool calls**: execute them in order, append the results, loop back to step 2
//! 5. **If text only**: the run stops naturally
//!
//! The loop also stops when the step ceiling is reached, the time budget
//! elapses, or the caller goes away.

pub mod prompt;
pub mod session;
pub mod stream_event;

pub use prompt::CAREER_COUNSELOR_PROMPT;
pub use session::{SessionLoop, SessionOutcome, SessionRun, Termination};
pub use stream_event::SessionEvent;
