mod deletion_executor;
mod eligibility_source;
mod orchestrator;

pub use deletion_executor::*;
pub use eligibility_source::*;
pub use orchestrator::*;

/// Render an error together with its source chain on one line.
///
/// reqwest keeps the interesting part (refused, timed out, DNS) in the
/// sources, which `Display` alone drops.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }
    message
}
