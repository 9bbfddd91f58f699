// src/progress.rs
use crate::pipeline::Stage;

/// Observer for a pipeline run. Frontends implement this to surface status;
/// it never influences the run itself.
pub trait Progress {
    /// A state-machine transition.
    fn stage(&mut self, _stage: Stage) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// One scroll+wait cycle of the capture finished (1-based).
    fn scrolled(&mut self, _done: u32, _total: u32) {}

    /// A progress message from the autonomous executor, in arrival order.
    fn agent_message(&mut self, _text: &str) {}

    /// Called at the end, successful or not.
    fn finish(&mut self, _ok: bool) {}
}

/// Records everything it sees. Handy in tests and for post-mortems.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub stages: Vec<Stage>,
    pub logs: Vec<String>,
    pub scrolls: Vec<(u32, u32)>,
    pub agent_messages: Vec<String>,
    pub finished: Option<bool>,
}

impl Progress for RecordingProgress {
    fn stage(&mut self, stage: Stage) { self.stages.push(stage); }
    fn log(&mut self, msg: &str) { self.logs.push(s!(msg)); }
    fn scrolled(&mut self, done: u32, total: u32) { self.scrolls.push((done, total)); }
    fn agent_message(&mut self, text: &str) { self.agent_messages.push(s!(text)); }
    fn finish(&mut self, ok: bool) { self.finished = Some(ok); }
}
