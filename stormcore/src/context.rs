use crate::timer::TimerWheel;
use crate::Job;
use ion::logging::Logger;
use std::time::Instant;

/// Run-wide state threaded through every engine call: the timer wheel, the
/// global routing-session gauge and the init/teardown phase flags. Created
/// once at start, torn down once at exit, mutated only from the wheel
/// thread.
pub struct Context {
    pub wheel: TimerWheel<Job>,
    pub now: Instant,
    pub routing_sessions: u32,
    pub init_phase: bool,
    pub teardown: bool,
    pub log: Logger,
}

impl Context {
    pub fn new(log: Logger, now: Instant) -> Context {
        Context {
            wheel: TimerWheel::new(),
            now,
            routing_sessions: 0,
            init_phase: true,
            teardown: false,
            log,
        }
    }

    #[inline]
    pub fn session_up(&mut self) {
        self.routing_sessions += 1;
    }

    /// Decrements the routing-session gauge with a floor at zero; error
    /// paths may reach this twice for the same session.
    #[inline]
    pub fn session_down(&mut self) {
        self.routing_sessions = self.routing_sessions.saturating_sub(1);
    }
}
