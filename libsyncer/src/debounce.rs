//! Leading-edge, trailing-drop coalescing over a fixed set of endpoint names.
//! The first call within a closed window executes and arms the window; calls
//! arriving while the window is open are dropped. At most one execution per
//! window, always the earliest request.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Execute,
    Drop,
}

pub struct Debouncer {
    window: Duration,
    endpoints: HashSet<String>,
    armed_until: Option<Instant>,
}

impl Debouncer {
    pub fn new<I, S>(window: Duration, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            window,
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            armed_until: None,
        }
    }

    /// Endpoints outside the debounced set always execute.
    pub fn admit(&mut self, endpoint: &str) -> Admission {
        if !self.endpoints.contains(endpoint) {
            return Admission::Execute;
        }
        let now = Instant::now();
        match self.armed_until {
            Some(deadline) if now < deadline => Admission::Drop,
            _ => {
                self.armed_until = Some(now + self.window);
                Admission::Execute
            }
        }
    }
}
