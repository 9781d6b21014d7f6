use chrono::{DateTime, Duration, Utc};
use log::info;

/// Logs how long one stage of a request (or of cold start) took.
pub struct Timer {
    stage: String,
    started: DateTime<Utc>,
}

impl Timer {
    /// Start timing `stage`
    pub fn start(stage: &str) -> Self {
        info!("{}: starting", stage);

        Timer {
            stage: stage.to_owned(),
            started: Utc::now(),
        }
    }

    /// Stop the timer and log the elapsed time
    pub fn stop(self) -> Duration {
        let elapsed = Utc::now() - self.started;
        info!(
            "{} duration: {} msec",
            self.stage,
            elapsed.num_milliseconds()
        );
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_never_negative() {
        let t = Timer::start("noop");
        assert!(t.stop() >= Duration::zero());
    }
}
