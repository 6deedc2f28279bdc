/// Published engine value: metric name plus its help text.
#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub metric: &'static str,
    pub help: &'static str,
}

pub const SIGNED_DUTY: Tag = Tag {
    metric: "colejorz_duty_percent",
    help: "Current duty cycle, signed by direction (-100..100)",
};

pub const REMAINING_TIMED: Tag = Tag {
    metric: "colejorz_remaining_timed_seconds",
    help: "Seconds left in the active timed run (0 when untimed)",
};

pub const QUEUE_DEPTH: Tag = Tag {
    metric: "colejorz_queue_depth",
    help: "Instructions waiting behind the one being executed",
};

pub const WORKER_RUNNING: Tag = Tag {
    metric: "colejorz_worker_running",
    help: "Engine worker status (1=running, 0=closed)",
};
