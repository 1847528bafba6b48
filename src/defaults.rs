pub const DEFAULT_AVG_SPEED_KMH: f64 = 40.0;

pub const DEFAULT_SERVICE_TIME_MINUTES: f64 = 10.0;

/// Routes with more stops than this run the optimizer scan on the blocking pool.
pub const DEFAULT_OFFLOAD_THRESHOLD: usize = 200;

/// Window for the "delivered recently" statistic.
pub const DELIVERED_STATS_WINDOW_DAYS: i64 = 10;

/// Fresh batch ids tried before a commit gives up on collisions.
pub const BATCH_ID_ATTEMPTS: usize = 3;
