/// Settings of a [`Level`](crate::Level)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct LevelConfig {
    /// Initial simulation time multiplier
    pub time_rate: f32,
    /// Upper bound of the real delta consumed by a single frame, in seconds
    pub max_delta: f32,
    /// Size of a dedicated worker pool for parallel dispatch.
    ///
    /// `None` uses the global rayon pool.
    pub worker_threads: Option<usize>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            time_rate: 1.0,
            max_delta: 0.25,
            worker_threads: None,
        }
    }
}

impl LevelConfig {
    pub fn with_time_rate(mut self, time_rate: f32) -> Self {
        self.time_rate = time_rate;
        self
    }

    pub fn with_max_delta(mut self, max_delta: f32) -> Self {
        self.max_delta = max_delta;
        self
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = Some(worker_threads);
        self
    }

    pub(crate) fn build_pool(&self) -> crate::Result<Option<rayon::ThreadPool>> {
        let Some(threads) = self.worker_threads else {
            return Ok(None);
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ordo-worker-{i}"))
            .build()?;

        Ok(Some(pool))
    }
}
