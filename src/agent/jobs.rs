use super::*;

const RING_SIZE: usize = 3;

/// Remembers the last three `(job_id, ntime)` pairs an upstream has handed out, so a
/// downstream share can be classified as `isTimeChanged` without keeping the whole
/// notify template around.
///
/// Shifts before inserting: `[0] <- [1]; [1] <- [2]; [2] <- new`. The oldest slot is
/// forgotten first; there is no reordering by recency, only ascending arrival order.
#[derive(Debug, Default, Clone)]
pub(crate) struct JobRing {
    slots: [Option<(JobId, Ntime)>; RING_SIZE],
    /// Ids of jobs synthesized locally (e.g. watchdog keep-alive jobs) rather than
    /// relayed from upstream. Shares against these are accepted but never forwarded.
    fake_jobs: HashMap<JobId, ()>,
}

impl JobRing {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, job_id: JobId, ntime: Ntime) {
        self.slots[0] = self.slots[1];
        self.slots[1] = self.slots[2];
        self.slots[2] = Some((job_id, ntime));
    }

    pub(crate) fn push_fake(&mut self, job_id: JobId, ntime: Ntime) {
        self.push(job_id, ntime);
        self.fake_jobs.insert(job_id, ());
    }

    pub(crate) fn is_fake(&self, job_id: JobId) -> bool {
        self.fake_jobs.contains_key(&job_id)
    }

    /// True when `(job_id, ntime)` does not match any remembered slot, meaning the
    /// miner is submitting against a rolled ntime rather than the template as handed
    /// out.
    pub(crate) fn is_time_changed(&self, job_id: JobId, ntime: Ntime) -> bool {
        !self
            .slots
            .iter()
            .any(|slot| *slot == Some((job_id, ntime)))
    }

    pub(crate) fn contains(&self, job_id: JobId) -> bool {
        self.slots.iter().any(|slot| slot.map(|(id, _)| id) == Some(job_id))
    }
}
