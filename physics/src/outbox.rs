use shared::ReportBuffer;

/// Room for a world report of 32 bodies before the first reallocation.
const INITIAL_CAPACITY: usize = 3 + 32 * shared::response::WORLD_RECORD_LEN;

/// Report buffers owned by the solver side: a pool of buffers the host has
/// handed back, and the reports posted since the last drain.
#[derive(Debug, Default)]
pub struct Outbox {
    pool: Vec<ReportBuffer>,
    posted: Vec<ReportBuffer>,
    allocated: usize,
}

impl Outbox {
    /// Takes a recycled buffer, allocating only when the pool is empty.
    pub fn take(&mut self) -> ReportBuffer {
        match self.pool.pop() {
            Some(buffer) => buffer,
            None => {
                self.allocated += 1;
                log::trace!("allocating report buffer #{}", self.allocated);
                ReportBuffer::with_capacity(INITIAL_CAPACITY)
            }
        }
    }

    pub fn post(&mut self, report: ReportBuffer) {
        self.posted.push(report);
    }

    pub fn recycle(&mut self, buffer: ReportBuffer) {
        self.pool.push(buffer);
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, ReportBuffer> {
        self.posted.drain(..)
    }

    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    /// How many buffers were ever allocated by [`Outbox::take`].
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycled_buffers_are_reused() {
        let mut outbox = Outbox::default();

        let mut report = outbox.take();
        report.write_world(1, std::iter::empty());
        let ptr = report.storage_ptr();
        outbox.post(report);

        let posted: Vec<_> = outbox.drain().collect();
        assert_eq!(posted.len(), 1);

        for buffer in posted {
            outbox.recycle(buffer);
        }
        assert_eq!(outbox.pooled(), 1);

        let reused = outbox.take();
        assert_eq!(reused.storage_ptr(), ptr);
        assert_eq!(outbox.allocated(), 1);
    }
}
