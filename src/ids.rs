use shared::BodyId;

use crate::error::{Error, Result};

pub use shared::request::MAX_BODY_ID;

/// Hands out body ids in increasing order. Ids are never reused.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: BodyId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> Result<BodyId> {
        if self.next > MAX_BODY_ID {
            return Err(Error::IdsExhausted);
        }

        let id = self.next;
        self.next += 1;
        Ok(id)
    }

    /// How many ids were handed out.
    pub fn allocated(&self) -> u32 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_until_exhausted() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate().unwrap(), 0);
        assert_eq!(ids.allocate().unwrap(), 1);

        ids.next = MAX_BODY_ID;
        assert_eq!(ids.allocate().unwrap(), MAX_BODY_ID);
        assert!(matches!(ids.allocate(), Err(Error::IdsExhausted)));
        assert_eq!(MAX_BODY_ID as f32 as BodyId, MAX_BODY_ID);
    }
}
