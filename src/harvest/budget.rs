/// Remaining number of configuration bodies a run may still fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestBudget {
    remaining: usize,
}

impl HarvestBudget {
    pub fn new(max_config_count: usize) -> Self {
        Self {
            remaining: max_config_count,
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Spend one unit; returns false (and spends nothing) once exhausted
    pub fn consume(&mut self) -> bool {
        match self.remaining.checked_sub(1) {
            Some(left) => {
                self.remaining = left;
                true
            }
            None => false,
        }
    }
}
