//! Per-compilation counters
//!
//! Temporaries, labels and blocks are numbered per compilation so independent
//! compilations never share naming state.

#[derive(Debug, Default)]
pub struct CompileContext {
    temp_count: u32,
    label_count: u32,
    block_count: u32,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh compiler temporary name (`%t0`, `%t1`, ...); the `%` keeps it
    /// out of the identifier space
    pub fn next_temp(&mut self) -> String {
        let name = format!("%t{}", self.temp_count);
        self.temp_count += 1;
        name
    }

    /// Fresh block label (`L0`, `L1`, ...)
    pub fn next_label(&mut self) -> String {
        let name = format!("L{}", self.label_count);
        self.label_count += 1;
        name
    }

    /// Creation-order index for a new block
    pub fn next_block_index(&mut self) -> u32 {
        let index = self.block_count;
        self.block_count += 1;
        index
    }

    pub fn blocks_created(&self) -> u32 {
        self.block_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_independent() {
        let mut a = CompileContext::new();
        let mut b = CompileContext::new();
        assert_eq!(a.next_temp(), "%t0");
        assert_eq!(a.next_temp(), "%t1");
        assert_eq!(b.next_temp(), "%t0");
        assert_eq!(a.next_label(), "L0");
        assert_eq!(a.next_block_index(), 0);
        assert_eq!(a.next_block_index(), 1);
        assert_eq!(a.blocks_created(), 2);
        assert_eq!(b.blocks_created(), 0);
    }
}
