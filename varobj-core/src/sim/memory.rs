//! Simulated target memory
//!
//! Little-endian byte regions handed out by a bump allocator. Regions are
//! separated by unmapped gaps, so running off the end of an object or
//! following a wild pointer fails the way it does on a real target.

use std::collections::BTreeMap;

use crate::error::EvalError;

const BASE_ADDRESS: u64 = 0x1000;
const ALIGN: u64 = 16;

#[derive(Debug)]
pub struct Memory {
    regions: BTreeMap<u64, Vec<u8>>,
    next: u64,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            regions: BTreeMap::new(),
            next: BASE_ADDRESS,
        }
    }
}

impl Memory {
    /// Allocate `size` zeroed bytes and return their address.
    pub fn alloc(&mut self, size: u64) -> u64 {
        let address = self.next;
        let size = size.max(1);
        self.regions.insert(address, vec![0; size as usize]);
        self.next = address + size.div_ceil(ALIGN) * ALIGN + ALIGN;
        address
    }

    /// Unmap the region starting at `address`.
    pub fn free(&mut self, address: u64) -> bool {
        self.regions.remove(&address).is_some()
    }

    /// The region holding `[address, address + len)` and the offset of
    /// `address` inside it.
    fn locate(&self, address: u64, len: u64) -> Result<(u64, usize), EvalError> {
        let fault = EvalError::MemoryAccess { address };
        let (&start, bytes) = self.regions.range(..=address).next_back().ok_or(fault.clone())?;
        let offset = address - start;
        if offset + len > bytes.len() as u64 {
            return Err(fault);
        }
        Ok((start, offset as usize))
    }

    pub fn read(&self, address: u64, len: u64) -> Result<Vec<u8>, EvalError> {
        let (start, offset) = self.locate(address, len)?;
        Ok(self.regions[&start][offset..offset + len as usize].to_vec())
    }

    pub fn write(&mut self, address: u64, bytes: &[u8]) -> Result<(), EvalError> {
        let (start, offset) = self.locate(address, bytes.len() as u64)?;
        if let Some(region) = self.regions.get_mut(&start) {
            region[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_read_write() {
        let mut memory = Memory::default();
        let a = memory.alloc(8);
        let b = memory.alloc(4);
        assert!(b > a + 8);
        memory.write(a + 4, &[1, 2]).unwrap();
        assert_eq!(memory.read(a, 8).unwrap(), vec![0, 0, 0, 0, 1, 2, 0, 0]);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut memory = Memory::default();
        let a = memory.alloc(4);
        assert!(matches!(
            memory.read(a + 2, 4),
            Err(EvalError::MemoryAccess { address }) if address == a + 2
        ));
        assert!(memory.read(0, 1).is_err());
        assert!(memory.write(a + 8, &[0]).is_err());
        assert!(memory.free(a));
        assert!(memory.read(a, 1).is_err());
    }
}
