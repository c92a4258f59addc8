//! Virtual Machine Memory
//!
//! Guest data addresses form a single flat space split into two slabs: the
//! host-mapped data region occupies `[0, D)` and the VM-owned stack occupies
//! `[D, D + S)`. An access is legal when it fits below `D + S` and does not
//! straddle the seam between the two slabs. Accesses are never required to
//! be naturally aligned.

use crate::error::{Result, VMError};

/// Memory access width in bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Width {
    B = 1,
    H = 2,
    W = 4,
    D = 8,
}

/// Guest memory map over a borrowed data region and an owned stack.
pub struct MemMap<'m> {
    /// host-owned data region, mapped at guest address 0
    data: Option<&'m mut [u8]>,
    /// VM-owned stack, mapped directly above the data region
    stack: Vec<u8>,
}

impl<'m> MemMap<'m> {
    pub fn new(stack_size: usize) -> Self {
        Self { data: None, stack: vec![0; stack_size] }
    }

    /// attach a host buffer as the data region; returns its guest base (0)
    pub fn map_data(&mut self, buf: &'m mut [u8]) -> u64 {
        self.data = Some(buf);
        0
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn data_len(&self) -> usize {
        self.data.as_deref().map_or(0, <[u8]>::len)
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// one past the highest mapped guest address
    pub fn limit(&self) -> u64 {
        (self.data_len() + self.stack_len()) as u64
    }

    /// read-only view of the stack bytes
    pub fn stack_bytes(&self) -> &[u8] {
        &self.stack
    }

    // Resolve an access to (region-is-data, offset), enforcing the bounds
    // and no-straddle rules.
    fn locate(&self, addr: u64, len: usize) -> Result<(bool, usize)> {
        let oob = || VMError::OutOfBounds(addr, len);
        let d = self.data_len() as u64;
        let end = addr.checked_add(len as u64).ok_or_else(oob)?;
        if end > self.limit() {
            return Err(oob());
        }
        if addr < d {
            if end > d {
                return Err(oob());
            }
            Ok((true, addr as usize))
        } else {
            Ok((false, (addr - d) as usize))
        }
    }

    /// load `width` bytes little-endian, zero-extended into a u64
    pub fn load(&self, width: Width, addr: u64) -> Result<u64> {
        let len = width as usize;
        let (in_data, off) = self.locate(addr, len)?;
        let region: &[u8] = if in_data {
            self.data.as_deref().unwrap_or_default()
        } else {
            &self.stack
        };
        let mut bytes = [0u8; 8];
        bytes[..len].copy_from_slice(&region[off..off + len]);
        Ok(u64::from_le_bytes(bytes))
    }

    /// store the low `width` bytes of `val` little-endian
    pub fn store(&mut self, width: Width, addr: u64, val: u64) -> Result<()> {
        let len = width as usize;
        let (in_data, off) = self.locate(addr, len)?;
        let region: &mut [u8] = if in_data {
            self.data.as_deref_mut().unwrap_or_default()
        } else {
            &mut self.stack
        };
        region[off..off + len].copy_from_slice(&val.to_le_bytes()[..len]);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut data = vec![0u8; 64];
        let mut mem = MemMap::new(64);
        mem.map_data(&mut data);

        for (width, val) in [
            (Width::B, 0xa5),
            (Width::H, 0xbeef),
            (Width::W, 0xdead_beef),
            (Width::D, 0x0123_4567_89ab_cdef),
        ] {
            // also at deliberately misaligned addresses
            for addr in [0u64, 3, 40, 64 + 5, 64 + 33] {
                mem.store(width, addr, val).unwrap();
                assert_eq!(mem.load(width, addr).unwrap(), val);
            }
        }
    }

    #[test]
    fn test_truncates_to_width() {
        let mut data = vec![0u8; 16];
        let mut mem = MemMap::new(0);
        mem.map_data(&mut data);

        mem.store(Width::D, 0, 0x1122_3344_5566_7788).unwrap();
        mem.store(Width::B, 0, 0xffff_ffff_ffff_ffaa).unwrap();
        assert_eq!(mem.load(Width::D, 0).unwrap(), 0x1122_3344_5566_77aa);
        assert_eq!(mem.load(Width::B, 7).unwrap(), 0x11);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut data = vec![0u8; 16];
        let mut mem = MemMap::new(16);
        mem.map_data(&mut data);

        assert!(mem.load(Width::B, 32).is_err());
        assert!(mem.load(Width::D, 25).is_err());
        assert!(mem.store(Width::W, 30, 0).is_err());
        assert!(mem.load(Width::D, u64::MAX - 3).is_err());

        // last legal slots of each slab
        assert!(mem.load(Width::D, 8).is_ok());
        assert!(mem.load(Width::D, 24).is_ok());
    }

    #[test]
    fn test_no_straddle() {
        let mut data = vec![0u8; 16];
        let mut mem = MemMap::new(16);
        mem.map_data(&mut data);

        // fits in the total span but crosses the data/stack seam
        assert!(matches!(
            mem.load(Width::D, 12),
            Err(VMError::OutOfBounds(12, 8))
        ));
        assert!(mem.store(Width::W, 14, 0).is_err());

        // touching either side of the seam is fine
        assert!(mem.store(Width::W, 12, 0).is_ok());
        assert!(mem.store(Width::W, 16, 0).is_ok());
    }

    #[test]
    fn test_stack_only() {
        // no data region: stack occupies [0, S)
        let mut mem = MemMap::new(32);
        assert!(!mem.has_data());
        assert_eq!(mem.limit(), 32);

        mem.store(Width::D, 24, 0xcafe).unwrap();
        assert_eq!(mem.load(Width::D, 24).unwrap(), 0xcafe);
        assert_eq!(mem.stack_bytes()[24], 0xfe);
    }
}
