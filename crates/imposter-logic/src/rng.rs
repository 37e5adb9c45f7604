//! Run-scoped random stream for one game.
//!
//! A 32-bit Mersenne Twister seeded from the 32-bit little-endian words of the
//! seed, with bounded draws done by rejection on the top bits of each word.
//! Shuffles walk the slice from the back and swap each slot with a draw below
//! its index plus one. Same seed, same deals and same body placement.

use rand_mt::Mt19937GenRand32;

pub struct RunRng {
    mt: Mt19937GenRand32,
}

impl RunRng {
    pub fn seeded(seed: u64) -> Self {
        let mut key = vec![seed as u32];
        if seed >> 32 != 0 {
            key.push((seed >> 32) as u32);
        }
        Self {
            mt: Mt19937GenRand32::new_with_key(key),
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.mt.next_u32()
    }

    /// `bits` random bits (at most 64), low word first.
    fn next_bits(&mut self, bits: u32) -> u64 {
        if bits <= 32 {
            return u64::from(self.next_u32() >> (32 - bits));
        }
        let low = u64::from(self.next_u32());
        let high = u64::from(self.next_u32() >> (64 - bits));
        (high << 32) | low
    }

    /// Uniform index in `0..n`. Returns 0 for `n == 0`.
    pub fn below(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let n = n as u64;
        let bits = u64::BITS - n.leading_zeros();
        loop {
            let r = self.next_bits(bits);
            if r < n {
                return r as usize;
            }
        }
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.below(items.len()))
    }
}
