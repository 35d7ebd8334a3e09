use crate::RandomSource;

/// Simple, non-cryptographically secure random number generator.
///
/// See <https://en.wikipedia.org/wiki/Xorshift>.
pub struct XorShiftRng {
    state: u64,
}

impl XorShiftRng {
    /// Create a generator from a seed. A zero seed is replaced with a fixed
    /// non-zero value, since xorshift never leaves the zero state.
    pub fn new(seed: u64) -> XorShiftRng {
        XorShiftRng {
            state: if seed == 0 { 0x2545_f491_4f6c_dd1d } else { seed },
        }
    }

    /// Return a random value in the range [0, 2^64)
    pub fn next_u64(&mut self) -> u64 {
        let mut tmp = self.state;
        tmp ^= tmp << 13;
        tmp ^= tmp >> 7;
        tmp ^= tmp << 17;
        self.state = tmp;
        tmp
    }

    /// Return a random value in the range [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        // Number of most significant bits to use
        let n_bits = 24;
        let scale = 1.0 / (1u64 << n_bits) as f32;
        let val = self.next_u64() >> (64 - n_bits);
        (val as f32) * scale
    }
}

impl RandomSource<f32> for XorShiftRng {
    fn next(&mut self) -> f32 {
        self.next_f32()
    }
}

impl RandomSource<f64> for XorShiftRng {
    fn next(&mut self) -> f64 {
        self.next_f32() as f64
    }
}

macro_rules! impl_random_source {
    ($ty:ty) => {
        impl RandomSource<$ty> for XorShiftRng {
            fn next(&mut self) -> $ty {
                // Take the least significant bits of the 64bit value as the
                // result.
                self.next_u64() as $ty
            }
        }
    };
}

impl_random_source!(i32);
impl_random_source!(i64);
impl_random_source!(usize);
