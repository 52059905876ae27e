//! 256-bit arithmetic shared by the interpreter handlers and the runtime
//! function table. Everything wraps modulo 2^256; signed operations use
//! two's complement on the same word.

use crate::constants::{TWO_FIFTY_SIX, WORD_SIZE};
use ethereum_types::{U256, U512};

#[inline]
pub fn wrapping_add(lhs: U256, rhs: U256) -> U256 {
    lhs.overflowing_add(rhs).0
}

#[inline]
pub fn wrapping_sub(lhs: U256, rhs: U256) -> U256 {
    lhs.overflowing_sub(rhs).0
}

#[inline]
pub fn wrapping_mul(lhs: U256, rhs: U256) -> U256 {
    lhs.overflowing_mul(rhs).0
}

/// Unsigned division; division by zero yields zero.
#[inline]
pub fn div(lhs: U256, rhs: U256) -> U256 {
    lhs.checked_div(rhs).unwrap_or_default()
}

/// Unsigned remainder; modulo zero yields zero.
#[inline]
pub fn rem(lhs: U256, rhs: U256) -> U256 {
    lhs.checked_rem(rhs).unwrap_or_default()
}

#[inline]
fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

/// Signed division. `SDIV(INT_MIN, -1)` wraps back to `INT_MIN`.
pub fn sdiv(mut lhs: U256, mut rhs: U256) -> U256 {
    let mut negative = false;
    if lhs.bit(255) {
        lhs = twos_complement(lhs);
        negative = !negative;
    }
    if rhs.bit(255) {
        rhs = twos_complement(rhs);
        negative = !negative;
    }
    match lhs.checked_div(rhs) {
        Some(res) if negative => twos_complement(res),
        Some(res) => res,
        None => U256::zero(),
    }
}

/// Signed remainder. The result takes the sign of the dividend.
pub fn smod(mut lhs: U256, mut rhs: U256) -> U256 {
    let negative = lhs.bit(255);
    if negative {
        lhs = twos_complement(lhs);
    }
    if rhs.bit(255) {
        rhs = twos_complement(rhs);
    }
    match lhs.checked_rem(rhs) {
        Some(res) if negative => twos_complement(res),
        Some(res) => res,
        None => U256::zero(),
    }
}

/// `(lhs + rhs) % modulus` computed in 512-bit precision.
pub fn addmod(lhs: U256, rhs: U256, modulus: U256) -> U256 {
    if modulus.is_zero() {
        return U256::zero();
    }
    let sum = U512::from(lhs) + U512::from(rhs);
    let res = sum % U512::from(modulus);
    U256([res.0[0], res.0[1], res.0[2], res.0[3]])
}

/// `(lhs * rhs) % modulus` computed in 512-bit precision.
pub fn mulmod(lhs: U256, rhs: U256, modulus: U256) -> U256 {
    if modulus.is_zero() {
        return U256::zero();
    }
    let product = lhs.full_mul(rhs);
    let res = product % U512::from(modulus);
    U256([res.0[0], res.0[1], res.0[2], res.0[3]])
}

/// `base ^ exponent mod 2^256` by square-and-multiply. `EXP(x, 0) = 1` for
/// every `x`, including zero.
pub fn exp(base: U256, exponent: U256) -> U256 {
    base.overflowing_pow(exponent).0
}

/// Replicates bit `8 * index + 7` across all higher bits. A no-op for
/// `index >= 31`.
pub fn sign_extend(index: U256, mut value: U256) -> U256 {
    match usize::try_from(index) {
        Ok(x) if x < 31 => {
            let sign_bit = 8 * x + 7;
            if value.bit(sign_bit) {
                value |= U256::MAX << (sign_bit + 1);
            } else {
                value &= (U256::one() << (sign_bit + 1)) - 1;
            }
            value
        }
        _ => value,
    }
}

/// Byte at big-endian position `index`, or zero for `index >= 32`.
pub fn byte(index: U256, value: U256) -> U256 {
    match usize::try_from(index) {
        Ok(i) if i < WORD_SIZE => U256::from(value.byte(WORD_SIZE - 1 - i)),
        _ => U256::zero(),
    }
}

/// Logical shift left; `shift >= 256` yields zero.
pub fn shl(shift: U256, value: U256) -> U256 {
    if shift < TWO_FIFTY_SIX {
        value << shift.low_u64() as usize
    } else {
        U256::zero()
    }
}

/// Logical shift right; `shift >= 256` yields zero.
pub fn shr(shift: U256, value: U256) -> U256 {
    if shift < TWO_FIFTY_SIX {
        value >> shift.low_u64() as usize
    } else {
        U256::zero()
    }
}

/// Arithmetic shift right. For `shift >= 256` the result collapses to
/// all-ones or zero depending on the operand's sign bit.
pub fn sar(shift: U256, value: U256) -> U256 {
    let negative = value.bit(255);
    if shift < TWO_FIFTY_SIX {
        let s = shift.low_u64() as usize;
        if negative && s > 0 {
            (value >> s) | (U256::MAX << (256 - s))
        } else {
            value >> s
        }
    } else if negative {
        U256::MAX
    } else {
        U256::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(x: u64) -> U256 {
        U256::from(x)
    }

    #[test]
    fn add_identity_and_xor_self() {
        let x = U256::from_big_endian(&[0xab; 32]);
        assert_eq!(wrapping_add(x, U256::zero()), x);
        assert_eq!(wrapping_mul(x, U256::one()), x);
        assert_eq!(x ^ x, U256::zero());
        assert_eq!(!(!x), x);
    }

    #[test]
    fn div_rem_reconstruct() {
        let a = U256::from_big_endian(&[0x5a; 32]);
        let b = u(0x1234_5678);
        assert_eq!(wrapping_add(wrapping_mul(div(a, b), b), rem(a, b)), a);
    }

    #[test]
    fn division_by_zero_is_zero() {
        assert_eq!(div(u(7), U256::zero()), U256::zero());
        assert_eq!(rem(u(7), U256::zero()), U256::zero());
        assert_eq!(sdiv(u(7), U256::zero()), U256::zero());
        assert_eq!(smod(u(7), U256::zero()), U256::zero());
    }

    #[test]
    fn sdiv_int_min_overflow_wraps() {
        let int_min = U256::one() << 255;
        let minus_one = U256::MAX;
        assert_eq!(sdiv(int_min, minus_one), int_min);
    }

    #[test]
    fn smod_takes_dividend_sign() {
        // -7 % 3 == -1
        let minus_seven = twos_complement(u(7));
        assert_eq!(smod(minus_seven, u(3)), twos_complement(u(1)));
        // 7 % -3 == 1
        let minus_three = twos_complement(u(3));
        assert_eq!(smod(u(7), minus_three), u(1));
    }

    #[test]
    fn addmod_mulmod_512_bit_intermediates() {
        // (MAX + MAX) % MAX == 0 needs more than 256 bits to get right.
        assert_eq!(addmod(U256::MAX, U256::MAX, U256::MAX), U256::zero());
        assert_eq!(addmod(U256::MAX, u(1), u(10)), u(6));
        assert_eq!(mulmod(U256::MAX, U256::MAX, u(7)), rem(U256::MAX, u(7)) * rem(U256::MAX, u(7)) % u(7));
        assert_eq!(mulmod(u(5), u(6), U256::zero()), U256::zero());
    }

    #[test]
    fn exp_edge_cases() {
        assert_eq!(exp(U256::zero(), U256::zero()), u(1));
        assert_eq!(exp(u(10), U256::zero()), u(1));
        assert_eq!(exp(U256::zero(), u(3)), U256::zero());
        assert_eq!(exp(u(2), u(10)), u(1024));
        // Wraps modulo 2^256.
        assert_eq!(exp(u(2), u(256)), U256::zero());
    }

    #[test]
    fn sign_extend_widths() {
        // 0xff at width 0 is -1.
        assert_eq!(sign_extend(u(0), u(0xff)), U256::MAX);
        // 0x7f stays positive.
        assert_eq!(sign_extend(u(0), u(0x7f)), u(0x7f));
        // Width >= 31 is the identity.
        let x = U256::from_big_endian(&[0x80; 32]);
        assert_eq!(sign_extend(u(31), x), x);
        assert_eq!(sign_extend(U256::MAX, x), x);
    }

    #[test]
    fn byte_extraction() {
        let v = U256::from_big_endian(&{
            let mut b = [0u8; 32];
            b[0] = 0xaa;
            b[31] = 0xbb;
            b
        });
        assert_eq!(byte(u(0), v), u(0xaa));
        assert_eq!(byte(u(31), v), u(0xbb));
        assert_eq!(byte(u(32), v), U256::zero());
        assert_eq!(byte(U256::MAX, v), U256::zero());
    }

    #[test]
    fn shifts_across_limb_boundary() {
        let x = U256::one() << 63;
        assert_eq!(shl(u(1), x), U256([0, 1, 0, 0]));
        let y = U256([0, 1, 0, 0]);
        assert_eq!(shr(u(1), y), U256([1 << 63, 0, 0, 0]));
        let top = U256::one() << 255;
        let sar1 = sar(u(1), top);
        assert_eq!(sar1.0[3], 0b11 << 62);
    }

    #[test]
    fn large_shift_amounts() {
        let x = U256::from_big_endian(&[0x91; 32]);
        assert_eq!(shl(u(256), x), U256::zero());
        assert_eq!(shr(u(256), x), U256::zero());
        assert_eq!(sar(u(256), x), U256::MAX);
        assert_eq!(sar(u(300), u(5)), U256::zero());
        assert_eq!(sar(U256::MAX, x), U256::MAX);
    }
}
