/// Largest byte count accepted by [`parse_byte_count`].
///
/// Memory limits are handed to collectors as signed 64-bit values, so anything
/// above `i64::MAX` is rejected as an overflow rather than silently capped.
pub const MAX_BYTE_COUNT: u64 = i64::MAX as u64;

/// Parse a human memory-size literal into a byte count.
///
/// Accepted grammar: `^[0-9]+(([KMGT]i)?B)?$`. Binary multipliers (`KiB` ..
/// `TiB`) only apply when followed by `B`; a bare numeral or a numeral with a
/// plain `B` suffix is a raw byte count. Signs, fractions, decimal units
/// (`KB`) and values above [`MAX_BYTE_COUNT`] yield `None`.
pub fn parse_byte_count(raw: &str) -> Option<u64> {
    let (digits, shift) = match raw.as_bytes() {
        [digits @ .., unit, b'i', b'B'] => (digits, unit_shift(*unit)?),
        [digits @ .., b'B'] => (digits, 0),
        digits => (digits, 0),
    };

    let value = parse_digits(digits)?;
    let value = value.checked_mul(1u64 << shift)?;
    (value <= MAX_BYTE_COUNT).then_some(value)
}

fn unit_shift(unit: u8) -> Option<u32> {
    match unit {
        b'K' => Some(10),
        b'M' => Some(20),
        b'G' => Some(30),
        b'T' => Some(40),
        _ => None,
    }
}

fn parse_digits(digits: &[u8]) -> Option<u64> {
    if digits.is_empty() {
        return None;
    }

    digits.iter().try_fold(0u64, |acc, &c| {
        if !c.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add(u64::from(c - b'0'))
    })
}
