//! Textual distance between buffer locations.
//!
//! Distances are measured in characters along the buffer, counting one character for every line
//! break crossed. This is what "nearest" means for match selection; Euclidean line/column
//! distance would let a match ten lines away beat one a hundred columns away on the same line.

use crate::error::Result;
use crate::host::{BufferId, Host};
use crate::position::Location;

/// Characters between `a` and `b` (order-independent).
pub fn char_distance<H: Host + ?Sized>(
    host: &H,
    buffer: BufferId,
    a: Location,
    b: Location,
) -> Result<usize> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo.line == hi.line {
        return Ok(hi.column - lo.column);
    }

    let mut total = host.line_len(buffer, lo.line)?.saturating_sub(lo.column) + 1;
    for line in lo.line + 1..hi.line {
        total += host.line_len(buffer, line)? + 1;
    }
    Ok(total + hi.column)
}

/// The location just past the last character of the buffer.
pub fn buffer_end<H: Host + ?Sized>(host: &H, buffer: BufferId) -> Result<Location> {
    let last = host.line_count(buffer)?.saturating_sub(1);
    Ok(Location::new(last, host.line_len(buffer, last)?))
}

/// Shortest distance from `from` to `to`, optionally allowing the path to wrap around the
/// buffer boundary (through either end).
pub fn wrapped_distance<H: Host + ?Sized>(
    host: &H,
    buffer: BufferId,
    from: Location,
    to: Location,
    wrap: bool,
) -> Result<usize> {
    let direct = char_distance(host, buffer, from, to)?;
    if !wrap {
        return Ok(direct);
    }

    let end = buffer_end(host, buffer)?;
    let through_end =
        char_distance(host, buffer, from, end)? + char_distance(host, buffer, Location::ZERO, to)?;
    let through_start =
        char_distance(host, buffer, from, Location::ZERO)? + char_distance(host, buffer, to, end)?;
    Ok(direct.min(through_end).min(through_start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHost;

    #[test]
    fn test_same_line_distance() {
        let mut host = MemoryHost::new();
        let buffer = host.add_buffer("foo bar");
        let d = char_distance(&host, buffer, Location::new(0, 6), Location::new(0, 2)).unwrap();
        assert_eq!(d, 4);
    }

    #[test]
    fn test_distance_counts_intervening_lines() {
        let mut host = MemoryHost::new();
        let buffer = host.add_buffer("abcde\nxy\n\nlast");
        // 3 chars to end of line 0, newline, "xy" + newline, empty line + newline, 2 chars.
        let d = char_distance(&host, buffer, Location::new(0, 2), Location::new(3, 2)).unwrap();
        assert_eq!(d, 3 + 1 + 3 + 1 + 2);
    }

    #[test]
    fn test_wrapped_distance_takes_shorter_path() {
        let mut host = MemoryHost::new();
        let buffer = host.add_buffer("ab\ncccccccccc\nde");
        let from = Location::new(2, 1);
        let to = Location::new(0, 0);

        assert_eq!(wrapped_distance(&host, buffer, from, to, false).unwrap(), 15);
        // One char to the end, then zero from the start.
        assert_eq!(wrapped_distance(&host, buffer, from, to, true).unwrap(), 1);
        assert_eq!(
            buffer_end(&host, buffer).unwrap(),
            Location::new(2, 2)
        );
    }
}
