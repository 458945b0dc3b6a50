//! Human-readable byte sizes with binary prefixes.

const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

/// Format a byte count using the largest binary prefix that keeps the
/// value at or above one (e.g. `81143107` → `77.38 MiB`).
pub fn pretty_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_stay_in_bytes() {
        assert_eq!(pretty_bytes(0), "0 B");
        assert_eq!(pretty_bytes(1023), "1023 B");
    }

    #[test]
    fn binary_prefixes() {
        assert_eq!(pretty_bytes(1024), "1.00 KiB");
        assert_eq!(pretty_bytes(5_242_880), "5.00 MiB");
        assert_eq!(pretty_bytes(81_143_107), "77.38 MiB");
        assert_eq!(pretty_bytes(1_099_511_627_776), "1.00 TiB");
    }
}
