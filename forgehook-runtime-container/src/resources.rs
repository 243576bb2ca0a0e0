//! Resource-string parsing (§4.2): manifest limits are authored as strings,
//! the engine needs bytes and CPU-nanoseconds.

use forgehook_core::ForgehookError;

/// `"<int>[m|g]"` → bytes. No suffix is rejected rather than guessed at.
pub fn parse_memory(spec: &str) -> Result<u64, ForgehookError> {
    let spec = spec.trim();
    let (digits, multiplier) = match spec.chars().last() {
        Some('m') | Some('M') => (&spec[..spec.len() - 1], 1024 * 1024),
        Some('g') | Some('G') => (&spec[..spec.len() - 1], 1024 * 1024 * 1024),
        _ => {
            return Err(ForgehookError::Validation(format!(
                "memory limit '{spec}' missing m/g suffix"
            )))
        }
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| ForgehookError::Validation(format!("invalid memory limit '{spec}'")))?;
    Ok(value * multiplier)
}

/// `"<float>"` CPU count → CPU-nanoseconds, `floor(n * 1e9)`.
pub fn parse_cpu_nanos(spec: &str) -> Result<u64, ForgehookError> {
    let value: f64 = spec
        .trim()
        .parse()
        .map_err(|_| ForgehookError::Validation(format!("invalid cpu limit '{spec}'")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ForgehookError::Validation(format!("invalid cpu limit '{spec}'")));
    }
    Ok((value * 1_000_000_000.0).floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_megabytes() {
        assert_eq!(parse_memory("256m").unwrap(), 256 * 1024 * 1024);
    }

    #[test]
    fn memory_gigabytes() {
        assert_eq!(parse_memory("1g").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn memory_without_suffix_is_rejected() {
        assert!(parse_memory("256").is_err());
    }

    #[test]
    fn cpu_fractional() {
        assert_eq!(parse_cpu_nanos("0.5").unwrap(), 500_000_000);
    }

    #[test]
    fn cpu_whole() {
        assert_eq!(parse_cpu_nanos("2").unwrap(), 2_000_000_000);
    }

    #[test]
    fn cpu_rejects_negative() {
        assert!(parse_cpu_nanos("-1").is_err());
    }
}
