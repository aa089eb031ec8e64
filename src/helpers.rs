use chrono::DateTime;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid quantity {0:?}")]
pub struct ParseError(pub String);

fn parse_num(s: &str) -> Result<f64, ParseError> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| ParseError(s.to_string()))
}

/// Parse a CPU quantity as reported by the orchestrator into millicores.
/// `"250m"` -> 250, `"500000000n"` -> 500, a bare number is cores.
pub fn parse_cpu(s: &str) -> Result<f64, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0.0);
    }
    if let Some(v) = s.strip_suffix('m') {
        return parse_num(v);
    }
    if let Some(v) = s.strip_suffix('n') {
        return Ok(parse_num(v)? / 1_000_000.0);
    }
    Ok(parse_num(s)? * 1000.0)
}

/// Parse a memory quantity into bytes. Binary suffixes (Ki/Mi/Gi/Ti) are
/// powers of 1024, decimal suffixes (K/M/G/T) powers of 1000, a bare
/// number is raw bytes.
pub fn parse_memory(s: &str) -> Result<i64, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }
    const BINARY: [(&str, i64); 4] = [
        ("Ki", 1 << 10),
        ("Mi", 1 << 20),
        ("Gi", 1 << 30),
        ("Ti", 1_i64 << 40),
    ];
    const DECIMAL: [(&str, i64); 4] = [
        ("K", 1_000),
        ("M", 1_000_000),
        ("G", 1_000_000_000),
        ("T", 1_000_000_000_000),
    ];
    for (suffix, mult) in BINARY {
        if let Some(v) = s.strip_suffix(suffix) {
            return Ok((parse_num(v)? * mult as f64) as i64);
        }
    }
    for (suffix, mult) in DECIMAL {
        if let Some(v) = s.strip_suffix(suffix) {
            return Ok((parse_num(v)? * mult as f64) as i64);
        }
    }
    Ok(parse_num(s)? as i64)
}

pub fn format_cpu(millicores: f64) -> String {
    if millicores >= 1000.0 {
        format!("{:.2} cores", millicores / 1000.0)
    } else {
        format!("{:.0}m", millicores)
    }
}

pub fn format_memory(bytes: i64) -> String {
    const KI: f64 = 1024.0;
    const MI: f64 = KI * 1024.0;
    const GI: f64 = MI * 1024.0;
    let b = bytes as f64;
    if b >= GI {
        format!("{:.2}Gi", b / GI)
    } else if b >= MI {
        format!("{:.2}Mi", b / MI)
    } else if b >= KI {
        format!("{:.2}Ki", b / KI)
    } else {
        format!("{}B", bytes)
    }
}

/// Normalize an orchestrator timestamp to RFC 3339 UTC. Unparseable
/// input is passed through unchanged.
pub fn normalize_timestamp(ts: &str) -> String {
    match DateTime::parse_from_rfc3339(ts) {
        Ok(dt) => dt.to_utc().to_rfc3339(),
        Err(_) => ts.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_suffixes() {
        assert_eq!(parse_cpu("250m").unwrap(), 250.0);
        assert_eq!(parse_cpu("1").unwrap(), 1000.0);
        assert_eq!(parse_cpu("500000000n").unwrap(), 500.0);
        assert_eq!(parse_cpu("").unwrap(), 0.0);
        assert_eq!(parse_cpu("0.5").unwrap(), 500.0);
    }

    #[test]
    fn cpu_malformed() {
        assert!(parse_cpu("lots").is_err());
        assert!(parse_cpu("12x").is_err());
    }

    #[test]
    fn memory_suffixes() {
        assert_eq!(parse_memory("2Gi").unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_memory("500M").unwrap(), 500_000_000);
        assert_eq!(parse_memory("1Ki").unwrap(), 1024);
        assert_eq!(parse_memory("3T").unwrap(), 3_000_000_000_000);
        assert_eq!(parse_memory("512").unwrap(), 512);
        assert_eq!(parse_memory("").unwrap(), 0);
        assert!(parse_memory("many").is_err());
    }

    #[test]
    fn cpu_display() {
        assert_eq!(format_cpu(250.0), "250m");
        assert_eq!(format_cpu(1500.0), "1.50 cores");
        assert_eq!(format_cpu(1000.0), "1.00 cores");
    }

    #[test]
    fn memory_display_round_trips() {
        assert_eq!(format_memory(parse_memory("1Ki").unwrap()), "1.00Ki");
        assert_eq!(format_memory(parse_memory("1Mi").unwrap()), "1.00Mi");
        assert_eq!(format_memory(parse_memory("1Gi").unwrap()), "1.00Gi");
        assert_eq!(format_memory(100), "100B");
    }

    #[test]
    fn timestamp_normalization() {
        assert_eq!(
            normalize_timestamp("2024-03-01T12:00:00+02:00"),
            "2024-03-01T10:00:00+00:00"
        );
        assert_eq!(normalize_timestamp("not-a-time"), "not-a-time");
    }
}
