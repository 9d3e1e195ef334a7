//! INFO report parsing.
//!
//! The report is line oriented: `# Section` headers, blank lines and
//! `key:value` pairs. Anything else is skipped.

use std::collections::HashMap;

pub type InfoMap = HashMap<String, String>;

pub fn parse_info(report: &str) -> InfoMap {
    report
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn info_f64(info: &InfoMap, key: &str) -> f64 {
    info.get(key)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

pub fn info_u64(info: &InfoMap, key: &str) -> u64 {
    info.get(key).and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// Sum of `keys=` over keyspace lines (`db0:keys=12,expires=0,avg_ttl=0`)
pub fn keyspace_keys(info: &InfoMap) -> u64 {
    info.iter()
        .filter(|(k, _)| k.len() > 2 && k.starts_with("db") && k[2..].chars().all(|c| c.is_ascii_digit()))
        .filter_map(|(_, v)| {
            v.split(',')
                .find_map(|part| part.strip_prefix("keys="))
                .and_then(|n| n.parse::<u64>().ok())
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "# Server\r\nredis_version:7.2.4\r\n\r\n# Memory\r\nused_memory:2048\r\nnot a pair\r\n:orphan\r\nused_cpu_sys:1.50\r\n# Keyspace\r\ndb0:keys=10,expires=1,avg_ttl=0\r\ndb3:keys=5,expires=0,avg_ttl=0\r\n";

    #[test]
    fn parses_pairs_and_skips_comments_and_malformed_lines() {
        let info = parse_info(REPORT);

        assert_eq!(info.get("redis_version").map(String::as_str), Some("7.2.4"));
        assert_eq!(info_u64(&info, "used_memory"), 2048);
        assert_eq!(info_f64(&info, "used_cpu_sys"), 1.5);
        assert!(!info.keys().any(|k| k.starts_with('#')));
        assert!(!info.contains_key("not a pair"));
        assert!(!info.contains_key(""));
    }

    #[test]
    fn value_may_contain_colons() {
        let info = parse_info("executable:/usr/bin/redis-server:x\n");
        assert_eq!(info.get("executable").map(String::as_str), Some("/usr/bin/redis-server:x"));
    }

    #[test]
    fn missing_or_invalid_numbers_default_to_zero() {
        let info = parse_info("used_memory:lots\n");
        assert_eq!(info_u64(&info, "used_memory"), 0);
        assert_eq!(info_f64(&info, "used_cpu_user"), 0.0);
    }

    #[test]
    fn keyspace_keys_sums_all_databases() {
        let info = parse_info(REPORT);
        assert_eq!(keyspace_keys(&info), 15);
    }
}
