use anyhow::{Result, bail};

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse seed tokens: plain integers (negative values fold to their magnitude)
/// and inclusive ranges written `start..end`.
pub fn resolve_seeds(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds = Vec::new();
    for token in tokens {
        if let Some((start, end)) = token.split_once("..") {
            let (Ok(start), Ok(end)) = (start.trim().parse::<u64>(), end.trim().parse::<u64>())
            else {
                bail!("invalid seed range '{token}'");
            };
            if start > end {
                bail!("seed range '{token}' is empty");
            }
            seeds.extend(start..=end);
            continue;
        }
        if let Ok(value) = token.parse::<i64>() {
            seeds.push(value.unsigned_abs());
            continue;
        }
        if let Ok(value) = token.parse::<u64>() {
            seeds.push(value);
            continue;
        }
        bail!("invalid seed '{token}'");
    }
    if seeds.is_empty() {
        bail!("no seeds given");
    }
    seeds.dedup();
    Ok(seeds)
}
