use std::collections::HashSet;

use crate::error::{Error, Result};

pub fn validate_api_key(name: &str, api_key: Option<&str>) -> Result<()> {
    match api_key {
        Some(key) if !key.trim().is_empty() => Ok(()),
        _ => Err(Error::ConfigError(format!("{} is required", name))),
    }
}

pub fn validate_targets(targets: &[String]) -> Result<()> {
    if targets.is_empty() {
        return Err(Error::ConfigError("At least one target symbol is required".to_string()));
    }
    let mut seen = HashSet::with_capacity(targets.len());
    for target in targets {
        if target.trim().is_empty() {
            return Err(Error::ConfigError("Target symbol cannot be empty".to_string()));
        }
        if target.contains(',') {
            return Err(Error::ConfigError(format!(
                "Target symbol must not contain a comma: {}",
                target
            )));
        }
        if !seen.insert(target.as_str()) {
            return Err(Error::ConfigError(format!("Duplicate target symbol: {}", target)));
        }
    }
    Ok(())
}

pub fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() {
        return Err(Error::UpstreamDecode(format!("Invalid price: {}", price)));
    }
    if price < 0.0 {
        return Err(Error::UpstreamDecode(format!("Negative price: {}", price)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key("cmc api key", Some("abc")).is_ok());
        assert!(matches!(
            validate_api_key("cmc api key", Some("  ")),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            validate_api_key("cmc api key", None),
            Err(Error::ConfigError(msg)) if msg == "cmc api key is required"
        ));
    }

    #[test]
    fn test_validate_targets() {
        assert!(validate_targets(&["BTC".to_string(), "ETH".to_string()]).is_ok());
        assert!(validate_targets(&[]).is_err());
        assert!(validate_targets(&["".to_string()]).is_err());
        assert!(validate_targets(&["BTC,ETH".to_string()]).is_err());
    }

    #[test]
    fn test_validate_targets_rejects_duplicates() {
        let result = validate_targets(&["K-INDIA".to_string(), "SCBSET".to_string(), "K-INDIA".to_string()]);

        assert!(matches!(
            result,
            Err(Error::ConfigError(msg)) if msg == "Duplicate target symbol: K-INDIA"
        ));
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(0.0).is_ok());
        assert!(validate_price(61234.5).is_ok());
        assert!(validate_price(-1.0).is_err());
        assert!(validate_price(f64::NAN).is_err());
        assert!(validate_price(f64::INFINITY).is_err());
    }
}
