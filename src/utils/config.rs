//! Protocol Configuration
//!
//! Centralized configuration with:
//! - Presets (standard, strict)
//! - Runtime updates through a process-wide instance
//! - `ORDSWAP_*` environment overrides
//! - Validation warnings for inconsistent settings

use std::sync::RwLock;

use crate::tx::SEQUENCE_ENABLE_RBF_NO_LOCKTIME;
use crate::utils::logging;

/// Decoding limits applied to untrusted containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_inputs: usize,
    pub max_outputs: usize,
    pub max_entries_per_input: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        ProtocolSettings::standard().limits()
    }
}

/// Protocol settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolSettings {
    /// Preset these settings came from
    pub level: ProtocolLevel,

    // Transaction defaults
    /// Version of drafted transactions
    pub tx_version: i32,
    /// Lock time of drafted transactions
    pub lock_time: u32,
    /// Sequence of drafted and extension inputs
    pub sequence: u32,
    /// Index the maker's pair occupies once extended
    pub default_anchor: usize,

    // Taker checks
    /// Verify the maker's signature before extending an offer
    pub verify_offer_on_extend: bool,

    // Decoding limits
    pub max_inputs: usize,
    pub max_outputs: usize,
    pub max_entries_per_input: usize,

    /// Emit debug log lines
    pub debug_logging: bool,
}

/// Configuration presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolLevel {
    /// Defaults suitable for most swaps
    Standard,
    /// Tighter decoding limits, final sequences
    Strict,
    /// User-modified settings
    Custom,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self::standard()
    }
}

impl ProtocolSettings {
    /// Standard preset
    pub fn standard() -> Self {
        Self {
            level: ProtocolLevel::Standard,

            tx_version: 2,
            lock_time: 0,
            sequence: SEQUENCE_ENABLE_RBF_NO_LOCKTIME,
            default_anchor: 1,

            verify_offer_on_extend: true,

            max_inputs: 1_000,
            max_outputs: 1_000,
            max_entries_per_input: 16,

            debug_logging: false,
        }
    }

    /// Strict preset
    pub fn strict() -> Self {
        Self {
            level: ProtocolLevel::Strict,

            tx_version: 2,
            lock_time: 0,
            sequence: crate::tx::SEQUENCE_FINAL,
            default_anchor: 1,

            verify_offer_on_extend: true,

            max_inputs: 64,
            max_outputs: 64,
            max_entries_per_input: 4,

            debug_logging: false,
        }
    }

    pub fn for_level(level: ProtocolLevel) -> Self {
        match level {
            ProtocolLevel::Strict => Self::strict(),
            ProtocolLevel::Standard | ProtocolLevel::Custom => Self::standard(),
        }
    }

    pub fn limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_inputs: self.max_inputs,
            max_outputs: self.max_outputs,
            max_entries_per_input: self.max_entries_per_input,
        }
    }

    /// Validate settings consistency
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.default_anchor >= self.max_inputs || self.default_anchor >= self.max_outputs {
            warnings.push(format!(
                "Warning: Anchor index {} cannot fit under the decoding limits",
                self.default_anchor
            ));
        }

        if self.lock_time != 0 && self.sequence == crate::tx::SEQUENCE_FINAL {
            warnings.push(
                "Warning: Lock time is set but final sequences disable it".to_string()
            );
        }

        if !self.verify_offer_on_extend {
            warnings.push(
                "Warning: Offers will be extended without checking the maker signature".to_string()
            );
        }

        if self.max_entries_per_input == 0 {
            warnings.push(
                "Warning: No signature entries can be decoded".to_string()
            );
        }

        warnings
    }

    /// Apply `ORDSWAP_*` overrides. Returns warnings for values that
    /// failed to parse; those keep their previous setting.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        if let Some(level) = lookup("ORDSWAP_LEVEL") {
            match level.to_lowercase().as_str() {
                "standard" => *self = Self::standard(),
                "strict" => *self = Self::strict(),
                other => warnings.push(format!("Warning: Unknown ORDSWAP_LEVEL `{}`", other)),
            }
        }

        let before = self.clone();

        override_parsed(&lookup, "ORDSWAP_TX_VERSION", &mut self.tx_version, &mut warnings);
        override_parsed(&lookup, "ORDSWAP_LOCK_TIME", &mut self.lock_time, &mut warnings);
        override_parsed(&lookup, "ORDSWAP_SEQUENCE", &mut self.sequence, &mut warnings);
        override_parsed(&lookup, "ORDSWAP_ANCHOR", &mut self.default_anchor, &mut warnings);
        override_parsed(&lookup, "ORDSWAP_MAX_INPUTS", &mut self.max_inputs, &mut warnings);
        override_parsed(&lookup, "ORDSWAP_MAX_OUTPUTS", &mut self.max_outputs, &mut warnings);
        override_parsed(&lookup, "ORDSWAP_MAX_ENTRIES", &mut self.max_entries_per_input, &mut warnings);
        override_bool(&lookup, "ORDSWAP_VERIFY_OFFER", &mut self.verify_offer_on_extend, &mut warnings);
        override_bool(&lookup, "ORDSWAP_DEBUG", &mut self.debug_logging, &mut warnings);

        if *self != before {
            self.level = ProtocolLevel::Custom;
        }

        warnings
    }

    /// Standard preset with environment overrides applied
    pub fn from_env() -> (Self, Vec<String>) {
        let mut settings = Self::standard();
        let warnings = settings.apply_overrides(|key| std::env::var(key).ok());
        (settings, warnings)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T, warnings: &mut Vec<String>)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warnings.push(format!("Warning: Ignoring invalid {}=`{}`", key, raw)),
        }
    }
}

fn override_bool<F>(lookup: &F, key: &str, target: &mut bool, warnings: &mut Vec<String>)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => *target = true,
            "0" | "false" | "no" | "off" => *target = false,
            _ => warnings.push(format!("Warning: Ignoring invalid {}=`{}`", key, raw)),
        }
    }
}

/// Process-wide configuration manager
pub struct ProtocolConfig {
    config: RwLock<ProtocolSettings>,
}

impl ProtocolConfig {
    pub fn new() -> Self {
        Self::with_settings(ProtocolSettings::default())
    }

    pub fn with_settings(settings: ProtocolSettings) -> Self {
        if settings.debug_logging {
            logging::enable_debug();
        }
        Self {
            config: RwLock::new(settings),
        }
    }

    /// Get current settings
    pub fn settings(&self) -> ProtocolSettings {
        self.config.read()
            .map(|c| c.clone())
            .unwrap_or_else(|_| ProtocolSettings::standard())
    }

    pub fn level(&self) -> ProtocolLevel {
        self.config.read()
            .map(|c| c.level)
            .unwrap_or(ProtocolLevel::Standard)
    }

    /// Apply a preset
    pub fn set_level(&self, level: ProtocolLevel) {
        let Ok(mut config) = self.config.write() else { return };
        *config = match level {
            ProtocolLevel::Custom => {
                let mut current = config.clone();
                current.level = ProtocolLevel::Custom;
                current
            }
            preset => ProtocolSettings::for_level(preset),
        };
    }

    /// Update settings in place, returning validation warnings
    pub fn update<F>(&self, updater: F) -> Vec<String>
    where
        F: FnOnce(&mut ProtocolSettings),
    {
        let Ok(mut config) = self.config.write() else {
            return vec!["Failed to acquire config lock".to_string()];
        };
        config.level = ProtocolLevel::Custom;
        updater(&mut config);
        if config.debug_logging {
            logging::enable_debug();
        } else {
            logging::disable_debug();
        }
        config.validate()
    }

    pub fn default_anchor(&self) -> usize {
        self.config.read()
            .map(|c| c.default_anchor)
            .unwrap_or(1)
    }

    pub fn verify_offer_on_extend(&self) -> bool {
        self.config.read()
            .map(|c| c.verify_offer_on_extend)
            .unwrap_or(true)
    }

    pub fn limits(&self) -> DecodeLimits {
        self.config.read()
            .map(|c| c.limits())
            .unwrap_or_else(|_| ProtocolSettings::strict().limits())
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static::lazy_static! {
    static ref PROTOCOL_CONFIG: ProtocolConfig = {
        let (settings, warnings) = ProtocolSettings::from_env();
        for warning in warnings.iter().chain(settings.validate().iter()) {
            crate::log_warn!("config", warning.as_str());
        }
        ProtocolConfig::with_settings(settings)
    };
}

/// Get the global protocol configuration
pub fn get_protocol_config() -> &'static ProtocolConfig {
    &PROTOCOL_CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_presets_validate_cleanly() {
        assert!(ProtocolSettings::standard().validate().is_empty());
        assert!(ProtocolSettings::strict().validate().is_empty());
    }

    #[test]
    fn test_validate_flags_inconsistencies() {
        let mut settings = ProtocolSettings::strict();
        settings.lock_time = 800_000;
        settings.verify_offer_on_extend = false;
        assert_eq!(settings.validate().len(), 2);
    }

    #[test]
    fn test_overrides() {
        let mut settings = ProtocolSettings::standard();
        let warnings = settings.apply_overrides(lookup(&[
            ("ORDSWAP_ANCHOR", "2"),
            ("ORDSWAP_VERIFY_OFFER", "no"),
            ("ORDSWAP_LOCK_TIME", "abc"),
        ]));
        assert_eq!(settings.default_anchor, 2);
        assert!(!settings.verify_offer_on_extend);
        assert_eq!(settings.lock_time, 0);
        assert_eq!(settings.level, ProtocolLevel::Custom);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("ORDSWAP_LOCK_TIME"));
    }

    #[test]
    fn test_decode_limit_overrides() {
        let mut settings = ProtocolSettings::standard();
        let warnings = settings.apply_overrides(lookup(&[
            ("ORDSWAP_MAX_ENTRIES", "4"),
            ("ORDSWAP_MAX_INPUTS", "64"),
        ]));
        assert!(warnings.is_empty());
        assert_eq!(settings.max_entries_per_input, 4);
        assert_eq!(settings.limits().max_entries_per_input, 4);
        assert_eq!(settings.limits().max_inputs, 64);
        assert_eq!(settings.level, ProtocolLevel::Custom);

        let warnings = settings.apply_overrides(lookup(&[("ORDSWAP_MAX_ENTRIES", "-1")]));
        assert_eq!(warnings.len(), 1);
        assert_eq!(settings.max_entries_per_input, 4);
    }

    #[test]
    fn test_level_override() {
        let mut settings = ProtocolSettings::standard();
        let warnings = settings.apply_overrides(lookup(&[("ORDSWAP_LEVEL", "strict")]));
        assert!(warnings.is_empty());
        assert_eq!(settings, ProtocolSettings::strict());
    }

    #[test]
    fn test_config_update() {
        let config = ProtocolConfig::new();
        assert_eq!(config.level(), ProtocolLevel::Standard);

        let warnings = config.update(|s| s.default_anchor = 5_000);
        assert_eq!(warnings.len(), 1);
        assert_eq!(config.default_anchor(), 5_000);
        assert_eq!(config.level(), ProtocolLevel::Custom);

        config.set_level(ProtocolLevel::Strict);
        assert_eq!(config.limits(), ProtocolSettings::strict().limits());
    }
}
