//! Settings Model
//!
//! Settings are persisted as `{key, value}` text rows; [`StoreSettings`] is
//! the typed view over the known keys.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Longest accepted auto backup interval (one week)
pub const MAX_BACKUP_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Auto backup period for an interval in minutes, `None` outside
/// `1..=MAX_BACKUP_INTERVAL_MINUTES`
pub fn backup_period(minutes: u64) -> Option<Duration> {
    if !(1..=MAX_BACKUP_INTERVAL_MINUTES).contains(&minutes) {
        return None;
    }
    minutes.checked_mul(60).map(Duration::from_secs)
}

/// Raw settings row (also the `settings.json` entry inside a backup)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SettingRow {
    pub key: String,
    pub value: String,
}

/// Known setting keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    StoreName,
    StorePhone,
    StoreEmail,
    StoreAddress,
    TaxNumber,
    DefaultTaxRate,
    CurrencySymbol,
    BackupInterval,
    LowStockThreshold,
    ReceiptHeader,
    ReceiptFooter,
}

impl SettingKey {
    pub const ALL: [SettingKey; 11] = [
        Self::StoreName,
        Self::StorePhone,
        Self::StoreEmail,
        Self::StoreAddress,
        Self::TaxNumber,
        Self::DefaultTaxRate,
        Self::CurrencySymbol,
        Self::BackupInterval,
        Self::LowStockThreshold,
        Self::ReceiptHeader,
        Self::ReceiptFooter,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StoreName => "store_name",
            Self::StorePhone => "store_phone",
            Self::StoreEmail => "store_email",
            Self::StoreAddress => "store_address",
            Self::TaxNumber => "tax_number",
            Self::DefaultTaxRate => "default_tax_rate",
            Self::CurrencySymbol => "currency_symbol",
            Self::BackupInterval => "backup_interval",
            Self::LowStockThreshold => "low_stock_threshold",
            Self::ReceiptHeader => "receipt_header",
            Self::ReceiptFooter => "receipt_footer",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

/// Typed store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub store_name: String,
    pub store_phone: String,
    pub store_email: String,
    pub store_address: String,
    pub tax_number: String,
    /// Percentage applied to new products
    pub default_tax_rate: f64,
    pub currency_symbol: String,
    /// Auto backup interval in minutes
    pub backup_interval: u64,
    pub low_stock_threshold: i64,
    pub receipt_header: String,
    pub receipt_footer: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_name: "Softwrap POS".to_string(),
            store_phone: String::new(),
            store_email: String::new(),
            store_address: String::new(),
            tax_number: String::new(),
            default_tax_rate: 15.0,
            currency_symbol: "EGP".to_string(),
            backup_interval: 60,
            low_stock_threshold: 10,
            receipt_header: "Thank you for your business!".to_string(),
            receipt_footer: "Visit us again!".to_string(),
        }
    }
}

impl StoreSettings {
    /// Build from stored rows; unknown keys are ignored, unparsable values
    /// fall back to the default
    pub fn from_rows(rows: &[SettingRow]) -> Self {
        let map: HashMap<&str, &str> = rows
            .iter()
            .map(|r| (r.key.as_str(), r.value.as_str()))
            .collect();
        let mut settings = Self::default();

        for key in SettingKey::ALL {
            let Some(value) = map.get(key.as_str()).copied() else {
                continue;
            };
            if let Err(reason) = settings.apply(key, value) {
                tracing::warn!(key = key.as_str(), value, %reason, "Ignoring invalid setting value");
            }
        }
        settings
    }

    /// Set one field from its text form
    pub fn apply(&mut self, key: SettingKey, value: &str) -> Result<(), String> {
        fn num<T: std::str::FromStr>(value: &str) -> Result<T, String> {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| format!("not a number: {value}"))
        }

        match key {
            SettingKey::StoreName => self.store_name = value.to_string(),
            SettingKey::StorePhone => self.store_phone = value.to_string(),
            SettingKey::StoreEmail => self.store_email = value.to_string(),
            SettingKey::StoreAddress => self.store_address = value.to_string(),
            SettingKey::TaxNumber => self.tax_number = value.to_string(),
            SettingKey::DefaultTaxRate => self.default_tax_rate = num(value)?,
            SettingKey::CurrencySymbol => self.currency_symbol = value.to_string(),
            SettingKey::BackupInterval => {
                let minutes: u64 = num(value)?;
                if backup_period(minutes).is_none() {
                    return Err(format!(
                        "backup interval must be between 1 and {MAX_BACKUP_INTERVAL_MINUTES} minutes"
                    ));
                }
                self.backup_interval = minutes;
            }
            SettingKey::LowStockThreshold => self.low_stock_threshold = num(value)?,
            SettingKey::ReceiptHeader => self.receipt_header = value.to_string(),
            SettingKey::ReceiptFooter => self.receipt_footer = value.to_string(),
        }
        Ok(())
    }

    /// Text value of one field
    pub fn value_of(&self, key: SettingKey) -> String {
        match key {
            SettingKey::StoreName => self.store_name.clone(),
            SettingKey::StorePhone => self.store_phone.clone(),
            SettingKey::StoreEmail => self.store_email.clone(),
            SettingKey::StoreAddress => self.store_address.clone(),
            SettingKey::TaxNumber => self.tax_number.clone(),
            SettingKey::DefaultTaxRate => self.default_tax_rate.to_string(),
            SettingKey::CurrencySymbol => self.currency_symbol.clone(),
            SettingKey::BackupInterval => self.backup_interval.to_string(),
            SettingKey::LowStockThreshold => self.low_stock_threshold.to_string(),
            SettingKey::ReceiptHeader => self.receipt_header.clone(),
            SettingKey::ReceiptFooter => self.receipt_footer.clone(),
        }
    }

    /// Auto backup period of [`Self::backup_interval`]
    pub fn backup_period(&self) -> Option<Duration> {
        backup_period(self.backup_interval)
    }

    /// All known keys as rows
    pub fn to_rows(&self) -> Vec<SettingRow> {
        SettingKey::ALL
            .into_iter()
            .map(|key| SettingRow {
                key: key.as_str().to_string(),
                value: self.value_of(key),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, value: &str) -> SettingRow {
        SettingRow {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_defaults_when_empty() {
        let settings = StoreSettings::from_rows(&[]);
        assert_eq!(settings, StoreSettings::default());
        assert_eq!(settings.backup_interval, 60);
    }

    #[test]
    fn test_from_rows_parses_known_keys() {
        let settings = StoreSettings::from_rows(&[
            row("store_name", "Corner Shop"),
            row("backup_interval", "15"),
            row("default_tax_rate", "5"),
            row("something_else", "x"),
        ]);
        assert_eq!(settings.store_name, "Corner Shop");
        assert_eq!(settings.backup_interval, 15);
        assert_eq!(settings.default_tax_rate, 5.0);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let settings = StoreSettings::from_rows(&[
            row("backup_interval", "soon"),
            row("low_stock_threshold", "0"),
        ]);
        assert_eq!(settings.backup_interval, 60);
        assert_eq!(settings.low_stock_threshold, 0);

        let settings = StoreSettings::from_rows(&[row("backup_interval", "0")]);
        assert_eq!(settings.backup_interval, 60);
    }

    #[test]
    fn test_backup_interval_bounds() {
        let mut settings = StoreSettings::default();
        assert!(settings.apply(SettingKey::BackupInterval, "200000000000000000").is_err());
        assert!(settings.apply(SettingKey::BackupInterval, "10081").is_err());
        assert_eq!(settings.backup_interval, 60);

        settings.apply(SettingKey::BackupInterval, "10080").unwrap();
        assert_eq!(settings.backup_period(), Some(Duration::from_secs(10080 * 60)));

        assert_eq!(backup_period(0), None);
        assert_eq!(backup_period(u64::MAX), None);
        assert_eq!(backup_period(15), Some(Duration::from_secs(900)));
    }

    #[test]
    fn test_rows_cover_every_key() {
        let rows = StoreSettings::default().to_rows();
        assert_eq!(rows.len(), SettingKey::ALL.len());
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(StoreSettings::from_rows(&rows), StoreSettings::default());
    }
}
