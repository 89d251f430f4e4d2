use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{FeeError, Result};

/// ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub invoice: InvoiceConfig,
    pub payment: PaymentRules,
    pub currency: CurrencyConfig,
}

/// invoice numbering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceConfig {
    /// text before the zero-padded sequence
    pub prefix: String,
    /// minimum digits of the sequence
    pub width: usize,
    /// sequence already consumed; the first invoice gets `start_sequence + 1`
    pub start_sequence: u64,
}

/// payment creation rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentRules {
    /// accept a payment whose net total is zero (fully discounted)
    pub allow_zero_payment: bool,
    /// fresh invoice numbers to try when the store reports a collision
    pub max_invoice_attempts: u32,
    /// drop already-paid months from a selection instead of rejecting it
    pub skip_paid_months: bool,
}

/// currency used when rendering invoices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    pub code: String,
    pub symbol: String,
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            prefix: "INV".to_string(),
            width: 6,
            start_sequence: 0,
        }
    }
}

impl Default for PaymentRules {
    fn default() -> Self {
        Self {
            allow_zero_payment: false,
            max_invoice_attempts: 3,
            skip_paid_months: true,
        }
    }
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            code: "BDT".to_string(),
            symbol: "৳".to_string(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl InvoiceConfig {
    /// render a sequence value as an invoice number, e.g. `INV000042`
    pub fn format(&self, sequence: u64) -> String {
        format!("{}{:0width$}", self.prefix, sequence, width = self.width)
    }
}

impl LedgerConfig {
    /// INV + 6 digits, zero payments rejected, paid months skipped
    pub fn standard() -> Self {
        Self {
            invoice: InvoiceConfig::default(),
            payment: PaymentRules::default(),
            currency: CurrencyConfig::default(),
        }
    }

    /// strict variant: selections containing paid months are rejected as conflicts
    pub fn strict() -> Self {
        Self {
            payment: PaymentRules {
                skip_paid_months: false,
                ..PaymentRules::default()
            },
            ..Self::standard()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LedgerConfig = serde_json::from_str(json).map_err(|e| {
            FeeError::InvalidConfiguration {
                message: e.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| FeeError::InvalidConfiguration {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.invoice.prefix.trim().is_empty() {
            return Err(FeeError::InvalidConfiguration {
                message: "invoice prefix must not be empty".to_string(),
            });
        }
        if self.invoice.width == 0 || self.invoice.width > 18 {
            return Err(FeeError::InvalidConfiguration {
                message: format!("invoice width {} outside 1..=18", self.invoice.width),
            });
        }
        if self.payment.max_invoice_attempts == 0 {
            return Err(FeeError::InvalidConfiguration {
                message: "max_invoice_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
