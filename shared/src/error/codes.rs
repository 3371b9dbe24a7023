//! Unified error codes for the POS workspace
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Product errors
//! - 7xxx: Backup errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Auth ====================
    /// Unknown username or wrong password
    InvalidCredentials = 1002,
    /// Username already taken
    UsernameExists = 1003,
    /// Account has been deactivated
    AccountDisabled = 1007,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has no items
    OrderEmpty = 4007,
    /// Generated order number already used
    OrderNumberConflict = 4008,
    /// Item quantity is not a positive integer
    InvalidQuantity = 4009,

    // ==================== 5xxx: Payment ====================
    /// Insufficient payment amount
    PaymentInsufficientAmount = 5002,
    /// Invalid payment method
    PaymentInvalidMethod = 5003,
    /// Amount is negative or not a finite number
    InvalidAmount = 5004,
    /// Order carries no payment
    PaymentRequired = 5005,

    // ==================== 6xxx: Product ====================
    /// Product not found
    ProductNotFound = 6001,
    /// SKU already in use
    SkuExists = 6002,
    /// Stock would drop below zero
    InsufficientStock = 6003,

    // ==================== 7xxx: Backup ====================
    /// Backup not found in the catalog
    BackupNotFound = 7001,
    /// Archive content does not match its recorded checksum
    BackupCorrupted = 7002,
    /// Archive is unreadable or lacks the database entry
    BackupInvalid = 7003,
    /// Live database file is missing
    BackupSourceMissing = 7004,
    /// Archive creation failed
    BackupFailed = 7005,
    /// Restore failed
    RestoreFailed = 7006,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9003,
    /// Database connection is closed
    DatabaseClosed = 9004,
    /// File system error
    StorageIo = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::InvalidCredentials => "Invalid username or password",
            ErrorCode::UsernameExists => "Username already exists",
            ErrorCode::AccountDisabled => "Account is disabled",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "Order has no items",
            ErrorCode::OrderNumberConflict => "Order number already exists",
            ErrorCode::InvalidQuantity => "Quantity must be a positive integer",

            // Payment
            ErrorCode::PaymentInsufficientAmount => "Payment amount is insufficient",
            ErrorCode::PaymentInvalidMethod => "Invalid payment method",
            ErrorCode::InvalidAmount => "Invalid amount",
            ErrorCode::PaymentRequired => "At least one payment is required",

            // Product
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::SkuExists => "SKU already exists",
            ErrorCode::InsufficientStock => "Insufficient stock",

            // Backup
            ErrorCode::BackupNotFound => "Backup not found",
            ErrorCode::BackupCorrupted => "Backup checksum mismatch",
            ErrorCode::BackupInvalid => "Backup archive is invalid",
            ErrorCode::BackupSourceMissing => "Database file not found",
            ErrorCode::BackupFailed => "Backup failed",
            ErrorCode::RestoreFailed => "Restore failed",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::DatabaseClosed => "Database connection is closed",
            ErrorCode::StorageIo => "File system error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Auth
            1002 => Ok(ErrorCode::InvalidCredentials),
            1003 => Ok(ErrorCode::UsernameExists),
            1007 => Ok(ErrorCode::AccountDisabled),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4007 => Ok(ErrorCode::OrderEmpty),
            4008 => Ok(ErrorCode::OrderNumberConflict),
            4009 => Ok(ErrorCode::InvalidQuantity),

            // Payment
            5002 => Ok(ErrorCode::PaymentInsufficientAmount),
            5003 => Ok(ErrorCode::PaymentInvalidMethod),
            5004 => Ok(ErrorCode::InvalidAmount),
            5005 => Ok(ErrorCode::PaymentRequired),

            // Product
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::SkuExists),
            6003 => Ok(ErrorCode::InsufficientStock),

            // Backup
            7001 => Ok(ErrorCode::BackupNotFound),
            7002 => Ok(ErrorCode::BackupCorrupted),
            7003 => Ok(ErrorCode::BackupInvalid),
            7004 => Ok(ErrorCode::BackupSourceMissing),
            7005 => Ok(ErrorCode::BackupFailed),
            7006 => Ok(ErrorCode::RestoreFailed),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::ConfigError),
            9004 => Ok(ErrorCode::DatabaseClosed),
            9005 => Ok(ErrorCode::StorageIo),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
