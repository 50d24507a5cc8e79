//! Numeric error kinds.
//!
//! Codes are stable and grouped by bit masks: `0x60` marks normalization
//! failures, `0x80` group errors and `0x90` combinator (logical) errors.

use serde::{Deserialize, Serialize};
use std::fmt;

const NORMALIZATION: u8 = 0x60;
const ERROR_GROUP: u8 = 0x80;
const LOGICAL: u8 = 0x90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Custom,
    DocumentMissing,
    RequiredField,
    UnknownField,
    DependenciesField,
    DependenciesFieldValue,
    ExcludesField,

    DocumentFormat,
    EmptyNotAllowed,
    NotNullable,
    BadType,
    BadTypeForSchema,
    ItemsLength,
    MinLength,
    MaxLength,

    RegexMismatch,
    MinValue,
    MaxValue,
    UnallowedValue,
    UnallowedValues,
    ForbiddenValue,
    ForbiddenValues,
    MissingMembers,

    CoercionFailed,
    RenamingFailed,
    ReadonlyField,
    SettingDefaultFailed,

    MappingSchema,
    SequenceSchema,
    Keysrules,
    Valuesrules,
    BadItems,

    Noneof,
    Oneof,
    Anyof,
    Allof,
}

impl ErrorCode {
    pub fn code(&self) -> u8 {
        match self {
            ErrorCode::Custom => 0x00,
            ErrorCode::DocumentMissing => 0x01,
            ErrorCode::RequiredField => 0x02,
            ErrorCode::UnknownField => 0x03,
            ErrorCode::DependenciesField => 0x04,
            ErrorCode::DependenciesFieldValue => 0x05,
            ErrorCode::ExcludesField => 0x06,

            ErrorCode::DocumentFormat => 0x21,
            ErrorCode::EmptyNotAllowed => 0x22,
            ErrorCode::NotNullable => 0x23,
            ErrorCode::BadType => 0x24,
            ErrorCode::BadTypeForSchema => 0x25,
            ErrorCode::ItemsLength => 0x26,
            ErrorCode::MinLength => 0x27,
            ErrorCode::MaxLength => 0x28,

            ErrorCode::RegexMismatch => 0x41,
            ErrorCode::MinValue => 0x42,
            ErrorCode::MaxValue => 0x43,
            ErrorCode::UnallowedValue => 0x44,
            ErrorCode::UnallowedValues => 0x45,
            ErrorCode::ForbiddenValue => 0x46,
            ErrorCode::ForbiddenValues => 0x47,
            ErrorCode::MissingMembers => 0x48,

            ErrorCode::CoercionFailed => 0x61,
            ErrorCode::RenamingFailed => 0x62,
            ErrorCode::ReadonlyField => 0x63,
            ErrorCode::SettingDefaultFailed => 0x64,

            ErrorCode::MappingSchema => 0x81,
            ErrorCode::SequenceSchema => 0x82,
            ErrorCode::Keysrules => 0x83,
            ErrorCode::Valuesrules => 0x84,
            ErrorCode::BadItems => 0x8f,

            ErrorCode::Noneof => 0x91,
            ErrorCode::Oneof => 0x92,
            ErrorCode::Anyof => 0x93,
            ErrorCode::Allof => 0x94,
        }
    }

    /// The rule that raises this kind of error, if it is tied to one.
    pub fn rule(&self) -> Option<&'static str> {
        let rule = match self {
            ErrorCode::Custom
            | ErrorCode::DocumentMissing
            | ErrorCode::UnknownField
            | ErrorCode::DocumentFormat => return None,
            ErrorCode::RequiredField => "required",
            ErrorCode::DependenciesField | ErrorCode::DependenciesFieldValue => "dependencies",
            ErrorCode::ExcludesField => "excludes",
            ErrorCode::EmptyNotAllowed => "empty",
            ErrorCode::NotNullable => "nullable",
            ErrorCode::BadType => "type",
            ErrorCode::BadTypeForSchema | ErrorCode::MappingSchema | ErrorCode::SequenceSchema => {
                "schema"
            }
            ErrorCode::ItemsLength | ErrorCode::BadItems => "items",
            ErrorCode::MinLength => "minlength",
            ErrorCode::MaxLength => "maxlength",
            ErrorCode::RegexMismatch => "regex",
            ErrorCode::MinValue => "min",
            ErrorCode::MaxValue => "max",
            ErrorCode::UnallowedValue | ErrorCode::UnallowedValues => "allowed",
            ErrorCode::ForbiddenValue | ErrorCode::ForbiddenValues => "forbidden",
            ErrorCode::MissingMembers => "contains",
            ErrorCode::CoercionFailed => "coerce",
            ErrorCode::RenamingFailed => "rename_handler",
            ErrorCode::ReadonlyField => "readonly",
            ErrorCode::SettingDefaultFailed => "default_setter",
            ErrorCode::Keysrules => "keysrules",
            ErrorCode::Valuesrules => "valuesrules",
            ErrorCode::Noneof => "noneof",
            ErrorCode::Oneof => "oneof",
            ErrorCode::Anyof => "anyof",
            ErrorCode::Allof => "allof",
        };
        Some(rule)
    }

    /// Group errors carry the root causes as child errors.
    pub fn is_group(&self) -> bool {
        self.code() & ERROR_GROUP == ERROR_GROUP
    }

    /// Errors raised by `anyof`, `allof`, `oneof` and `noneof`.
    pub fn is_logical(&self) -> bool {
        self.code() & LOGICAL == LOGICAL
    }

    pub fn is_normalization(&self) -> bool {
        !self.is_group() && self.code() & NORMALIZATION == NORMALIZATION
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.code())
    }
}
