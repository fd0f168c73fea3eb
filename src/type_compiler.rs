//! Abstract `SqlType`s to Firebird DDL names, and values to and from the driver representation.
//!
//! - `type_compiler::ddl`: native type names
//! - `type_compiler::codec`: `RowValues` ⇄ `DbValue`
//! - `type_compiler::reflect`: driver-reported column types back to `SqlType`
//! - `type_compiler::isc`: ISC date/time/zone encoding

mod codec;
mod ddl;
pub mod isc;
mod reflect;

use crate::capability::CapabilityDescriptor;
use crate::driver::{ColumnDescription, DbValue};
use crate::error::DialectError;
use crate::types::{RowValues, SqlType};

/// Type-level hooks the statement compiler and connection adapter call into.
pub trait TypeCompiler: Send + Sync {
    /// Native DDL type name for `ty`.
    ///
    /// # Errors
    /// Returns `DialectError::UnsupportedType` when no safe mapping exists.
    fn native_type_for(&self, ty: &SqlType) -> Result<String, DialectError>;

    /// Convert an engine value into what the driver binds for a column of type `ty`.
    ///
    /// # Errors
    /// Returns `DialectError::Parameter` when `value` is outside the domain of `ty`.
    fn encode(&self, ty: &SqlType, value: &RowValues) -> Result<DbValue, DialectError>;

    /// Convert a driver value read from a column of type `ty` back into an engine value.
    ///
    /// # Errors
    /// Returns `DialectError::Parameter` when the driver value does not fit `ty`.
    fn decode(&self, ty: &SqlType, value: DbValue) -> Result<RowValues, DialectError>;

    /// Best abstract type for a column the driver described.
    fn reflect(&self, column: &ColumnDescription) -> Option<SqlType>;

    /// Placeholder wrapped in a cast to `ty`, for binds whose type the server cannot infer.
    ///
    /// # Errors
    /// Propagates failures from [`TypeCompiler::native_type_for`].
    fn bind_cast(&self, ty: &SqlType) -> Result<String, DialectError> {
        Ok(format!("CAST(? AS {})", self.native_type_for(ty)?))
    }
}

/// Decode a driver value by its own kind, for result columns without a reflected type.
///
/// # Errors
/// Returns `DialectError::Parameter` for temporal values outside the supported range.
pub fn decode_untyped(value: DbValue) -> Result<RowValues, DialectError> {
    codec::decode_untyped(value)
}

/// The Firebird type mapping, parameterized by the selected capabilities.
#[derive(Debug, Clone)]
pub struct FirebirdTypeCompiler {
    caps: CapabilityDescriptor,
}

impl FirebirdTypeCompiler {
    #[must_use]
    pub fn new(caps: CapabilityDescriptor) -> Self {
        Self { caps }
    }

    #[must_use]
    pub fn capabilities(&self) -> &CapabilityDescriptor {
        &self.caps
    }
}

impl TypeCompiler for FirebirdTypeCompiler {
    fn native_type_for(&self, ty: &SqlType) -> Result<String, DialectError> {
        ddl::render(&self.caps, ty)
    }

    fn encode(&self, ty: &SqlType, value: &RowValues) -> Result<DbValue, DialectError> {
        codec::encode(&self.caps, ty, value)
    }

    fn decode(&self, ty: &SqlType, value: DbValue) -> Result<RowValues, DialectError> {
        codec::decode(ty, value)
    }

    fn reflect(&self, column: &ColumnDescription) -> Option<SqlType> {
        reflect::sql_type_for(column)
    }
}
