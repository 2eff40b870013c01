//! Value types shared by the routing core: distinguished names, LDAP result
//! codes and backend writability modes.

/// Distinguished names and relative distinguished names.
pub mod dn;
/// LDAP result codes carried by errors and change results.
pub mod result_code;
/// Backend writability modes.
pub mod writability;

pub use dn::{Ava, Dn, DnError, Rdn};
pub use result_code::ResultCode;
pub use writability::WritabilityMode;
