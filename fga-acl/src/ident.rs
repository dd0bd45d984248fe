//! Conversion between OpenFGA `type:id` identifiers and separate columns.
//!
//! [`decode`] splits on the **first** colon and [`encode`] always inserts
//! exactly one, so the two are not inverses for malformed identifiers:
//!
//! ```
//! use fga_acl::ident::{decode, encode};
//!
//! assert_eq!(decode("doc:1"), ("doc", "1"));
//! assert_eq!(decode("a:b:c"), ("a", "b:c"));
//! assert_eq!(decode("no-colon"), ("no-colon", ""));
//! // Lossy: the missing colon comes back as a trailing one.
//! assert_eq!(encode("no-colon", ""), "no-colon:");
//! ```

/// Split a compound identifier into `(type, id)`.
///
/// An identifier without a colon yields `(whole, "")`.
pub fn decode(compound: &str) -> (&str, &str) {
    compound.split_once(':').unwrap_or((compound, ""))
}

/// Join a type and an id into a compound identifier.
pub fn encode(kind: &str, id: &str) -> String {
    let mut out = String::with_capacity(kind.len() + id.len() + 1);
    out.push_str(kind);
    out.push(':');
    out.push_str(id);
    out
}
